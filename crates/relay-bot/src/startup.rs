use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use relay_cli::{validate_cli, Cli, CliAzureAuth};
use relay_runtime::{
    builtin_command_registry, ensure_no_reserved_parameters, AzurePipelinesClient, CachedCredential,
    ClientCredentialsTokenSource, CommandCatalogConfig, CommentDispatchRuntime, DispatchConfig,
    GithubApiClient, RepoRef, RetryPolicy, ServiceContext, TokenScheme, WebhookServerConfig,
};

pub(crate) fn catalog_config(cli: &Cli) -> CommandCatalogConfig {
    CommandCatalogConfig {
        build_project: cli.azure_project.trim().to_string(),
        workflow_ref: cli.workflow_ref.trim().to_string(),
        inline_pipeline_organization: cli
            .azure_inline_org_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(ToOwned::to_owned),
        ..CommandCatalogConfig::default()
    }
}

pub(crate) fn dispatch_config(cli: &Cli) -> DispatchConfig {
    DispatchConfig {
        bot_handle: cli.bot_handle.trim().to_string(),
        poll_max_iterations: cli.poll_max_iterations,
        poll_interval: Duration::from_millis(cli.poll_interval_ms),
    }
}

pub(crate) fn webhook_config(cli: &Cli, repo: RepoRef) -> Result<WebhookServerConfig> {
    let webhook_secret = cli
        .webhook_secret
        .as_deref()
        .map(str::trim)
        .filter(|secret| !secret.is_empty())
        .context("--webhook-secret is required")?
        .to_string();
    Ok(WebhookServerConfig {
        bind: cli.bind.trim().to_string(),
        webhook_secret,
        repo,
        bot_login: Some(cli.resolved_bot_login()),
    })
}

fn azure_credential(cli: &Cli) -> Result<CachedCredential> {
    match cli.azure_auth()? {
        CliAzureAuth::PersonalAccessToken(pat) => {
            CachedCredential::from_static(pat, TokenScheme::BasicPat)
        }
        CliAzureAuth::ClientCredentials {
            token_url,
            client_id,
            client_secret,
            scope,
        } => {
            let source = ClientCredentialsTokenSource::new(
                token_url,
                client_id,
                client_secret,
                scope,
                cli.request_timeout_ms,
            )?;
            Ok(CachedCredential::new(Arc::new(source)))
        }
    }
}

/// Everything the binary needs to start serving webhooks.
pub(crate) struct RelayStartup {
    pub(crate) webhook: WebhookServerConfig,
    pub(crate) runtime: Arc<CommentDispatchRuntime>,
}

pub(crate) fn build_startup(cli: &Cli) -> Result<RelayStartup> {
    validate_cli(cli)?;
    let repo = RepoRef::parse(&cli.github_repo)?;
    let retry = RetryPolicy::new(cli.retry_max_attempts, cli.retry_base_delay_ms);

    let github_token = cli
        .github_token
        .as_deref()
        .context("--github-token is required")?;
    let github = GithubApiClient::new(
        cli.github_api_base.as_str(),
        repo.clone(),
        Arc::new(CachedCredential::from_static(
            github_token.trim(),
            TokenScheme::Bearer,
        )?),
        cli.request_timeout_ms,
        retry,
    )?;
    let catalog = catalog_config(cli);
    let mut builds = AzurePipelinesClient::new(
        cli.azure_org_url.as_str(),
        Arc::new(azure_credential(cli)?),
        cli.request_timeout_ms,
        retry,
    )?;
    if let (Some(organization), Some(pat)) = (
        catalog.inline_pipeline_organization.as_deref(),
        cli.azure_inline_pat.as_deref(),
    ) {
        builds = builds.with_organization_credential(
            organization,
            Arc::new(CachedCredential::from_static(pat.trim(), TokenScheme::BasicPat)?),
        );
        tracing::info!(organization, "inline pipeline uses its own azure credential");
    }

    let registry = builtin_command_registry(&catalog)
        .context("failed to build command registry")?;
    ensure_no_reserved_parameters(&registry)?;
    tracing::info!(commands = registry.len(), "command registry ready");

    let services = ServiceContext {
        source: Arc::new(github),
        builds: Arc::new(builds),
        repo: repo.clone(),
    };
    let runtime = CommentDispatchRuntime::new(services, registry, dispatch_config(cli));
    Ok(RelayStartup {
        webhook: webhook_config(cli, repo)?,
        runtime: Arc::new(runtime),
    })
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use relay_cli::Cli;
    use relay_runtime::RepoRef;

    use super::{build_startup, catalog_config, dispatch_config, webhook_config};

    fn cli(extra: &[&str]) -> Cli {
        let mut args = vec![
            "relay-bot",
            "--github-repo",
            "owner/repo",
            "--webhook-secret",
            "hook",
            "--github-token",
            "ghp",
            "--bot-handle",
            "@relay-bot",
        ];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args).expect("parse")
    }

    #[test]
    fn unit_configs_follow_cli_flags() {
        let cli = cli(&[
            "--azure-pat",
            "pat",
            "--azure-project",
            "Playground",
            "--poll-interval-ms",
            "25",
        ]);
        let catalog = catalog_config(&cli);
        assert_eq!(catalog.build_project, "Playground");
        assert_eq!(catalog.workflow_ref, "main");
        assert_eq!(catalog.test_definition_id, 11);
        assert_eq!(catalog.inline_pipeline_organization, None);

        let dispatch = dispatch_config(&cli);
        assert_eq!(dispatch.bot_handle, "@relay-bot");
        assert_eq!(dispatch.poll_interval.as_millis(), 25);

        let webhook = webhook_config(&cli, RepoRef::new("owner", "repo")).expect("webhook");
        assert_eq!(webhook.bot_login.as_deref(), Some("relay-bot"));
        assert_eq!(webhook.webhook_secret, "hook");
    }

    #[test]
    fn functional_build_startup_wires_runtime_with_pat_auth() {
        let startup = build_startup(&cli(&["--azure-pat", "pat"])).expect("startup");
        assert_eq!(startup.webhook.repo.as_slug(), "owner/repo");
        assert_eq!(startup.runtime.config().poll_max_iterations, 50);
    }

    #[test]
    fn functional_build_startup_routes_inline_pipeline_to_its_organization() {
        let cli = cli(&[
            "--azure-pat",
            "pat",
            "--azure-inline-org-url",
            " https://dev.azure.com/devdiv ",
            "--azure-inline-pat",
            "devdiv-pat",
        ]);
        assert_eq!(
            catalog_config(&cli).inline_pipeline_organization.as_deref(),
            Some("https://dev.azure.com/devdiv")
        );
        build_startup(&cli).expect("startup");
    }

    #[test]
    fn regression_build_startup_rejects_missing_azure_auth() {
        let error = build_startup(&cli(&[])).err().expect("missing auth");
        assert!(error.to_string().contains("Azure credentials are required"));
    }
}
