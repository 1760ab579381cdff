use clap::Parser;

use crate::cli_types::DEFAULT_AZURE_DEVOPS_SCOPE;

pub(crate) fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

pub(crate) fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

/// Accepts `owner/repo` and returns it trimmed.
pub(crate) fn parse_repo_slug(value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    let Some((owner, name)) = trimmed.split_once('/') else {
        return Err(format!("invalid repository '{value}', expected owner/repo"));
    };
    if owner.trim().is_empty() || name.trim().is_empty() || name.contains('/') {
        return Err(format!("invalid repository '{value}', expected owner/repo"));
    }
    Ok(format!("{}/{}", owner.trim(), name.trim()))
}

#[derive(Debug, Parser)]
#[command(
    name = "relay-bot",
    about = "Relays bot-addressed issue comments to build and workflow services",
    version
)]
pub struct Cli {
    #[arg(
        long,
        env = "RELAY_BIND",
        default_value = "127.0.0.1:8080",
        help = "Socket address the webhook server listens on"
    )]
    pub bind: String,

    #[arg(
        long = "webhook-secret",
        env = "RELAY_WEBHOOK_SECRET",
        hide_env_values = true,
        help = "Shared secret used to verify x-hub-signature-256 on webhook deliveries"
    )]
    pub webhook_secret: Option<String>,

    #[arg(
        long = "github-repo",
        env = "RELAY_GITHUB_REPO",
        value_parser = parse_repo_slug,
        help = "Repository whose comments are relayed, in owner/repo form"
    )]
    pub github_repo: String,

    #[arg(
        long = "github-token",
        env = "RELAY_GITHUB_TOKEN",
        hide_env_values = true,
        help = "GitHub token used for comments, refs, contents and workflow dispatch"
    )]
    pub github_token: Option<String>,

    #[arg(
        long = "github-api-base",
        env = "RELAY_GITHUB_API_BASE",
        default_value = "https://api.github.com",
        help = "Base URL for the GitHub REST API"
    )]
    pub github_api_base: String,

    #[arg(
        long = "bot-handle",
        env = "RELAY_BOT_HANDLE",
        default_value = "@typescript-bot",
        help = "Handle a comment line must start with to address the bot"
    )]
    pub bot_handle: String,

    #[arg(
        long = "bot-login",
        env = "RELAY_BOT_LOGIN",
        help = "Login of the bot account; comments it authors are ignored. Defaults to the handle without '@'"
    )]
    pub bot_login: Option<String>,

    #[arg(
        long = "azure-org-url",
        env = "RELAY_AZURE_ORG_URL",
        default_value = "https://dev.azure.com/typescript",
        help = "Azure DevOps organization URL used to queue builds and pipeline runs"
    )]
    pub azure_org_url: String,

    #[arg(
        long = "azure-project",
        env = "RELAY_AZURE_PROJECT",
        default_value = "cf7ac146-d525-443c-b23c-0d58337efebc",
        help = "Azure DevOps project that owns the build definitions"
    )]
    pub azure_project: String,

    #[arg(
        long = "azure-pat",
        env = "RELAY_AZURE_PAT",
        hide_env_values = true,
        help = "Azure DevOps personal access token"
    )]
    pub azure_pat: Option<String>,

    #[arg(
        long = "azure-tenant-id",
        env = "RELAY_AZURE_TENANT_ID",
        help = "Azure AD tenant used to derive the client-credentials token endpoint"
    )]
    pub azure_tenant_id: Option<String>,

    #[arg(
        long = "azure-client-id",
        env = "RELAY_AZURE_CLIENT_ID",
        help = "Client id for the Azure AD client-credentials grant"
    )]
    pub azure_client_id: Option<String>,

    #[arg(
        long = "azure-client-secret",
        env = "RELAY_AZURE_CLIENT_SECRET",
        hide_env_values = true,
        help = "Client secret for the Azure AD client-credentials grant"
    )]
    pub azure_client_secret: Option<String>,

    #[arg(
        long = "azure-token-url",
        env = "RELAY_AZURE_TOKEN_URL",
        help = "Explicit OAuth2 token endpoint; overrides the tenant-derived endpoint"
    )]
    pub azure_token_url: Option<String>,

    #[arg(
        long = "azure-scope",
        env = "RELAY_AZURE_SCOPE",
        default_value = DEFAULT_AZURE_DEVOPS_SCOPE,
        help = "Scope requested in the client-credentials grant"
    )]
    pub azure_scope: String,

    #[arg(
        long = "azure-inline-org-url",
        env = "RELAY_AZURE_INLINE_ORG_URL",
        help = "Azure DevOps organization hosting the inline community code pipeline; defaults to --azure-org-url"
    )]
    pub azure_inline_org_url: Option<String>,

    #[arg(
        long = "azure-inline-pat",
        env = "RELAY_AZURE_INLINE_PAT",
        hide_env_values = true,
        requires = "azure_inline_org_url",
        help = "Personal access token for --azure-inline-org-url; defaults to the primary Azure credential"
    )]
    pub azure_inline_pat: Option<String>,

    #[arg(
        long = "workflow-ref",
        env = "RELAY_WORKFLOW_REF",
        default_value = "main",
        help = "Git ref the release and repro workflows are dispatched on"
    )]
    pub workflow_ref: String,

    #[arg(
        long = "poll-max-iterations",
        env = "RELAY_POLL_MAX_ITERATIONS",
        default_value_t = 50,
        value_parser = parse_positive_usize,
        help = "Maximum workflow-run queries made while resolving pending runs"
    )]
    pub poll_max_iterations: usize,

    #[arg(
        long = "poll-interval-ms",
        env = "RELAY_POLL_INTERVAL_MS",
        default_value_t = 500,
        value_parser = parse_positive_u64,
        help = "Delay in milliseconds before each workflow-run query"
    )]
    pub poll_interval_ms: u64,

    #[arg(
        long = "request-timeout-ms",
        env = "RELAY_REQUEST_TIMEOUT_MS",
        default_value_t = 30_000,
        value_parser = parse_positive_u64,
        help = "Timeout in milliseconds for each outbound HTTP request"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long = "retry-max-attempts",
        env = "RELAY_RETRY_MAX_ATTEMPTS",
        default_value_t = 3,
        value_parser = parse_positive_usize,
        help = "Attempts per outbound request before a retryable failure is surfaced"
    )]
    pub retry_max_attempts: usize,

    #[arg(
        long = "retry-base-delay-ms",
        env = "RELAY_RETRY_BASE_DELAY_MS",
        default_value_t = 500,
        value_parser = parse_positive_u64,
        help = "Base exponential backoff delay in milliseconds between retries"
    )]
    pub retry_base_delay_ms: u64,

    #[arg(
        long = "log-level",
        env = "RELAY_LOG_LEVEL",
        default_value = "info",
        help = "Default tracing directive; RUST_LOG takes precedence when set"
    )]
    pub log_level: String,
}
