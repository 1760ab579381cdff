use anyhow::{bail, Result};

use crate::Cli;

fn require_secret(value: &Option<String>, flag: &str) -> Result<()> {
    match value.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => Ok(()),
        _ => bail!("{flag} is required and must not be empty"),
    }
}

/// Rejects flag combinations the bot cannot start with.
pub fn validate_cli(cli: &Cli) -> Result<()> {
    require_secret(&cli.webhook_secret, "--webhook-secret")?;
    require_secret(&cli.github_token, "--github-token")?;
    if cli.bot_handle.trim().is_empty() || cli.bot_handle.trim().contains(char::is_whitespace) {
        bail!("--bot-handle must be a single non-empty token");
    }
    if cli.workflow_ref.trim().is_empty() {
        bail!("--workflow-ref must not be empty");
    }
    let inline_org_url = cli.azure_inline_org_url.as_deref().map(str::trim);
    for (flag, url) in [
        ("--github-api-base", Some(cli.github_api_base.as_str())),
        ("--azure-org-url", Some(cli.azure_org_url.as_str())),
        ("--azure-inline-org-url", inline_org_url),
    ]
    .into_iter()
    .filter_map(|(flag, url)| url.map(|url| (flag, url)))
    {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            bail!("{flag} must be an http(s) URL, got '{url}'");
        }
    }
    if cli.azure_inline_pat.is_some() {
        require_secret(&cli.azure_inline_pat, "--azure-inline-pat")?;
    }
    cli.azure_auth()?;
    Ok(())
}
