use anyhow::{bail, Result};

use crate::Cli;

/// Azure DevOps resource scope for the client-credentials grant.
pub const DEFAULT_AZURE_DEVOPS_SCOPE: &str = "499b84ac-1321-427f-aa17-267ca6975798/.default";

#[derive(Clone, PartialEq, Eq)]
/// How the bot authenticates against Azure DevOps.
pub enum CliAzureAuth {
    PersonalAccessToken(String),
    ClientCredentials {
        token_url: String,
        client_id: String,
        client_secret: String,
        scope: String,
    },
}

impl std::fmt::Debug for CliAzureAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PersonalAccessToken(_) => f.write_str("PersonalAccessToken(<redacted>)"),
            Self::ClientCredentials {
                token_url,
                client_id,
                scope,
                ..
            } => f
                .debug_struct("ClientCredentials")
                .field("token_url", token_url)
                .field("client_id", client_id)
                .field("scope", scope)
                .finish_non_exhaustive(),
        }
    }
}

pub fn azure_ad_token_url(tenant_id: &str) -> String {
    format!("https://login.microsoftonline.com/{tenant_id}/oauth2/v2.0/token")
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

impl Cli {
    /// Resolves the Azure credential flags into exactly one auth mode.
    pub fn azure_auth(&self) -> Result<CliAzureAuth> {
        let pat = non_empty(&self.azure_pat);
        let client_id = non_empty(&self.azure_client_id);
        let client_secret = non_empty(&self.azure_client_secret);
        let token_url = non_empty(&self.azure_token_url)
            .map(ToOwned::to_owned)
            .or_else(|| non_empty(&self.azure_tenant_id).map(azure_ad_token_url));
        let any_client_credential = client_id.is_some()
            || client_secret.is_some()
            || non_empty(&self.azure_tenant_id).is_some()
            || non_empty(&self.azure_token_url).is_some();

        match (pat, any_client_credential) {
            (Some(_), true) => bail!(
                "--azure-pat cannot be combined with client-credentials flags; choose one Azure auth mode"
            ),
            (Some(pat), false) => Ok(CliAzureAuth::PersonalAccessToken(pat.to_string())),
            (None, false) => bail!(
                "Azure credentials are required: set --azure-pat or the --azure-client-id/--azure-client-secret pair"
            ),
            (None, true) => {
                let (Some(client_id), Some(client_secret), Some(token_url)) =
                    (client_id, client_secret, token_url)
                else {
                    bail!(
                        "client-credentials auth needs --azure-client-id, --azure-client-secret and either --azure-tenant-id or --azure-token-url"
                    );
                };
                Ok(CliAzureAuth::ClientCredentials {
                    token_url,
                    client_id: client_id.to_string(),
                    client_secret: client_secret.to_string(),
                    scope: self.azure_scope.trim().to_string(),
                })
            }
        }
    }

    /// Bot login used to ignore the bot's own comments.
    pub fn resolved_bot_login(&self) -> String {
        non_empty(&self.bot_login)
            .unwrap_or_else(|| self.bot_handle.trim().trim_start_matches('@'))
            .to_string()
    }
}
