//! Credential sources and an expiry-aware cache shared by the REST clients.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use relay_core::{current_unix_timestamp, is_within_refresh_window};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::transport_helpers::truncate_for_error;

pub const DEFAULT_REFRESH_WINDOW_SECONDS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenScheme {
    Bearer,
    /// Azure DevOps personal access token sent as HTTP basic auth.
    BasicPat,
}

#[derive(Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub value: String,
    pub scheme: TokenScheme,
    pub expires_unix: Option<u64>,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("value", &"<redacted>")
            .field("scheme", &self.scheme)
            .field("expires_unix", &self.expires_unix)
            .finish()
    }
}

impl IssuedToken {
    pub fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.scheme {
            TokenScheme::Bearer => request.bearer_auth(&self.value),
            TokenScheme::BasicPat => {
                let encoded = STANDARD.encode(format!(":{}", self.value));
                request.header(reqwest::header::AUTHORIZATION, format!("Basic {encoded}"))
            }
        }
    }
}

#[async_trait]
/// Trait contract for anything able to mint an API token.
pub trait TokenSource: Send + Sync {
    async fn issue(&self) -> Result<IssuedToken>;
}

/// Long-lived token supplied through configuration.
pub struct StaticTokenSource {
    token: IssuedToken,
}

impl StaticTokenSource {
    pub fn new(value: impl Into<String>, scheme: TokenScheme) -> Result<Self> {
        let value = value.into().trim().to_string();
        if value.is_empty() {
            bail!("static token cannot be empty");
        }
        Ok(Self {
            token: IssuedToken {
                value,
                scheme,
                expires_unix: None,
            },
        })
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn issue(&self) -> Result<IssuedToken> {
        Ok(self.token.clone())
    }
}

/// OAuth2 client-credentials grant, e.g. an Azure AD app registration.
pub struct ClientCredentialsTokenSource {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
}

impl ClientCredentialsTokenSource {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scope: impl Into<String>,
        request_timeout_ms: u64,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create token endpoint client")?;
        Ok(Self {
            http,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: scope.into(),
        })
    }
}

#[derive(Deserialize)]
struct ClientCredentialsResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[async_trait]
impl TokenSource for ClientCredentialsTokenSource {
    async fn issue(&self) -> Result<IssuedToken> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await
            .context("token endpoint request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!(
                "token endpoint failed with status {}: {}",
                status.as_u16(),
                truncate_for_error(&body, 400)
            );
        }
        let parsed = response
            .json::<ClientCredentialsResponse>()
            .await
            .context("failed to decode token endpoint response")?;
        Ok(IssuedToken {
            value: parsed.access_token,
            scheme: TokenScheme::Bearer,
            expires_unix: parsed
                .expires_in
                .map(|seconds| current_unix_timestamp().saturating_add(seconds)),
        })
    }
}

/// Caches the last issued token and refreshes it once it is within the
/// refresh window of its expiry.
pub struct CachedCredential {
    source: Arc<dyn TokenSource>,
    refresh_window_seconds: u64,
    cached: Mutex<Option<IssuedToken>>,
}

impl CachedCredential {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self::with_refresh_window(source, DEFAULT_REFRESH_WINDOW_SECONDS)
    }

    pub fn with_refresh_window(source: Arc<dyn TokenSource>, refresh_window_seconds: u64) -> Self {
        Self {
            source,
            refresh_window_seconds,
            cached: Mutex::new(None),
        }
    }

    pub fn from_static(value: impl Into<String>, scheme: TokenScheme) -> Result<Self> {
        Ok(Self::new(Arc::new(StaticTokenSource::new(value, scheme)?)))
    }

    pub async fn token(&self) -> Result<IssuedToken> {
        let mut guard = self.cached.lock().await;
        if let Some(token) = guard.as_ref() {
            if !is_within_refresh_window(
                token.expires_unix,
                current_unix_timestamp(),
                self.refresh_window_seconds,
            ) {
                return Ok(token.clone());
            }
            tracing::debug!("refreshing credential near expiry");
        }
        let fresh = self
            .source
            .issue()
            .await
            .context("failed to issue api credential")?;
        *guard = Some(fresh.clone());
        Ok(fresh)
    }
}
