use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use hmac::{Hmac, Mac};
use relay_commands::AuthorAssociation;
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use tokio::net::TcpListener;

use crate::dispatch_orchestrator::{CommentDispatchRuntime, CommentEvent};
use crate::external_services::RepoRef;

pub const WEBHOOK_PATH: &str = "/api/github/webhook";
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
pub const EVENT_HEADER: &str = "x-github-event";
pub const DELIVERY_HEADER: &str = "x-github-delivery";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookServerConfig {
    pub bind: String,
    pub webhook_secret: String,
    pub repo: RepoRef,
    /// Comments authored by this login are never processed.
    pub bot_login: Option<String>,
}

struct WebhookServerState {
    config: WebhookServerConfig,
    runtime: Arc<CommentDispatchRuntime>,
}

#[derive(Deserialize)]
struct WebhookUser {
    login: String,
}

#[derive(Deserialize)]
struct WebhookRepository {
    full_name: String,
}

#[derive(Deserialize)]
struct WebhookComment {
    id: u64,
    #[serde(default)]
    body: Option<String>,
    user: WebhookUser,
    #[serde(default)]
    author_association: String,
}

#[derive(Deserialize)]
struct WebhookIssue {
    number: u64,
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct IssueCommentPayload {
    action: String,
    comment: WebhookComment,
    issue: WebhookIssue,
    repository: WebhookRepository,
}

#[derive(Deserialize)]
struct WebhookReview {
    #[serde(default)]
    body: Option<String>,
    user: WebhookUser,
    #[serde(default)]
    author_association: String,
}

#[derive(Deserialize)]
struct WebhookPullRequest {
    number: u64,
}

#[derive(Deserialize)]
struct PullRequestReviewPayload {
    action: String,
    review: WebhookReview,
    pull_request: WebhookPullRequest,
    repository: WebhookRepository,
}

pub fn verify_github_signature(payload: &[u8], signature_header: &str, secret: &str) -> Result<()> {
    let digest_hex = signature_header
        .trim()
        .strip_prefix("sha256=")
        .ok_or_else(|| anyhow!("signature must use sha256=<hex> format"))?;
    let signature_bytes = decode_hex(digest_hex)?;
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .context("failed to initialize hmac verifier")?;
    mac.update(payload);
    mac.verify_slice(&signature_bytes)
        .map_err(|_| anyhow!("signature verification failed"))
}

fn decode_hex(raw: &str) -> Result<Vec<u8>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("signature digest cannot be empty");
    }
    if trimmed.len() % 2 != 0 {
        bail!("signature digest must have an even number of hex characters");
    }
    let mut bytes = Vec::with_capacity(trimmed.len() / 2);
    let mut index = 0usize;
    while index < trimmed.len() {
        let next = index.saturating_add(2);
        let chunk = trimmed
            .get(index..next)
            .ok_or_else(|| anyhow!("signature digest is not ascii hex"))?;
        let byte = u8::from_str_radix(chunk, 16)
            .with_context(|| format!("invalid hex byte '{chunk}' in signature digest"))?;
        bytes.push(byte);
        index = next;
    }
    Ok(bytes)
}

fn non_empty_body(body: Option<String>) -> Option<String> {
    body.filter(|body| !body.trim().is_empty())
}

fn is_self_authored(config: &WebhookServerConfig, login: &str) -> bool {
    config
        .bot_login
        .as_deref()
        .is_some_and(|bot| bot.eq_ignore_ascii_case(login))
}

/// Maps a verified webhook delivery onto a dispatchable comment event.
///
/// Returns `None` for every shape the bot ignores: other events or actions,
/// empty bodies, other repositories and the bot's own comments.
pub fn comment_event_from_payload(
    event_name: &str,
    delivery_id: &str,
    payload: &[u8],
    config: &WebhookServerConfig,
) -> Result<Option<CommentEvent>> {
    let (repository, event) = match event_name {
        "issue_comment" => {
            let payload = serde_json::from_slice::<IssueCommentPayload>(payload)
                .context("failed to decode issue_comment payload")?;
            if payload.action != "created" {
                return Ok(None);
            }
            let Some(body) = non_empty_body(payload.comment.body) else {
                return Ok(None);
            };
            (
                payload.repository.full_name,
                CommentEvent {
                    delivery_id: delivery_id.to_string(),
                    body,
                    author_login: payload.comment.user.login,
                    author_association: AuthorAssociation::parse(
                        &payload.comment.author_association,
                    ),
                    issue_number: payload.issue.number,
                    is_pull_request: payload.issue.pull_request.is_some(),
                    comment_id: Some(payload.comment.id),
                },
            )
        }
        "pull_request_review" => {
            let payload = serde_json::from_slice::<PullRequestReviewPayload>(payload)
                .context("failed to decode pull_request_review payload")?;
            if payload.action != "submitted" {
                return Ok(None);
            }
            let Some(body) = non_empty_body(payload.review.body) else {
                return Ok(None);
            };
            (
                payload.repository.full_name,
                CommentEvent {
                    delivery_id: delivery_id.to_string(),
                    body,
                    author_login: payload.review.user.login,
                    author_association: AuthorAssociation::parse(
                        &payload.review.author_association,
                    ),
                    issue_number: payload.pull_request.number,
                    is_pull_request: true,
                    comment_id: None,
                },
            )
        }
        _ => return Ok(None),
    };
    if !config.repo.matches_slug(&repository) {
        tracing::debug!(repository = %repository, "ignoring event from another repository");
        return Ok(None);
    }
    if is_self_authored(config, &event.author_login) {
        return Ok(None);
    }
    Ok(Some(event))
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

async fn handle_webhook_health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status":"ok"})))
}

async fn handle_github_webhook(
    State(state): State<Arc<WebhookServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let signature = header_value(&headers, SIGNATURE_HEADER).unwrap_or_default();
    if let Err(error) = verify_github_signature(&body, signature, &state.config.webhook_secret) {
        tracing::debug!("dropping webhook delivery: {error}");
        return StatusCode::ACCEPTED;
    }
    let event_name = header_value(&headers, EVENT_HEADER).unwrap_or_default();
    let delivery_id = header_value(&headers, DELIVERY_HEADER).unwrap_or("unknown");
    let event = match comment_event_from_payload(event_name, delivery_id, &body, &state.config) {
        Ok(Some(event)) => event,
        Ok(None) => return StatusCode::ACCEPTED,
        Err(error) => {
            tracing::warn!(delivery = delivery_id, "ignoring malformed webhook: {error:#}");
            return StatusCode::ACCEPTED;
        }
    };
    tracing::info!(
        delivery = delivery_id,
        event = event_name,
        issue = event.issue_number,
        "accepted comment event"
    );
    let runtime = Arc::clone(&state.runtime);
    tokio::spawn(async move {
        if let Err(error) = runtime.handle_comment(&event).await {
            tracing::warn!(
                delivery = %event.delivery_id,
                "comment dispatch failed: {error:#}"
            );
        }
    });
    StatusCode::ACCEPTED
}

pub fn build_webhook_router(
    config: WebhookServerConfig,
    runtime: Arc<CommentDispatchRuntime>,
) -> Router {
    let state = Arc::new(WebhookServerState { config, runtime });
    Router::new()
        .route(WEBHOOK_PATH, post(handle_github_webhook))
        .route("/healthz", get(handle_webhook_health))
        .with_state(state)
}

pub async fn run_webhook_server(
    config: WebhookServerConfig,
    runtime: Arc<CommentDispatchRuntime>,
) -> Result<()> {
    let listener = TcpListener::bind(config.bind.as_str())
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve webhook bound address")?;
    tracing::info!(
        addr = %local_addr,
        repo = %config.repo.as_slug(),
        "webhook server listening"
    );
    let app = build_webhook_router(config, runtime);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("webhook server exited unexpectedly")?;
    Ok(())
}
