use std::time::Duration;

use anyhow::{bail, Context, Result};

const RETRY_DELAY_CAP_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms: base_delay_ms.max(1),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 500)
    }
}

pub fn is_retryable_http_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}

pub fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// Reads `Retry-After` as whole seconds. HTTP-date values are ignored.
pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Exponential backoff from `base_delay_ms`, capped, overridden by a server hint.
pub fn retry_delay(base_delay_ms: u64, attempt: usize, retry_after: Option<Duration>) -> Duration {
    if let Some(retry_after) = retry_after {
        return retry_after.min(Duration::from_millis(RETRY_DELAY_CAP_MS));
    }
    let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX).min(16);
    let delay_ms = base_delay_ms
        .max(1)
        .saturating_mul(1_u64 << exponent)
        .min(RETRY_DELAY_CAP_MS);
    Duration::from_millis(delay_ms)
}

pub fn truncate_for_error(body: &str, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        return body.to_string();
    }
    let truncated = body.chars().take(max_chars).collect::<String>();
    format!("{truncated}...")
}

/// Sends the request built by `request_builder`, retrying rate limits,
/// server errors and transient transport failures.
///
/// Success responses and any status listed in `passthrough_statuses` are
/// returned to the caller; every other status becomes an error naming
/// `service` and `operation`.
pub async fn send_with_retry<F>(
    service: &str,
    operation: &str,
    policy: RetryPolicy,
    passthrough_statuses: &[u16],
    mut request_builder: F,
) -> Result<reqwest::Response>
where
    F: FnMut() -> reqwest::RequestBuilder,
{
    let mut attempt = 0_usize;
    loop {
        attempt = attempt.saturating_add(1);
        match request_builder().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() || passthrough_statuses.contains(&status.as_u16()) {
                    return Ok(response);
                }

                let retry_after = parse_retry_after(response.headers());
                let body = response.text().await.unwrap_or_default();
                if attempt < policy.max_attempts && is_retryable_http_status(status.as_u16()) {
                    tracing::debug!(
                        service,
                        operation,
                        attempt,
                        status = status.as_u16(),
                        "retrying api request"
                    );
                    tokio::time::sleep(retry_delay(policy.base_delay_ms, attempt, retry_after))
                        .await;
                    continue;
                }

                bail!(
                    "{service} api {operation} failed with status {}: {}",
                    status.as_u16(),
                    truncate_for_error(&body, 800)
                );
            }
            Err(error) => {
                if attempt < policy.max_attempts && is_retryable_transport_error(&error) {
                    tokio::time::sleep(retry_delay(policy.base_delay_ms, attempt, None)).await;
                    continue;
                }
                return Err(error)
                    .with_context(|| format!("{service} api {operation} request failed"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use httpmock::prelude::*;

    use super::{
        is_retryable_http_status, parse_retry_after, retry_delay, send_with_retry,
        truncate_for_error, RetryPolicy,
    };

    #[test]
    fn unit_is_retryable_http_status_covers_rate_limits_and_server_errors() {
        assert!(is_retryable_http_status(429));
        assert!(is_retryable_http_status(502));
        assert!(!is_retryable_http_status(404));
        assert!(!is_retryable_http_status(422));
    }

    #[test]
    fn functional_retry_delay_grows_and_caps() {
        assert_eq!(retry_delay(100, 1, None), Duration::from_millis(100));
        assert_eq!(retry_delay(100, 3, None), Duration::from_millis(400));
        assert_eq!(retry_delay(100, 40, None), Duration::from_millis(30_000));
        assert_eq!(
            retry_delay(100, 1, Some(Duration::from_secs(2))),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn regression_parse_retry_after_ignores_http_dates_and_truncate_marks_cut() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::RETRY_AFTER,
            reqwest::header::HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(
            reqwest::header::RETRY_AFTER,
            reqwest::header::HeaderValue::from_static("3"),
        );
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(3)));
        assert_eq!(truncate_for_error("abcdef", 3), "abc...");
        assert_eq!(truncate_for_error("abc", 3), "abc");
    }

    #[tokio::test]
    async fn integration_send_with_retry_retries_server_errors_until_attempts_run_out() {
        let server = MockServer::start();
        let failing = server.mock(|when, then| {
            when.method(GET).path("/flaky");
            then.status(503).body("unavailable");
        });
        let client = reqwest::Client::new();
        let url = server.url("/flaky");
        let error = send_with_retry("github", "probe", RetryPolicy::new(3, 1), &[], || {
            client.get(&url)
        })
        .await
        .expect_err("should fail");
        assert!(error
            .to_string()
            .contains("github api probe failed with status 503"));
        failing.assert_calls(3);
    }

    #[tokio::test]
    async fn functional_send_with_retry_passes_through_listed_statuses_without_retry() {
        let server = MockServer::start();
        let missing = server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404);
        });
        let client = reqwest::Client::new();
        let url = server.url("/missing");
        let response = send_with_retry("github", "probe", RetryPolicy::new(3, 1), &[404], || {
            client.get(&url)
        })
        .await
        .expect("passthrough");
        assert_eq!(response.status().as_u16(), 404);
        missing.assert_calls(1);
    }
}
