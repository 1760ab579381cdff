use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::credentials::CachedCredential;
use crate::external_services::{
    IssueComment, PullRequestSnapshot, RepoRef, SourceHost, WorkflowDispatchRequest,
    WorkflowRunSummary,
};
use crate::transport_helpers::{send_with_retry, RetryPolicy};

const WORKFLOW_RUNS_PAGE_SIZE: usize = 100;
const WORKFLOW_RUNS_MAX_PAGES: usize = 10;

#[derive(Clone)]
/// GitHub REST client scoped to one repository.
pub struct GithubApiClient {
    http: reqwest::Client,
    api_base: String,
    repo: RepoRef,
    credential: Arc<CachedCredential>,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
struct BranchCommit {
    sha: String,
}

#[derive(Deserialize)]
struct BranchResponse {
    commit: BranchCommit,
}

#[derive(Deserialize)]
struct WorkflowRunsPage {
    #[serde(default)]
    total_count: Option<usize>,
    #[serde(default)]
    workflow_runs: Vec<WorkflowRunSummary>,
}

fn percent_encode_path_segment(value: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut encoded = String::with_capacity(value.len());
    for byte in value.as_bytes() {
        let is_unreserved = matches!(
            byte,
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~'
        );
        if is_unreserved {
            encoded.push(*byte as char);
        } else {
            encoded.push('%');
            encoded.push(HEX[(byte >> 4) as usize] as char);
            encoded.push(HEX[(byte & 0x0F) as usize] as char);
        }
    }
    encoded
}

/// Encodes each `/`-separated segment of a ref or file path, keeping the
/// separators.
fn percent_encode_path(value: &str) -> String {
    value
        .split('/')
        .map(percent_encode_path_segment)
        .collect::<Vec<_>>()
        .join("/")
}

impl GithubApiClient {
    pub fn new(
        api_base: impl Into<String>,
        repo: RepoRef,
        credential: Arc<CachedCredential>,
        request_timeout_ms: u64,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("relay-comment-bot"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create github api client")?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            repo,
            credential,
            retry,
        })
    }

    fn repo_url(&self, repo: &RepoRef, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, repo.owner, repo.name, suffix
        )
    }

    async fn send<F>(
        &self,
        operation: &str,
        passthrough_statuses: &[u16],
        mut request_builder: F,
    ) -> Result<reqwest::Response>
    where
        F: FnMut(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let token = self.credential.token().await?;
        send_with_retry(
            "github",
            operation,
            self.retry,
            passthrough_statuses,
            || token.apply(request_builder(&self.http)),
        )
        .await
    }

    async fn request_json<T, F>(&self, operation: &str, request_builder: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnMut(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        self.send(operation, &[], request_builder)
            .await?
            .json::<T>()
            .await
            .with_context(|| format!("failed to decode github {operation}"))
    }
}

#[async_trait]
impl SourceHost for GithubApiClient {
    async fn create_issue_comment(&self, issue_number: u64, body: &str) -> Result<IssueComment> {
        let url = self.repo_url(&self.repo, &format!("issues/{issue_number}/comments"));
        let payload = json!({ "body": body });
        self.request_json("create issue comment", |http| {
            http.post(&url).json(&payload)
        })
        .await
    }

    async fn get_issue_comment(&self, comment_id: u64) -> Result<IssueComment> {
        let url = self.repo_url(&self.repo, &format!("issues/comments/{comment_id}"));
        self.request_json("get issue comment", |http| http.get(&url))
            .await
    }

    async fn update_issue_comment(&self, comment_id: u64, body: &str) -> Result<IssueComment> {
        let url = self.repo_url(&self.repo, &format!("issues/comments/{comment_id}"));
        let payload = json!({ "body": body });
        self.request_json("update issue comment", |http| {
            http.patch(&url).json(&payload)
        })
        .await
    }

    async fn add_comment_reaction(&self, comment_id: u64, content: &str) -> Result<()> {
        let url = self.repo_url(
            &self.repo,
            &format!("issues/comments/{comment_id}/reactions"),
        );
        let payload = json!({ "content": content });
        self.send("add comment reaction", &[], |http| {
            http.post(&url).json(&payload)
        })
        .await?;
        Ok(())
    }

    async fn get_pull_request(&self, number: u64) -> Result<PullRequestSnapshot> {
        let url = self.repo_url(&self.repo, &format!("pulls/{number}"));
        self.request_json("get pull request", |http| http.get(&url))
            .await
    }

    async fn branch_exists(&self, branch: &str) -> Result<bool> {
        let url = self.repo_url(
            &self.repo,
            &format!("git/ref/heads/{}", percent_encode_path(branch)),
        );
        let response = self
            .send("get branch ref", &[404], |http| http.get(&url))
            .await?;
        Ok(response.status().is_success())
    }

    async fn branch_head_sha(&self, repo: &RepoRef, branch: &str) -> Result<String> {
        let url = self.repo_url(repo, &format!("branches/{}", percent_encode_path(branch)));
        let response: BranchResponse = self
            .request_json("get branch", |http| http.get(&url))
            .await?;
        Ok(response.commit.sha)
    }

    async fn get_file_content(&self, path: &str, git_ref: &str) -> Result<Option<String>> {
        let url = self.repo_url(
            &self.repo,
            &format!(
                "contents/{}",
                percent_encode_path(path.trim_start_matches('/'))
            ),
        );
        let response = self
            .send("get file content", &[404], |http| {
                http.get(&url).query(&[("ref", git_ref)])
            })
            .await?;
        if !response.status().is_success() {
            return Ok(None);
        }
        let value = response
            .json::<Value>()
            .await
            .context("failed to decode github get file content")?;
        if value.get("type").and_then(Value::as_str) != Some("file") {
            return Ok(None);
        }
        Ok(value
            .get("content")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned))
    }

    async fn dispatch_workflow(&self, request: &WorkflowDispatchRequest) -> Result<()> {
        let url = self.repo_url(
            &self.repo,
            &format!(
                "actions/workflows/{}/dispatches",
                percent_encode_path_segment(&request.workflow)
            ),
        );
        let payload = json!({ "ref": request.git_ref, "inputs": request.inputs });
        self.send("dispatch workflow", &[], |http| {
            http.post(&url).json(&payload)
        })
        .await?;
        Ok(())
    }

    async fn list_workflow_runs_since(
        &self,
        created_since: DateTime<Utc>,
    ) -> Result<Vec<WorkflowRunSummary>> {
        let url = self.repo_url(&self.repo, "actions/runs");
        let created = format!(
            ">={}",
            created_since.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        let per_page = WORKFLOW_RUNS_PAGE_SIZE.to_string();
        let mut runs = Vec::new();
        for page_number in 1..=WORKFLOW_RUNS_MAX_PAGES {
            let page_param = page_number.to_string();
            let page: WorkflowRunsPage = self
                .request_json("list workflow runs", |http| {
                    http.get(&url).query(&[
                        ("event", "workflow_dispatch"),
                        ("created", created.as_str()),
                        ("per_page", per_page.as_str()),
                        ("page", page_param.as_str()),
                    ])
                })
                .await?;
            let received = page.workflow_runs.len();
            runs.extend(page.workflow_runs);
            let exhausted = page
                .total_count
                .is_some_and(|total_count| runs.len() >= total_count);
            if received < WORKFLOW_RUNS_PAGE_SIZE || exhausted {
                return Ok(runs);
            }
        }
        tracing::debug!(
            pages = WORKFLOW_RUNS_MAX_PAGES,
            runs = runs.len(),
            "workflow run history truncated at page limit"
        );
        Ok(runs)
    }
}
