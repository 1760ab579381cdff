//! Collaborator contracts consumed by command handlers and the orchestrator.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let (owner, name) = trimmed
            .split_once('/')
            .ok_or_else(|| anyhow!("invalid repository '{raw}', expected owner/repo"))?;
        let owner = owner.trim();
        let name = name.trim();
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            bail!("invalid repository '{raw}', expected owner/repo");
        }
        Ok(Self::new(owner, name))
    }

    pub fn as_slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    pub fn matches_slug(&self, slug: &str) -> bool {
        self.as_slug().eq_ignore_ascii_case(slug.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GithubUser {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequestRepo {
    pub clone_url: String,
    pub owner: GithubUser,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequestBranch {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
    /// Absent when the fork behind the pull request was deleted.
    #[serde(default)]
    pub repo: Option<PullRequestRepo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
/// The pull-request fields handlers read, fetched once per invocation.
pub struct PullRequestSnapshot {
    pub number: u64,
    /// `None` while GitHub is still computing mergeability.
    #[serde(default)]
    pub mergeable: Option<bool>,
    pub head: PullRequestBranch,
    pub base: PullRequestBranch,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkflowRunSummary {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_title: Option<String>,
    pub html_url: String,
}

impl WorkflowRunSummary {
    /// True when the correlation id appears in the run's display title or name.
    pub fn mentions(&self, distinct_id: &str) -> bool {
        [self.display_title.as_deref(), self.name.as_deref()]
            .into_iter()
            .flatten()
            .any(|label| label.contains(distinct_id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowDispatchRequest {
    pub workflow: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub inputs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueueBuildRequest {
    /// Organization URL override; the client default is used when `None`.
    pub organization: Option<String>,
    pub project: String,
    pub definition_id: u64,
    pub queue_id: Option<u64>,
    pub source_branch: String,
    pub source_version: String,
    pub parameters: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRunRequest {
    pub organization: Option<String>,
    pub project: String,
    pub pipeline_id: u64,
    /// Repository resource alias to `refName` override.
    pub repository_overrides: BTreeMap<String, String>,
    pub template_parameters: Map<String, Value>,
}

#[async_trait]
/// Source-control host operations (issues, refs, contents, workflows).
pub trait SourceHost: Send + Sync {
    async fn create_issue_comment(&self, issue_number: u64, body: &str) -> Result<IssueComment>;
    async fn get_issue_comment(&self, comment_id: u64) -> Result<IssueComment>;
    async fn update_issue_comment(&self, comment_id: u64, body: &str) -> Result<IssueComment>;
    async fn add_comment_reaction(&self, comment_id: u64, content: &str) -> Result<()>;
    async fn get_pull_request(&self, number: u64) -> Result<PullRequestSnapshot>;
    async fn branch_exists(&self, branch: &str) -> Result<bool>;
    async fn branch_head_sha(&self, repo: &RepoRef, branch: &str) -> Result<String>;
    /// Base64 content of a file at `git_ref`, `None` when the path is missing
    /// or is not a regular file.
    async fn get_file_content(&self, path: &str, git_ref: &str) -> Result<Option<String>>;
    async fn dispatch_workflow(&self, request: &WorkflowDispatchRequest) -> Result<()>;
    async fn list_workflow_runs_since(
        &self,
        created_since: DateTime<Utc>,
    ) -> Result<Vec<WorkflowRunSummary>>;
}

#[async_trait]
/// Build/pipeline host operations. Both return the web URL of the new job.
pub trait BuildHost: Send + Sync {
    async fn queue_build(&self, request: &QueueBuildRequest) -> Result<String>;
    async fn run_pipeline(&self, request: &PipelineRunRequest) -> Result<String>;
}

#[derive(Clone)]
/// Explicit collaborator context injected into every handler.
pub struct ServiceContext {
    pub source: Arc<dyn SourceHost>,
    pub builds: Arc<dyn BuildHost>,
    pub repo: RepoRef,
}

#[cfg(test)]
mod tests {
    use super::{RepoRef, WorkflowRunSummary};

    #[test]
    fn unit_repo_ref_parse_accepts_owner_repo() {
        let repo = RepoRef::parse(" microsoft/TypeScript ").expect("parse");
        assert_eq!(repo, RepoRef::new("microsoft", "TypeScript"));
        assert_eq!(repo.as_slug(), "microsoft/TypeScript");
        assert!(repo.matches_slug("Microsoft/typescript"));
    }

    #[test]
    fn regression_repo_ref_parse_rejects_malformed_slugs() {
        for raw in ["", "owner", "owner/", "/repo", "a/b/c"] {
            assert!(RepoRef::parse(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn functional_workflow_run_mentions_checks_title_and_name() {
        let run: WorkflowRunSummary = serde_json::from_value(serde_json::json!({
            "id": 7,
            "name": "New Release Branch",
            "display_title": "new-release-branch (0123456789abcdef)",
            "html_url": "https://github.example/runs/7"
        }))
        .expect("run");
        assert!(run.mentions("0123456789abcdef"));
        assert!(!run.mentions("fedcba9876543210"));
    }
}
