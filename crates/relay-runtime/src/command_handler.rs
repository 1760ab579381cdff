use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use relay_commands::{
    merge_request_parameters, CommandMatch, CommandRegistry, ReservedParameterError,
    ReservedParameters, Run, RESERVED_PARAMETER_NAMES,
};
use serde_json::{Map, Value};

use crate::external_services::{PullRequestSnapshot, ServiceContext};

#[derive(Debug, Clone)]
/// Everything one matched command needs to trigger its external job.
pub struct RequestInfo {
    pub distinct_id: String,
    pub captures: CommandMatch,
    pub command_line: String,
    pub issue_number: u64,
    pub pull_request: Option<Arc<PullRequestSnapshot>>,
    pub requesting_user: String,
    pub status_comment_id: u64,
    /// Per-command logging sink.
    pub span: tracing::Span,
}

impl RequestInfo {
    pub fn reserved_parameters(&self) -> ReservedParameters<'_> {
        ReservedParameters {
            distinct_id: &self.distinct_id,
            source_issue: self.issue_number,
            requesting_user: &self.requesting_user,
            status_comment: self.status_comment_id,
        }
    }

    /// Custom parameters merged with the reserved set every job receives.
    pub fn request_parameters(
        &self,
        custom: Map<String, Value>,
    ) -> Result<Map<String, Value>, ReservedParameterError> {
        merge_request_parameters(custom, &self.reserved_parameters())
    }

    pub fn pending(&self) -> Run {
        Run::pending(self.distinct_id.clone())
    }

    pub fn resolved(&self, url: impl Into<String>) -> Run {
        Run::resolved(self.distinct_id.clone(), url)
    }

    pub fn errored(&self, message: impl Into<String>) -> Run {
        Run::errored(self.distinct_id.clone(), message)
    }
}

#[async_trait]
/// Trait contract for one command's behavior.
///
/// Expected domain failures (missing branch, malformed manifest) come back as
/// `Run::Errored`. Anything else is returned as `Err` and converted by the
/// orchestrator.
pub trait CommandHandler: Send + Sync {
    fn describe(&self) -> &str;

    /// Declares that `handle` reads `RequestInfo::pull_request`.
    fn requires_pull_request(&self) -> bool {
        false
    }

    /// Names of the custom parameters this handler sends, checked against the
    /// reserved set when the catalog is built.
    fn custom_parameter_names(&self) -> Vec<String> {
        Vec::new()
    }

    async fn handle(&self, services: &ServiceContext, request: RequestInfo) -> Result<Run>;
}

pub type SharedCommandHandler = Arc<dyn CommandHandler>;
pub type HandlerRegistry = CommandRegistry<SharedCommandHandler>;

/// Fails on the first handler that declares a reserved parameter name.
pub fn ensure_no_reserved_parameters(
    registry: &HandlerRegistry,
) -> Result<(), ReservedParameterError> {
    for definition in registry.definitions() {
        if let Some(name) = definition
            .handler()
            .custom_parameter_names()
            .into_iter()
            .find(|name| RESERVED_PARAMETER_NAMES.contains(&name.as_str()))
        {
            return Err(ReservedParameterError { name });
        }
    }
    Ok(())
}
