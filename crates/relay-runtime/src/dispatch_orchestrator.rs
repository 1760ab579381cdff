use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use futures_util::future::join_all;
use relay_commands::{parse_comment_commands, AuthorAssociation, Run, StatusBoardRow};
use relay_core::{current_unix_timestamp_ms, short_key_hash};
use serde::Serialize;

use crate::command_handler::{HandlerRegistry, RequestInfo, SharedCommandHandler};
use crate::external_services::{PullRequestSnapshot, ServiceContext};
use crate::reconciliation::{
    reconcile_pending_runs, ReconciliationSettings, DEFAULT_POLL_INTERVAL,
    DEFAULT_POLL_MAX_ITERATIONS,
};
use crate::status_comment::{post_status_comment, update_status_comment};

#[derive(Debug, Clone, PartialEq, Eq)]
/// A newly created comment (or submitted review) addressed to the bot.
pub struct CommentEvent {
    pub delivery_id: String,
    pub body: String,
    pub author_login: String,
    pub author_association: AuthorAssociation,
    pub issue_number: u64,
    pub is_pull_request: bool,
    /// Issue-comment id; reviews carry none and get no reaction.
    pub comment_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    pub bot_handle: String,
    pub poll_max_iterations: usize,
    pub poll_interval: Duration,
}

impl DispatchConfig {
    pub fn new(bot_handle: impl Into<String>) -> Self {
        Self {
            bot_handle: bot_handle.into(),
            poll_max_iterations: DEFAULT_POLL_MAX_ITERATIONS,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    fn reconciliation(&self) -> ReconciliationSettings {
        ReconciliationSettings {
            max_iterations: self.poll_max_iterations,
            interval: self.poll_interval,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPhase {
    Parsed,
    Dispatching,
    PollingReconciliation,
    Done,
}

impl DispatchPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Dispatching => "dispatching",
            Self::PollingReconciliation => "polling_reconciliation",
            Self::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    NoCommands,
    Unmergeable,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub outcome: DispatchOutcome,
    pub commands: Vec<String>,
    pub runs: Vec<Run>,
    pub status_comment_id: Option<u64>,
    pub reconciliation_iterations: usize,
}

impl DispatchReport {
    fn without_runs(outcome: DispatchOutcome, commands: Vec<String>) -> Self {
        Self {
            outcome,
            commands,
            runs: Vec::new(),
            status_comment_id: None,
            reconciliation_iterations: 0,
        }
    }
}

struct PlannedCommand {
    line: String,
    distinct_id: String,
    captures: relay_commands::CommandMatch,
    handler: SharedCommandHandler,
}

fn distinct_id_for(delivery_id: &str, index: usize, line: &str, nonce_ms: u64) -> String {
    short_key_hash(&format!("{delivery_id}:{index}:{nonce_ms}:{line}"))
}

fn unmergeable_message(requesting_user: &str) -> String {
    format!(
        "Heya @{requesting_user}, this pull request can't be merged in its current state, so I can't run the requested jobs. Please resolve the conflicts and ask again."
    )
}

/// Ties parsing, handler fan-out, status rendering and reconciliation
/// together for one incoming comment.
pub struct CommentDispatchRuntime {
    services: ServiceContext,
    registry: Arc<HandlerRegistry>,
    config: DispatchConfig,
}

impl CommentDispatchRuntime {
    pub fn new(services: ServiceContext, registry: HandlerRegistry, config: DispatchConfig) -> Self {
        Self {
            services,
            registry: Arc::new(registry),
            config,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    fn plan(&self, event: &CommentEvent) -> Vec<PlannedCommand> {
        let nonce_ms = current_unix_timestamp_ms();
        parse_comment_commands(
            &event.body,
            &self.config.bot_handle,
            event.author_association,
            event.is_pull_request,
            &self.registry,
        )
        .into_iter()
        .enumerate()
        .map(|(index, matched)| PlannedCommand {
            distinct_id: distinct_id_for(&event.delivery_id, index, &matched.line, nonce_ms),
            line: matched.line,
            captures: matched.captures,
            handler: Arc::clone(matched.definition.handler()),
        })
        .collect()
    }

    async fn fetch_pull_request(
        &self,
        event: &CommentEvent,
        planned: &[PlannedCommand],
    ) -> Option<Arc<PullRequestSnapshot>> {
        if !event.is_pull_request
            || !planned
                .iter()
                .any(|command| command.handler.requires_pull_request())
        {
            return None;
        }
        match self.services.source.get_pull_request(event.issue_number).await {
            Ok(snapshot) => Some(Arc::new(snapshot)),
            Err(error) => {
                tracing::warn!("pull request fetch failed: {error:#}");
                None
            }
        }
    }

    async fn add_reaction(&self, event: &CommentEvent) {
        let Some(comment_id) = event.comment_id else {
            return;
        };
        if let Err(error) = self
            .services
            .source
            .add_comment_reaction(comment_id, "+1")
            .await
        {
            tracing::debug!("comment reaction failed: {error:#}");
        }
    }

    async fn run_handlers(
        &self,
        event: &CommentEvent,
        planned: &[PlannedCommand],
        pull_request: Option<Arc<PullRequestSnapshot>>,
        status_comment_id: u64,
    ) -> Vec<Run> {
        let tasks = planned.iter().map(|command| {
            let request = RequestInfo {
                distinct_id: command.distinct_id.clone(),
                captures: command.captures.clone(),
                command_line: command.line.clone(),
                issue_number: event.issue_number,
                pull_request: pull_request.clone(),
                requesting_user: event.author_login.clone(),
                status_comment_id,
                span: tracing::info_span!(
                    "command",
                    distinct_id = %command.distinct_id,
                    command = %command.line,
                    handler = command.handler.describe()
                ),
            };
            let handler = Arc::clone(&command.handler);
            let services = self.services.clone();
            tokio::spawn(async move { handler.handle(&services, request).await })
        });
        let results = join_all(tasks).await;

        planned
            .iter()
            .zip(results)
            .map(|(command, result)| match result {
                Ok(Ok(run)) if run.distinct_id() == command.distinct_id => run,
                Ok(Ok(run)) => {
                    tracing::warn!(
                        distinct_id = %command.distinct_id,
                        returned = %run.distinct_id(),
                        "handler returned a run for another command"
                    );
                    Run::errored(
                        command.distinct_id.clone(),
                        "handler returned a run for another command",
                    )
                }
                Ok(Err(error)) => {
                    tracing::warn!(
                        distinct_id = %command.distinct_id,
                        command = %command.line,
                        "command handler failed: {error:#}"
                    );
                    Run::errored(command.distinct_id.clone(), format!("{error:#}"))
                }
                Err(join_error) => {
                    let message = if join_error.is_panic() {
                        "command handler panicked"
                    } else {
                        "command handler was cancelled"
                    };
                    tracing::warn!(distinct_id = %command.distinct_id, "{message}");
                    Run::errored(command.distinct_id.clone(), message)
                }
            })
            .collect()
    }

    async fn refresh_status(&self, status_comment_id: u64, runs: &[Run]) {
        if let Err(error) =
            update_status_comment(self.services.source.as_ref(), status_comment_id, runs).await
        {
            tracing::warn!("status comment update failed: {error:#}");
        }
    }

    #[tracing::instrument(
        name = "dispatch_comment",
        skip_all,
        fields(delivery = %event.delivery_id, issue = event.issue_number, user = %event.author_login)
    )]
    pub async fn handle_comment(&self, event: &CommentEvent) -> Result<DispatchReport> {
        let planned = self.plan(event);
        let commands = planned
            .iter()
            .map(|command| command.line.clone())
            .collect::<Vec<_>>();
        tracing::info!(
            phase = DispatchPhase::Parsed.as_str(),
            commands = planned.len(),
            "parsed comment"
        );
        if planned.is_empty() {
            return Ok(DispatchReport::without_runs(
                DispatchOutcome::NoCommands,
                commands,
            ));
        }

        self.add_reaction(event).await;
        let pull_request = self.fetch_pull_request(event, &planned).await;
        if pull_request
            .as_ref()
            .is_some_and(|snapshot| snapshot.mergeable == Some(false))
        {
            tracing::info!("pull request is not mergeable; skipping dispatch");
            self.services
                .source
                .create_issue_comment(event.issue_number, &unmergeable_message(&event.author_login))
                .await?;
            return Ok(DispatchReport::without_runs(
                DispatchOutcome::Unmergeable,
                commands,
            ));
        }

        let rows = planned
            .iter()
            .map(|command| StatusBoardRow {
                command: &command.line,
                distinct_id: &command.distinct_id,
            })
            .collect::<Vec<_>>();
        let status_comment_id = post_status_comment(
            self.services.source.as_ref(),
            event.issue_number,
            &event.author_login,
            &rows,
        )
        .await?;

        let started_at = Utc::now();
        tracing::info!(
            phase = DispatchPhase::Dispatching.as_str(),
            status_comment_id,
            "dispatching commands"
        );
        let mut runs = self
            .run_handlers(event, &planned, pull_request, status_comment_id)
            .await;
        self.refresh_status(status_comment_id, &runs).await;

        let mut reconciliation_iterations = 0;
        if runs.iter().any(Run::is_pending) {
            tracing::info!(
                phase = DispatchPhase::PollingReconciliation.as_str(),
                pending = runs.iter().filter(|run| run.is_pending()).count(),
                "reconciling pending runs"
            );
            reconciliation_iterations = reconcile_pending_runs(
                self.services.source.as_ref(),
                &mut runs,
                started_at,
                status_comment_id,
                self.config.reconciliation(),
            )
            .await;
            self.refresh_status(status_comment_id, &runs).await;
        }

        tracing::info!(
            phase = DispatchPhase::Done.as_str(),
            resolved = runs.iter().filter(|run| matches!(run, Run::Resolved { .. })).count(),
            errored = runs.iter().filter(|run| matches!(run, Run::Errored { .. })).count(),
            pending = runs.iter().filter(|run| run.is_pending()).count(),
            reconciliation_iterations,
            "dispatch finished"
        );
        Ok(DispatchReport {
            outcome: DispatchOutcome::Completed,
            commands,
            runs,
            status_comment_id: Some(status_comment_id),
            reconciliation_iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{distinct_id_for, DispatchConfig, DispatchPhase};

    #[test]
    fn unit_distinct_ids_are_fixed_width_and_unique_per_line() {
        let first = distinct_id_for("delivery-1", 0, "test this", 1_000);
        let second = distinct_id_for("delivery-1", 1, "run dt", 1_000);
        assert_eq!(first.len(), 16);
        assert_eq!(second.len(), 16);
        assert_ne!(first, second);
        assert!(!first.contains(&second));
        assert_eq!(first, distinct_id_for("delivery-1", 0, "test this", 1_000));
    }

    #[test]
    fn unit_dispatch_config_defaults_poll_budget() {
        let config = DispatchConfig::new("@relay-bot");
        assert_eq!(config.poll_max_iterations, 50);
        assert_eq!(config.poll_interval.as_millis(), 500);
        assert_eq!(
            DispatchPhase::PollingReconciliation.as_str(),
            "polling_reconciliation"
        );
    }
}
