use std::time::Duration;

use chrono::{DateTime, Utc};
use relay_commands::Run;

use crate::external_services::{SourceHost, WorkflowRunSummary};
use crate::status_comment::update_status_comment;

pub const DEFAULT_POLL_MAX_ITERATIONS: usize = 50;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationSettings {
    pub max_iterations: usize,
    pub interval: Duration,
}

impl Default for ReconciliationSettings {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_POLL_MAX_ITERATIONS,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Resolves every pending run whose correlation id appears in one of
/// `workflow_runs`. Returns how many runs moved.
pub fn match_pending_runs(runs: &mut [Run], workflow_runs: &[WorkflowRunSummary]) -> usize {
    let mut resolved = 0;
    for run in runs.iter_mut() {
        if !run.is_pending() {
            continue;
        }
        let Some(found) = workflow_runs
            .iter()
            .find(|candidate| candidate.mentions(run.distinct_id()))
        else {
            continue;
        };
        *run = run.clone().resolve(found.html_url.clone());
        resolved += 1;
    }
    resolved
}

/// Polls workflow-run history until every pending run is resolved or the
/// iteration budget is spent. The status comment is rewritten after each
/// iteration that resolved something. Returns the iterations used.
pub async fn reconcile_pending_runs(
    source: &dyn SourceHost,
    runs: &mut [Run],
    started_at: DateTime<Utc>,
    status_comment_id: u64,
    settings: ReconciliationSettings,
) -> usize {
    let mut iterations = 0;
    while iterations < settings.max_iterations && runs.iter().any(Run::is_pending) {
        iterations += 1;
        tokio::time::sleep(settings.interval).await;
        let workflow_runs = match source.list_workflow_runs_since(started_at).await {
            Ok(workflow_runs) => workflow_runs,
            Err(error) => {
                tracing::warn!(iteration = iterations, "workflow run query failed: {error:#}");
                continue;
            }
        };
        let resolved = match_pending_runs(runs, &workflow_runs);
        if resolved == 0 {
            continue;
        }
        tracing::debug!(iteration = iterations, resolved, "reconciled pending runs");
        if let Err(error) = update_status_comment(source, status_comment_id, runs).await {
            tracing::warn!(
                iteration = iterations,
                "status comment update during reconciliation failed: {error:#}"
            );
        }
    }
    iterations
}

#[cfg(test)]
mod tests {
    use relay_commands::Run;

    use super::match_pending_runs;
    use crate::external_services::WorkflowRunSummary;

    fn workflow_run(id: u64, title: &str) -> WorkflowRunSummary {
        WorkflowRunSummary {
            id,
            name: Some("Release".to_string()),
            display_title: Some(title.to_string()),
            html_url: format!("https://github.example/runs/{id}"),
        }
    }

    #[test]
    fn functional_match_pending_runs_only_moves_pending_runs() {
        let mut runs = vec![
            Run::pending("aaaaaaaaaaaaaaaa"),
            Run::pending("bbbbbbbbbbbbbbbb"),
            Run::errored("cccccccccccccccc", "boom"),
        ];
        let history = vec![
            workflow_run(1, "sync aaaaaaaaaaaaaaaa"),
            workflow_run(2, "bump cccccccccccccccc"),
        ];
        assert_eq!(match_pending_runs(&mut runs, &history), 1);
        assert_eq!(
            runs[0],
            Run::resolved("aaaaaaaaaaaaaaaa", "https://github.example/runs/1")
        );
        assert!(runs[1].is_pending());
        assert_eq!(runs[2], Run::errored("cccccccccccccccc", "boom"));
    }

    #[test]
    fn regression_match_pending_runs_is_stable_once_resolved() {
        let mut runs = vec![Run::pending("aaaaaaaaaaaaaaaa")];
        let first = vec![workflow_run(1, "run aaaaaaaaaaaaaaaa")];
        let later = vec![workflow_run(9, "rerun aaaaaaaaaaaaaaaa")];
        assert_eq!(match_pending_runs(&mut runs, &first), 1);
        assert_eq!(match_pending_runs(&mut runs, &later), 0);
        assert_eq!(
            runs[0],
            Run::resolved("aaaaaaaaaaaaaaaa", "https://github.example/runs/1")
        );
    }
}
