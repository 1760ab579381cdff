use anyhow::{Context, Result};
use relay_commands::{apply_run_updates, render_status_board, Run, StatusBoardRow};

use crate::external_services::SourceHost;

/// Posts the initial status board and returns the new comment id.
pub async fn post_status_comment(
    source: &dyn SourceHost,
    issue_number: u64,
    requesting_user: &str,
    rows: &[StatusBoardRow<'_>],
) -> Result<u64> {
    let body = render_status_board(requesting_user, rows);
    let comment = source
        .create_issue_comment(issue_number, &body)
        .await
        .context("failed to post status comment")?;
    Ok(comment.id)
}

/// Re-reads the live status comment, substitutes settled runs, and writes the
/// result back only when the body changed. Returns whether a write happened.
pub async fn update_status_comment(
    source: &dyn SourceHost,
    comment_id: u64,
    runs: &[Run],
) -> Result<bool> {
    let current = source
        .get_issue_comment(comment_id)
        .await
        .context("failed to fetch status comment")?;
    let Some(updated) = apply_run_updates(&current.body, runs) else {
        return Ok(false);
    };
    source
        .update_issue_comment(comment_id, &updated)
        .await
        .context("failed to update status comment")?;
    Ok(true)
}
