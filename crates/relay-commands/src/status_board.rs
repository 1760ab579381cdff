use crate::command_run::Run;
use crate::text_helpers::{collapse_newlines, truncate_with_ellipsis};

pub const STATUS_SPINNER: &str = "🔄";
pub const ERROR_MESSAGE_MAX_CHARS: usize = 250;

#[derive(Debug, Clone, Copy)]
pub struct StatusBoardRow<'a> {
    pub command: &'a str,
    pub distinct_id: &'a str,
}

fn status_start_marker(distinct_id: &str) -> String {
    format!("<!--status-{distinct_id}-start-->")
}

fn status_end_marker(distinct_id: &str) -> String {
    format!("<!--status-{distinct_id}-end-->")
}

pub fn status_placeholder(distinct_id: &str) -> String {
    format!(
        "{}{STATUS_SPINNER}{}",
        status_start_marker(distinct_id),
        status_end_marker(distinct_id)
    )
}

/// Result cell token, filled in later by the triggered job itself.
pub fn result_placeholder(distinct_id: &str) -> String {
    format!("<!--result-{distinct_id}-->")
}

/// Wraps `text` in a backtick run that never occurs inside `text`.
pub fn render_inline_code(text: &str) -> String {
    let mut delimiter = "`".to_string();
    while text.contains(delimiter.as_str()) {
        delimiter.push('`');
    }
    if text.starts_with('`') || text.ends_with('`') {
        format!("{delimiter} {text} {delimiter}")
    } else {
        format!("{delimiter}{text}{delimiter}")
    }
}

fn sanitize_error_message(message: &str) -> String {
    let collapsed = collapse_newlines(message);
    let trimmed = collapsed.trim();
    if trimmed.is_empty() {
        return "unknown error".to_string();
    }
    truncate_with_ellipsis(trimmed, ERROR_MESSAGE_MAX_CHARS)
}

fn render_command_cell(command: &str) -> String {
    render_inline_code(&collapse_newlines(command).replace('|', "\\|"))
}

pub fn render_status_board(requesting_user: &str, rows: &[StatusBoardRow<'_>]) -> String {
    let mut lines = vec![
        format!(
            "Heya @{requesting_user}, I've started to run the jobs below. This comment will be updated as they start and finish."
        ),
        String::new(),
        "| Command | Status | Results |".to_string(),
        "| --- | --- | --- |".to_string(),
    ];
    for row in rows {
        lines.push(format!(
            "| {} | {} | {} |",
            render_command_cell(row.command),
            status_placeholder(row.distinct_id),
            result_placeholder(row.distinct_id)
        ));
    }
    lines.push(String::new());
    lines.join("\n")
}

/// Status cell content for a run that has left `PendingExternal`.
pub fn render_run_status(run: &Run) -> Option<String> {
    match run {
        Run::PendingExternal { .. } => None,
        Run::Resolved { url, .. } => Some(format!("✅ [Started]({url})")),
        Run::Errored { message, .. } => Some(format!(
            "❌ Error: {}",
            render_inline_code(&sanitize_error_message(message))
        )),
    }
}

/// Substitutes status placeholders of settled runs into `body`.
///
/// Returns `None` when nothing changed so callers can skip the write.
pub fn apply_run_updates(body: &str, runs: &[Run]) -> Option<String> {
    let mut updated = body.to_string();
    for run in runs {
        let Some(status) = render_run_status(run) else {
            continue;
        };
        let placeholder = status_placeholder(run.distinct_id());
        if updated.contains(placeholder.as_str()) {
            updated = updated.replace(placeholder.as_str(), status.as_str());
        }
    }
    if updated == body {
        None
    } else {
        Some(updated)
    }
}
