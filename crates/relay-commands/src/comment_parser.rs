use std::collections::HashSet;

use regex::Captures;

use crate::author_association::AuthorAssociation;
use crate::command_registry::{CommandDefinition, CommandRegistry};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Owned copy of a pattern match so it can travel into spawned handlers.
pub struct CommandMatch {
    text: String,
    groups: Vec<Option<String>>,
}

impl CommandMatch {
    fn from_captures(captures: &Captures<'_>) -> Self {
        let text = captures
            .get(0)
            .map(|full| full.as_str().to_string())
            .unwrap_or_default();
        let groups = captures
            .iter()
            .skip(1)
            .map(|group| group.map(|value| value.as_str().to_string()))
            .collect();
        Self { text, groups }
    }

    /// Builds a match by hand; handy for handlers exercised without a parser.
    pub fn new(text: &str, groups: &[Option<&str>]) -> Self {
        Self {
            text: text.to_string(),
            groups: groups
                .iter()
                .map(|group| group.map(ToOwned::to_owned))
                .collect(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns capture group `index` (1-based, as in regex syntax) when it
    /// participated in the match with non-empty text.
    pub fn group(&self, index: usize) -> Option<&str> {
        let slot = index.checked_sub(1)?;
        self.groups
            .get(slot)?
            .as_deref()
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug)]
/// One comment line that matched a registered command.
pub struct MatchedCommand<'r, H> {
    pub line: String,
    pub captures: CommandMatch,
    pub definition: &'r CommandDefinition<H>,
}

/// Returns the command text after `handle` when `line` starts with it.
///
/// The handle comparison ignores ASCII case and must be followed by the end of
/// the handle token: whitespace or a colon. `@bot:` and `@bot ` both qualify,
/// `@botty` does not.
pub fn strip_bot_handle<'a>(line: &'a str, handle: &str) -> Option<&'a str> {
    let trimmed = line.trim();
    let handle = handle.trim();
    if handle.is_empty() {
        return None;
    }
    let prefix = trimmed.get(..handle.len())?;
    if !prefix.eq_ignore_ascii_case(handle) {
        return None;
    }
    let rest = &trimmed[handle.len()..];
    let rest = if let Some(after_colon) = rest.strip_prefix(':') {
        after_colon
    } else if rest.starts_with(char::is_whitespace) {
        rest
    } else {
        return None;
    };
    let command = rest.trim();
    if command.is_empty() {
        None
    } else {
        Some(command)
    }
}

/// Collects bot-addressed command lines in comment order with the handle
/// stripped. Duplicates are kept; dedup happens after alias expansion.
pub fn addressed_command_lines(body: &str, handle: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| strip_bot_handle(line, handle))
        .map(ToOwned::to_owned)
        .collect()
}

fn dedup_preserving_order(lines: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    lines
        .into_iter()
        .filter(|line| seen.insert(line.clone()))
        .collect()
}

/// Parses a comment body into the commands the caller may run here.
///
/// Lines that match nothing, or match a command the caller's role or context
/// rules out, are dropped without feedback.
pub fn parse_comment_commands<'r, H>(
    body: &str,
    handle: &str,
    role: AuthorAssociation,
    is_pr: bool,
    registry: &'r CommandRegistry<H>,
) -> Vec<MatchedCommand<'r, H>> {
    let lines = addressed_command_lines(body, handle);
    if lines.is_empty() {
        return Vec::new();
    }
    let lines = dedup_preserving_order(registry.expand_aliases(lines));
    let applicable = registry.applicable(role, is_pr).collect::<Vec<_>>();

    let mut matched = Vec::new();
    for line in lines {
        let hit = applicable.iter().find_map(|definition| {
            definition
                .pattern()
                .captures(&line)
                .map(|captures| (*definition, CommandMatch::from_captures(&captures)))
        });
        match hit {
            Some((definition, captures)) => matched.push(MatchedCommand {
                line,
                captures,
                definition,
            }),
            None => tracing::debug!(line = %line, role = %role, is_pr, "ignoring unmatched command line"),
        }
    }
    matched
}
