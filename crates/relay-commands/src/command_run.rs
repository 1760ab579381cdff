use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
/// Point-in-time view of the external job a command triggered.
///
/// `distinct_id` is fixed at creation and keys the run's placeholders in the
/// status comment. Only `PendingExternal` may move, and only to `Resolved`.
pub enum Run {
    /// Dispatched through a channel that returns no job handle.
    PendingExternal { distinct_id: String },
    Resolved { distinct_id: String, url: String },
    Errored { distinct_id: String, message: String },
}

impl Run {
    pub fn pending(distinct_id: impl Into<String>) -> Self {
        Self::PendingExternal {
            distinct_id: distinct_id.into(),
        }
    }

    pub fn resolved(distinct_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self::Resolved {
            distinct_id: distinct_id.into(),
            url: url.into(),
        }
    }

    pub fn errored(distinct_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Errored {
            distinct_id: distinct_id.into(),
            message: message.into(),
        }
    }

    pub fn distinct_id(&self) -> &str {
        match self {
            Self::PendingExternal { distinct_id }
            | Self::Resolved { distinct_id, .. }
            | Self::Errored { distinct_id, .. } => distinct_id,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::PendingExternal { .. })
    }

    /// Upgrades a pending run to resolved. Terminal runs are returned unchanged.
    pub fn resolve(self, url: impl Into<String>) -> Self {
        match self {
            Self::PendingExternal { distinct_id } => Self::Resolved {
                distinct_id,
                url: url.into(),
            },
            terminal => terminal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Run;

    #[test]
    fn unit_distinct_id_is_shared_across_variants() {
        assert_eq!(Run::pending("a").distinct_id(), "a");
        assert_eq!(Run::resolved("b", "https://x").distinct_id(), "b");
        assert_eq!(Run::errored("c", "boom").distinct_id(), "c");
    }

    #[test]
    fn functional_resolve_only_moves_pending_runs() {
        let resolved = Run::pending("a").resolve("https://ci/1");
        assert_eq!(resolved, Run::resolved("a", "https://ci/1"));
        assert_eq!(
            Run::errored("b", "boom").resolve("https://ci/2"),
            Run::errored("b", "boom")
        );
        assert_eq!(
            Run::resolved("c", "https://ci/3").resolve("https://ci/4"),
            Run::resolved("c", "https://ci/3")
        );
    }

    #[test]
    fn regression_serializes_with_kind_tag() {
        let value = serde_json::to_value(Run::errored("d", "nope")).expect("serialize");
        assert_eq!(value["kind"], "errored");
        assert_eq!(value["distinct_id"], "d");
    }
}
