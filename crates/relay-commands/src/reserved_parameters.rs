use serde_json::{Map, Value};
use thiserror::Error;

pub const RESERVED_PARAMETER_NAMES: [&str; 4] = [
    "distinct_id",
    "source_issue",
    "requesting_user",
    "status_comment",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("custom parameter `{name}` collides with a reserved parameter")]
pub struct ReservedParameterError {
    pub name: String,
}

#[derive(Debug, Clone, Copy)]
/// Parameters attached to every outbound job request.
pub struct ReservedParameters<'a> {
    pub distinct_id: &'a str,
    pub source_issue: u64,
    pub requesting_user: &'a str,
    pub status_comment: u64,
}

impl ReservedParameters<'_> {
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(
            "distinct_id".to_string(),
            Value::String(self.distinct_id.to_string()),
        );
        map.insert("source_issue".to_string(), Value::from(self.source_issue));
        map.insert(
            "requesting_user".to_string(),
            Value::String(self.requesting_user.to_string()),
        );
        map.insert(
            "status_comment".to_string(),
            Value::from(self.status_comment),
        );
        map
    }
}

/// Merges a handler's custom parameters with the reserved set.
///
/// Custom keys may not shadow reserved ones; a collision is a handler bug.
pub fn merge_request_parameters(
    custom: Map<String, Value>,
    reserved: &ReservedParameters<'_>,
) -> Result<Map<String, Value>, ReservedParameterError> {
    if let Some(name) = custom
        .keys()
        .find(|key| RESERVED_PARAMETER_NAMES.contains(&key.as_str()))
    {
        return Err(ReservedParameterError { name: name.clone() });
    }
    let mut merged = reserved.to_map();
    merged.extend(custom);
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use super::{merge_request_parameters, ReservedParameterError, ReservedParameters};

    fn reserved() -> ReservedParameters<'static> {
        ReservedParameters {
            distinct_id: "abc123",
            source_issue: 42,
            requesting_user: "alice",
            status_comment: 9001,
        }
    }

    #[test]
    fn functional_merge_request_parameters_injects_reserved_values() {
        let mut custom = Map::new();
        custom.insert("target_branch".to_string(), json!("release-5.4"));
        let merged = merge_request_parameters(custom, &reserved()).expect("merge");
        assert_eq!(merged["distinct_id"], json!("abc123"));
        assert_eq!(merged["source_issue"], json!(42));
        assert_eq!(merged["requesting_user"], json!("alice"));
        assert_eq!(merged["status_comment"], json!(9001));
        assert_eq!(merged["target_branch"], json!("release-5.4"));
    }

    #[test]
    fn regression_merge_request_parameters_rejects_reserved_collisions() {
        let mut custom = Map::new();
        custom.insert("requesting_user".to_string(), Value::from("mallory"));
        assert_eq!(
            merge_request_parameters(custom, &reserved()),
            Err(ReservedParameterError {
                name: "requesting_user".to_string(),
            })
        );
    }
}
