use std::fmt;

use serde::{Deserialize, Serialize};

/// Relationship between a comment author and the repository, as reported by
/// GitHub's `author_association` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorAssociation {
    Owner,
    Member,
    Collaborator,
    Contributor,
    FirstTimeContributor,
    FirstTimer,
    Mannequin,
    #[serde(other)]
    None,
}

pub const DEFAULT_ALLOWED_ROLES: [AuthorAssociation; 3] = [
    AuthorAssociation::Owner,
    AuthorAssociation::Member,
    AuthorAssociation::Collaborator,
];

impl AuthorAssociation {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "OWNER" => Self::Owner,
            "MEMBER" => Self::Member,
            "COLLABORATOR" => Self::Collaborator,
            "CONTRIBUTOR" => Self::Contributor,
            "FIRST_TIME_CONTRIBUTOR" => Self::FirstTimeContributor,
            "FIRST_TIMER" => Self::FirstTimer,
            "MANNEQUIN" => Self::Mannequin,
            _ => Self::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "OWNER",
            Self::Member => "MEMBER",
            Self::Collaborator => "COLLABORATOR",
            Self::Contributor => "CONTRIBUTOR",
            Self::FirstTimeContributor => "FIRST_TIME_CONTRIBUTOR",
            Self::FirstTimer => "FIRST_TIMER",
            Self::Mannequin => "MANNEQUIN",
            Self::None => "NONE",
        }
    }
}

impl fmt::Display for AuthorAssociation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::AuthorAssociation;

    #[test]
    fn unit_parse_maps_known_labels_case_insensitively() {
        assert_eq!(AuthorAssociation::parse("OWNER"), AuthorAssociation::Owner);
        assert_eq!(AuthorAssociation::parse("member"), AuthorAssociation::Member);
        assert_eq!(
            AuthorAssociation::parse(" first_time_contributor "),
            AuthorAssociation::FirstTimeContributor
        );
    }

    #[test]
    fn regression_unknown_labels_fall_back_to_none() {
        assert_eq!(
            AuthorAssociation::parse("SUPREME_LEADER"),
            AuthorAssociation::None
        );
        let parsed: AuthorAssociation =
            serde_json::from_str("\"SUPREME_LEADER\"").expect("deserialize");
        assert_eq!(parsed, AuthorAssociation::None);
        let parsed: AuthorAssociation = serde_json::from_str("\"COLLABORATOR\"").expect("collab");
        assert_eq!(parsed, AuthorAssociation::Collaborator);
    }
}
