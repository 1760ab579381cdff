use regex::{Regex, RegexBuilder};
use thiserror::Error;

use crate::author_association::{AuthorAssociation, DEFAULT_ALLOWED_ROLES};

#[derive(Debug, Error)]
/// Enumerates failures raised while building a `CommandRegistry`.
pub enum RegistryError {
    #[error("invalid command pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("command pattern '{pattern}' allows no author roles")]
    EmptyRoles { pattern: String },
    #[error("command alias '{line}' expands to nothing")]
    EmptyAlias { line: String },
}

#[derive(Debug, Clone)]
/// One registered command: a line pattern, its handler, and who may run it where.
pub struct CommandDefinition<H> {
    pattern_source: String,
    pattern: Regex,
    handler: H,
    allowed_roles: Vec<AuthorAssociation>,
    pr_only: bool,
}

impl<H> CommandDefinition<H> {
    pub fn pattern_source(&self) -> &str {
        &self.pattern_source
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn allowed_roles(&self) -> &[AuthorAssociation] {
        &self.allowed_roles
    }

    pub fn pr_only(&self) -> bool {
        self.pr_only
    }

    pub fn is_applicable(&self, role: AuthorAssociation, is_pr: bool) -> bool {
        if self.pr_only && !is_pr {
            return false;
        }
        self.allowed_roles.contains(&role)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A short command line that stands for a fixed bundle of other command lines.
pub struct CommandAlias {
    pub line: String,
    pub expansion: Vec<String>,
}

#[derive(Debug, Clone)]
/// Ordered pattern table. Registration order is the tie-break when several
/// patterns match the same line, so longer forms must be registered before
/// their prefixes ("run dt slower" before "run dt").
pub struct CommandRegistry<H> {
    definitions: Vec<CommandDefinition<H>>,
    aliases: Vec<CommandAlias>,
}

impl<H> Default for CommandRegistry<H> {
    fn default() -> Self {
        Self {
            definitions: Vec::new(),
            aliases: Vec::new(),
        }
    }
}

impl<H> CommandRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a PR-only command open to owners, members and collaborators.
    pub fn register(&mut self, pattern: &str, handler: H) -> Result<&mut Self, RegistryError> {
        self.register_with(pattern, handler, &DEFAULT_ALLOWED_ROLES, true)
    }

    pub fn register_with(
        &mut self,
        pattern: &str,
        handler: H,
        allowed_roles: &[AuthorAssociation],
        pr_only: bool,
    ) -> Result<&mut Self, RegistryError> {
        if allowed_roles.is_empty() {
            return Err(RegistryError::EmptyRoles {
                pattern: pattern.to_string(),
            });
        }
        let compiled = RegexBuilder::new(&format!("^(?:{pattern})"))
            .case_insensitive(true)
            .build()
            .map_err(|source| RegistryError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
        self.definitions.push(CommandDefinition {
            pattern_source: pattern.to_string(),
            pattern: compiled,
            handler,
            allowed_roles: allowed_roles.to_vec(),
            pr_only,
        });
        Ok(self)
    }

    pub fn register_alias(
        &mut self,
        line: &str,
        expansion: &[&str],
    ) -> Result<&mut Self, RegistryError> {
        let expansion = expansion
            .iter()
            .map(|entry| entry.trim().to_string())
            .filter(|entry| !entry.is_empty())
            .collect::<Vec<_>>();
        if expansion.is_empty() {
            return Err(RegistryError::EmptyAlias {
                line: line.to_string(),
            });
        }
        self.aliases.push(CommandAlias {
            line: line.trim().to_string(),
            expansion,
        });
        Ok(self)
    }

    pub fn definitions(&self) -> &[CommandDefinition<H>] {
        &self.definitions
    }

    pub fn aliases(&self) -> &[CommandAlias] {
        &self.aliases
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Definitions usable by `role` in the given context, in registration order.
    pub fn applicable(
        &self,
        role: AuthorAssociation,
        is_pr: bool,
    ) -> impl Iterator<Item = &CommandDefinition<H>> + '_ {
        self.definitions
            .iter()
            .filter(move |definition| definition.is_applicable(role, is_pr))
    }

    /// Replaces alias lines with their bundles; other lines pass through in order.
    pub fn expand_aliases(&self, lines: Vec<String>) -> Vec<String> {
        if self.aliases.is_empty() {
            return lines;
        }
        let mut expanded = Vec::with_capacity(lines.len());
        for line in lines {
            match self
                .aliases
                .iter()
                .find(|alias| alias.line.eq_ignore_ascii_case(&line))
            {
                Some(alias) => expanded.extend(alias.expansion.iter().cloned()),
                None => expanded.push(line),
            }
        }
        expanded
    }
}

#[cfg(test)]
mod tests {
    use super::{CommandRegistry, RegistryError};
    use crate::AuthorAssociation;

    #[test]
    fn unit_register_anchors_and_ignores_case() {
        let mut registry = CommandRegistry::new();
        registry.register("pack this", "pack").expect("register");
        let definition = &registry.definitions()[0];
        assert!(definition.pattern().is_match("PACK THIS please"));
        assert!(!definition.pattern().is_match("please pack this"));
        assert_eq!(definition.pattern_source(), "pack this");
        assert!(definition.pr_only());
        assert_eq!(definition.allowed_roles(), &crate::DEFAULT_ALLOWED_ROLES);
    }

    #[test]
    fn functional_applicable_filters_roles_and_context_in_order() {
        let mut registry = CommandRegistry::new();
        registry
            .register("first", 1)
            .expect("first")
            .register_with("second", 2, &[AuthorAssociation::Contributor], false)
            .expect("second")
            .register_with("third", 3, &[AuthorAssociation::Member], false)
            .expect("third");

        let member_issue = registry
            .applicable(AuthorAssociation::Member, false)
            .map(|definition| *definition.handler())
            .collect::<Vec<_>>();
        assert_eq!(member_issue, vec![3]);

        let member_pr = registry
            .applicable(AuthorAssociation::Member, true)
            .map(|definition| *definition.handler())
            .collect::<Vec<_>>();
        assert_eq!(member_pr, vec![1, 3]);

        let contributor_pr = registry
            .applicable(AuthorAssociation::Contributor, true)
            .map(|definition| *definition.handler())
            .collect::<Vec<_>>();
        assert_eq!(contributor_pr, vec![2]);
    }

    #[test]
    fn integration_expand_aliases_replaces_in_place() {
        let mut registry = CommandRegistry::<()>::new();
        registry
            .register_alias("test it", &["test this", "run dt"])
            .expect("alias");
        let expanded = registry.expand_aliases(vec![
            "pack this".to_string(),
            "Test It".to_string(),
            "run dt".to_string(),
        ]);
        assert_eq!(
            expanded,
            vec![
                "pack this".to_string(),
                "test this".to_string(),
                "run dt".to_string(),
                "run dt".to_string(),
            ]
        );
    }

    #[test]
    fn regression_register_rejects_bad_patterns_empty_roles_and_empty_aliases() {
        let mut registry = CommandRegistry::new();
        let invalid = registry.register("run (dt", ()).expect_err("invalid regex");
        assert!(matches!(invalid, RegistryError::InvalidPattern { .. }));
        let no_roles = registry
            .register_with("run dt", (), &[], true)
            .expect_err("no roles");
        assert!(matches!(no_roles, RegistryError::EmptyRoles { .. }));
        let empty_alias = registry
            .register_alias("test it", &["  "])
            .expect_err("empty alias");
        assert!(matches!(empty_alias, RegistryError::EmptyAlias { .. }));
        assert!(registry.is_empty());
    }
}
