//! Error types for policy construction and rendering.

use thiserror::Error;

/// The clause a scope check was run for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseKind {
    /// A subquery `WHERE` clause.
    Where,
    /// The `ON` clause of a join.
    JoinOn,
}

impl std::fmt::Display for ClauseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClauseKind::Where => write!(f, "WHERE"),
            ClauseKind::JoinOn => write!(f, "JOIN ON"),
        }
    }
}

/// Broad classification of a [`PolicyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A clause references a table that is not in scope.
    Scope,
    /// The shape of the definition is invalid (second join, no predicate).
    Structural,
}

/// Errors raised by the builders.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A clause references tables that the enclosing scope does not declare.
    #[error(
        "{clause} clause references table(s) not available in this scope: {}{}",
        .tables.join(", "),
        .hint.as_ref().map(|h| format!(" ({h})")).unwrap_or_default()
    )]
    MissingTables {
        /// Clause being attached.
        clause: ClauseKind,
        /// Missing tables, in first-seen order.
        tables: Vec<String>,
        /// Tables that were available.
        available: Vec<String>,
        /// Suggested fix.
        hint: Option<String>,
    },

    /// A subquery already has a join.
    #[error(
        "subquery on '{table}' already joins '{existing}'; only one join per subquery is supported"
    )]
    DuplicateJoin {
        /// The from-table of the subquery.
        table: String,
        /// The table joined first.
        existing: String,
    },

    /// A policy has neither a USING nor a WITH CHECK predicate.
    #[error("policy '{policy}' has neither a USING nor a WITH CHECK clause")]
    MissingPredicate {
        /// Policy name.
        policy: String,
    },
}

impl PolicyError {
    /// Get the error kind for programmatic handling.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PolicyError::MissingTables { .. } => ErrorKind::Scope,
            PolicyError::DuplicateJoin { .. } | PolicyError::MissingPredicate { .. } => {
                ErrorKind::Structural
            }
        }
    }

    /// Tables reported missing by a scope error.
    pub fn missing_tables(&self) -> &[String] {
        match self {
            PolicyError::MissingTables { tables, .. } => tables,
            _ => &[],
        }
    }
}

/// Result type for builder operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Errors raised while loading a policy manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The input is not a well-formed manifest document.
    #[error("failed to parse manifest: {0}")]
    Json(#[from] serde_json::Error),

    /// The document parsed but describes something that cannot be built.
    #[error("invalid manifest: {0}")]
    Invalid(String),

    /// A builder rejected a lowered policy or subquery.
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// Result type for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PolicyError::MissingTables {
            clause: ClauseKind::Where,
            tables: vec!["m".to_string(), "o".to_string()],
            available: vec!["t".to_string()],
            hint: Some("add .join(JoinClause::inner(\"m\", ...))".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("WHERE clause"));
        assert!(msg.contains("m, o"));
        assert!(msg.contains("JoinClause::inner"));

        let err = PolicyError::MissingPredicate {
            policy: "docs_read".to_string(),
        };
        assert!(err.to_string().contains("docs_read"));
    }

    #[test]
    fn test_error_kinds() {
        let err = PolicyError::DuplicateJoin {
            table: "t".into(),
            existing: "m".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Structural);
        assert!(err.missing_tables().is_empty());

        let err = PolicyError::MissingTables {
            clause: ClauseKind::JoinOn,
            tables: vec!["x".into()],
            available: vec![],
            hint: None,
        };
        assert_eq!(err.kind(), ErrorKind::Scope);
        assert_eq!(err.missing_tables(), ["x".to_string()]);
    }

    #[test]
    fn test_manifest_error_wraps_policy_error() {
        let err: ManifestError = PolicyError::MissingPredicate {
            policy: "p".to_string(),
        }
        .into();
        assert!(matches!(err, ManifestError::Policy(_)));
        assert_eq!(
            err.to_string(),
            "policy 'p' has neither a USING nor a WITH CHECK clause"
        );

        let err: ManifestError = serde_json::from_str::<u8>("x").unwrap_err().into();
        assert!(err.to_string().starts_with("failed to parse manifest"));
    }
}
