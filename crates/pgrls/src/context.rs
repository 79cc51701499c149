//! Context expressions: the authenticated identity, session settings and the
//! current database role.
//!
//! These are stateless leaves. They render fixed PostgreSQL/Supabase syntax
//! and never read process state.

use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::escape::escape_string;

/// Type a session variable is cast to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionVarType {
    /// `text`
    #[default]
    Text,
    /// `integer`
    Integer,
    /// `uuid`
    Uuid,
    /// `boolean`
    Boolean,
    /// `timestamp`
    Timestamp,
}

impl SessionVarType {
    /// The SQL type name used in the cast.
    pub fn as_sql(&self) -> &'static str {
        match self {
            SessionVarType::Text => "text",
            SessionVarType::Integer => "integer",
            SessionVarType::Uuid => "uuid",
            SessionVarType::Boolean => "boolean",
            SessionVarType::Timestamp => "timestamp",
        }
    }
}

impl std::fmt::Display for SessionVarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A context expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextExpr {
    /// The authenticated user id: `auth.uid()`.
    AuthUid,
    /// A session configuration variable cast to a type.
    SessionVariable {
        /// Setting name, e.g. `app.current_tenant_id`.
        key: String,
        /// Cast applied to the setting.
        cast: SessionVarType,
    },
    /// The current database role: `current_user`.
    CurrentUser,
}

impl ContextExpr {
    /// Render the expression.
    pub fn to_sql(&self) -> String {
        match self {
            ContextExpr::AuthUid => "auth.uid()".to_string(),
            ContextExpr::SessionVariable { key, cast } => {
                format!("current_setting({}, true)::{}", escape_string(key), cast)
            }
            ContextExpr::CurrentUser => "current_user".to_string(),
        }
    }
}

/// The authenticated user's id.
pub fn current_auth_id() -> Condition {
    Condition::Context(ContextExpr::AuthUid)
}

/// A session variable read with `current_setting` and cast to `cast`.
///
/// The setting is read with `missing_ok` so an unset variable yields `NULL`
/// instead of an error.
pub fn session_variable(key: impl Into<String>, cast: SessionVarType) -> Condition {
    Condition::Context(ContextExpr::SessionVariable {
        key: key.into(),
        cast,
    })
}

/// The current database role.
pub fn current_database_user() -> Condition {
    Condition::Context(ContextExpr::CurrentUser)
}
