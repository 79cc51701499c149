//! Leaf conditions that are not bound to a column.

use crate::condition::{Condition, FunctionArg, HELPER_ALWAYS_TRUE, HELPER_HAS_ROLE};
use crate::value::Value;

/// Default table holding `(user_id, role)` assignments.
pub const DEFAULT_ROLE_TABLE: &str = "user_roles";

/// The authenticated user holds `role` in the default role table.
pub fn has_role(role: impl Into<String>) -> Condition {
    has_role_in(role, DEFAULT_ROLE_TABLE)
}

/// The authenticated user holds `role` according to `table`.
///
/// ```rust
/// use pgrls::has_role_in;
///
/// assert_eq!(
///     has_role_in("editor", "memberships").to_sql(),
///     "EXISTS (SELECT 1 FROM memberships WHERE user_id = auth.uid() AND role = 'editor')"
/// );
/// ```
pub fn has_role_in(role: impl Into<String>, table: impl Into<String>) -> Condition {
    Condition::Helper {
        name: HELPER_HAS_ROLE.to_string(),
        params: vec![
            ("role".to_string(), Value::String(role.into())),
            ("table".to_string(), Value::String(table.into())),
        ],
    }
}

/// A predicate that always holds.
pub fn always_true() -> Condition {
    Condition::Helper {
        name: HELPER_ALWAYS_TRUE.to_string(),
        params: Vec::new(),
    }
}

/// Invoke a SQL function. String arguments are column references, anything
/// else is a nested condition.
pub fn call<A: Into<FunctionArg>>(
    function: impl Into<String>,
    args: impl IntoIterator<Item = A>,
) -> Condition {
    Condition::FunctionCall {
        name: function.into(),
        args: args.into_iter().map(Into::into).collect(),
    }
}
