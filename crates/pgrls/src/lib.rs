//! pgrls - PostgreSQL Row Level Security policy compiler
//!
//! This crate builds access predicates as typed condition trees and compiles
//! them into `CREATE POLICY` statements, optionally with supporting
//! `CREATE INDEX` statements.
//!
//! # Building blocks
//!
//! ```text
//! column("user_id").eq(current_auth_id())           "user_id" = auth.uid()
//! column("tenant_id").belongs_to_tenant("app.t")    "tenant_id" = current_setting('app.t', true)::integer
//! column("user_id").is_member_of("members", "team_id")
//! has_role("admin")                                  EXISTS (SELECT 1 FROM user_roles ...)
//! from("members").select("team_id").filter(...)      (SELECT team_id FROM members WHERE ...)
//! ```
//!
//! Conditions compose with [`Condition::and`] and [`Condition::or`]. Every
//! caller-supplied value is escaped at render time, and subquery clauses are
//! checked for references to tables that are not joined.
//!
//! # Usage
//!
//! ```rust
//! use pgrls::{column, from, policy, Operation, RenderOptions};
//!
//! let teams = from("team_members")
//!     .select("team_id")
//!     .filter(column("user_id").is_owner())
//!     .unwrap()
//!     .to_subquery();
//!
//! let sql = policy("projects_team_read")
//!     .on("projects")
//!     .for_operation(Operation::Select)
//!     .to("authenticated")
//!     .allow(column("team_id").is_in(teams).or(column("is_public").is_public()))
//!     .to_sql(&RenderOptions::default().with_indexes())
//!     .unwrap();
//!
//! assert!(sql.starts_with("CREATE INDEX IF NOT EXISTS idx_projects_team_id"));
//! ```

pub mod column;
pub mod condition;
pub mod context;
pub mod ddl;
pub mod error;
pub mod escape;
pub mod group;
pub mod helpers;
pub mod index;
pub mod manifest;
pub mod policy;
pub mod scope;
pub mod subquery;
pub mod templates;
pub mod value;

// Re-export main types
pub use column::{column, ColumnBuilder};
pub use condition::{
    ComparisonOp, Condition, FunctionArg, LogicalOp, MembershipOp, MembershipValue, NullCheckOp,
    PatternOp,
};
pub use context::{
    current_auth_id, current_database_user, session_variable, ContextExpr, SessionVarType,
};
pub use ddl::{drop_policy_sql, enable_rls_sql, force_rls_sql};
pub use error::{ClauseKind, ErrorKind, ManifestError, ManifestResult, PolicyError, PolicyResult};
pub use escape::{escape_identifier, escape_value};
pub use group::{create_policy_group, policy_group_to_sql, PolicyGroup};
pub use helpers::{always_true, call, has_role, has_role_in};
pub use manifest::PolicyManifest;
pub use policy::{
    policy, NamedPolicy, Operation, ParseOperationError, PolicyBuilder, PolicyDefinition,
    RenderOptions, TargetedPolicy,
};
pub use subquery::{from, from_aliased, JoinClause, JoinKind, SubqueryBuilder, SubqueryDefinition};
pub use templates::{public_access, role_access, tenant_isolation, user_owned};
pub use value::{raw, Value};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_policy_end_to_end() {
        let sql = policy("notes_owner")
            .on("notes")
            .for_operation(Operation::All)
            .allow(column("user_id").eq(current_auth_id()))
            .to_sql(&RenderOptions::default())
            .unwrap();
        assert_eq!(
            sql,
            "CREATE POLICY \"notes_owner\" ON \"notes\" FOR ALL \
             USING (\"user_id\" = auth.uid()) WITH CHECK (\"user_id\" = auth.uid())"
        );
    }

    #[test]
    fn test_scope_error_surfaces_at_filter() {
        let err = from("t").filter(column("m.col").eq(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Scope);
        assert_eq!(err.missing_tables(), ["m".to_string()]);
    }

    #[test]
    fn test_session_variable_in_policy() {
        let sql = policy("org_scope")
            .on("invoices")
            .for_operation(Operation::Select)
            .when(column("org_id").eq(session_variable("app.org_id", SessionVarType::Uuid)))
            .to_sql(&RenderOptions::default())
            .unwrap();
        assert!(sql.ends_with("USING (\"org_id\" = current_setting('app.org_id', true)::uuid)"));
    }

    #[test]
    fn test_current_database_user() {
        let condition = column("created_by").eq(current_database_user());
        assert_eq!(condition.to_sql(), "\"created_by\" = current_user");
    }
}
