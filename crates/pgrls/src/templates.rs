//! Prebuilt policies for common access patterns.
//!
//! Each template returns a [`PolicyBuilder`] so the caller can still set a
//! role, a description or restrictiveness before rendering.

use crate::column::column;
use crate::helpers::has_role;
use crate::policy::{policy, Operation, PolicyBuilder};

/// Column holding the owning user's id.
pub const DEFAULT_OWNER_COLUMN: &str = "user_id";
/// Column holding the tenant id.
pub const DEFAULT_TENANT_COLUMN: &str = "tenant_id";
/// Session setting holding the current tenant id.
pub const DEFAULT_TENANT_SETTING: &str = "app.current_tenant_id";
/// Column flagging publicly readable rows.
pub const DEFAULT_PUBLIC_COLUMN: &str = "is_public";

/// Rows are accessible to the user whose id is stored in `owner_column`.
///
/// ```rust
/// use pgrls::{templates, Operation, RenderOptions};
///
/// let sql = templates::user_owned("notes", templates::DEFAULT_OWNER_COLUMN, Operation::Select)
///     .to_sql(&RenderOptions::default())
///     .unwrap();
/// assert_eq!(
///     sql,
///     r#"CREATE POLICY "notes_owner_access" ON "notes" FOR SELECT USING ("user_id" = auth.uid())"#
/// );
/// ```
pub fn user_owned(table: &str, owner_column: &str, operation: Operation) -> PolicyBuilder {
    policy(format!("{table}_owner_access"))
        .on(table)
        .for_operation(operation)
        .allow(column(owner_column).is_owner())
}

/// Rows are confined to the tenant named by the session setting
/// `session_key`, for every operation.
pub fn tenant_isolation(table: &str, tenant_column: &str, session_key: &str) -> PolicyBuilder {
    policy(format!("{table}_tenant_isolation"))
        .on(table)
        .for_operation(Operation::All)
        .allow(column(tenant_column).belongs_to_tenant(session_key))
}

/// Rows flagged in `public_column` are readable by everyone.
pub fn public_access(table: &str, public_column: &str) -> PolicyBuilder {
    policy(format!("{table}_public_read"))
        .on(table)
        .for_operation(Operation::Select)
        .allow(column(public_column).is_public())
}

/// Users holding the application role `role` may perform `operation`.
///
/// The role is looked up in the role table, so no `TO` clause is set.
pub fn role_access(table: &str, role: &str, operation: Operation) -> PolicyBuilder {
    policy(format!("{table}_{role}_access"))
        .on(table)
        .for_operation(operation)
        .allow(has_role(role))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::RenderOptions;

    fn render(builder: PolicyBuilder) -> String {
        builder.to_sql(&RenderOptions::default()).unwrap()
    }

    #[test]
    fn test_user_owned_update_sets_both_clauses() {
        let sql = render(user_owned("notes", "author_id", Operation::Update));
        assert_eq!(
            sql,
            "CREATE POLICY \"notes_owner_access\" ON \"notes\" FOR UPDATE \
             USING (\"author_id\" = auth.uid()) WITH CHECK (\"author_id\" = auth.uid())"
        );
    }

    #[test]
    fn test_tenant_isolation() {
        let sql = render(tenant_isolation(
            "orders",
            DEFAULT_TENANT_COLUMN,
            DEFAULT_TENANT_SETTING,
        ));
        assert!(sql.starts_with("CREATE POLICY \"orders_tenant_isolation\" ON \"orders\" FOR ALL"));
        assert!(sql.contains(
            "USING (\"tenant_id\" = current_setting('app.current_tenant_id', true)::integer)"
        ));
        assert!(sql.contains("WITH CHECK ("));
    }

    #[test]
    fn test_public_access() {
        assert_eq!(
            render(public_access("posts", DEFAULT_PUBLIC_COLUMN)),
            "CREATE POLICY \"posts_public_read\" ON \"posts\" FOR SELECT USING (\"is_public\" = TRUE)"
        );
    }

    #[test]
    fn test_role_access_has_no_to_clause() {
        let builder = role_access("reports", "auditor", Operation::Select);
        assert_eq!(builder.definition().name, "reports_auditor_access");
        let sql = render(builder);
        assert!(!sql.contains(" TO "));
        assert!(sql.ends_with("role = 'auditor'))"));
    }

    #[test]
    fn test_templates_accept_overrides() {
        let sql = render(
            public_access("posts", DEFAULT_PUBLIC_COLUMN)
                .to("anon")
                .restrictive(),
        );
        assert!(sql.contains("AS RESTRICTIVE FOR SELECT TO anon"));
    }
}
