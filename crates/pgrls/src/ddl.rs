//! Table-level statements that accompany policies.

use crate::escape::{quote_column, quote_identifier};

/// `ALTER TABLE "<table>" ENABLE ROW LEVEL SECURITY`
pub fn enable_rls_sql(table: &str) -> String {
    format!("ALTER TABLE {} ENABLE ROW LEVEL SECURITY", quote_column(table))
}

/// `ALTER TABLE "<table>" FORCE ROW LEVEL SECURITY`
///
/// Applies policies to the table owner as well.
pub fn force_rls_sql(table: &str) -> String {
    format!("ALTER TABLE {} FORCE ROW LEVEL SECURITY", quote_column(table))
}

/// `DROP POLICY IF EXISTS "<name>" ON "<table>"`
pub fn drop_policy_sql(name: &str, table: &str) -> String {
    format!(
        "DROP POLICY IF EXISTS {} ON {}",
        quote_identifier(name),
        quote_column(table)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_statements() {
        assert_eq!(
            enable_rls_sql("documents"),
            "ALTER TABLE \"documents\" ENABLE ROW LEVEL SECURITY"
        );
        assert_eq!(
            force_rls_sql("app.documents"),
            "ALTER TABLE \"app\".\"documents\" FORCE ROW LEVEL SECURITY"
        );
    }

    #[test]
    fn test_drop_policy() {
        assert_eq!(
            drop_policy_sql("owner \"x\"", "documents"),
            "DROP POLICY IF EXISTS \"owner \"\"x\"\"\" ON \"documents\""
        );
    }
}
