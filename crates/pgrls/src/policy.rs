//! The `CREATE POLICY` builder.
//!
//! The chain is a typestate: [`policy`] returns a [`NamedPolicy`], which must
//! be given a table ([`NamedPolicy::on`]) and an operation
//! ([`TargetedPolicy::for_operation`]) before any predicate can be attached.
//!
//! ```rust
//! use pgrls::{column, policy, Operation, RenderOptions};
//!
//! let sql = policy("docs_insert")
//!     .on("documents")
//!     .for_operation(Operation::Insert)
//!     .to("authenticated")
//!     .allow(column("owner_id").is_owner())
//!     .to_sql(&RenderOptions::default())
//!     .unwrap();
//!
//! assert_eq!(
//!     sql,
//!     r#"CREATE POLICY "docs_insert" ON "documents" FOR INSERT TO authenticated WITH CHECK ("owner_id" = auth.uid())"#
//! );
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::condition::Condition;
use crate::error::{PolicyError, PolicyResult};
use crate::escape::{escape_identifier, escape_string, quote_column, quote_identifier};
use crate::index::{index_statements, suggest_index_columns};

/// The statement class a policy applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    /// `SELECT`
    Select,
    /// `INSERT`
    Insert,
    /// `UPDATE`
    Update,
    /// `DELETE`
    Delete,
    /// `ALL`
    All,
}

impl Operation {
    /// The SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operation::Select => "SELECT",
            Operation::Insert => "INSERT",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
            Operation::All => "ALL",
        }
    }

    /// Whether PostgreSQL evaluates a USING clause for this operation.
    pub fn uses_using(&self) -> bool {
        !matches!(self, Operation::Insert)
    }

    /// Whether PostgreSQL evaluates a WITH CHECK clause for this operation.
    pub fn uses_check(&self) -> bool {
        matches!(self, Operation::Insert | Operation::Update | Operation::All)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Error returned when parsing an unknown operation name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown policy operation '{0}' (expected SELECT, INSERT, UPDATE, DELETE or ALL)")]
pub struct ParseOperationError(pub String);

impl FromStr for Operation {
    type Err = ParseOperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SELECT" => Ok(Operation::Select),
            "INSERT" => Ok(Operation::Insert),
            "UPDATE" => Ok(Operation::Update),
            "DELETE" => Ok(Operation::Delete),
            "ALL" => Ok(Operation::All),
            _ => Err(ParseOperationError(s.to_string())),
        }
    }
}

/// Options for rendering policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderOptions {
    /// Emit `CREATE INDEX` statements for predicate columns before the policy.
    pub include_indexes: bool,
    /// Emit a `COMMENT ON POLICY` statement after the policy when it has a
    /// description.
    pub include_comment: bool,
}

impl RenderOptions {
    /// Enable index suggestions.
    pub fn with_indexes(mut self) -> Self {
        self.include_indexes = true;
        self
    }

    /// Enable policy comments.
    pub fn with_comment(mut self) -> Self {
        self.include_comment = true;
        self
    }
}

/// A complete policy.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyDefinition {
    /// Policy name.
    pub name: String,
    /// Protected table.
    pub table: String,
    /// Operation the policy applies to.
    pub operation: Operation,
    /// Role the policy is granted to; all roles when `None`.
    pub role: Option<String>,
    /// USING predicate.
    pub using: Option<Condition>,
    /// WITH CHECK predicate.
    pub with_check: Option<Condition>,
    /// Combine with other policies by AND instead of OR.
    pub restrictive: bool,
    /// Free-form description.
    pub description: Option<String>,
}

impl PolicyDefinition {
    /// Fail unless at least one predicate is set.
    pub fn validate(&self) -> PolicyResult<()> {
        if self.using.is_none() && self.with_check.is_none() {
            return Err(PolicyError::MissingPredicate {
                policy: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Index candidates derived from the predicates.
    pub fn index_columns(&self) -> Vec<String> {
        suggest_index_columns(self.using.as_ref(), self.with_check.as_ref())
    }

    /// Render the policy, preceded by index statements and followed by a
    /// comment statement when the options ask for them.
    pub fn to_sql(&self, options: &RenderOptions) -> PolicyResult<String> {
        self.validate()?;

        let mut sql = String::new();
        if options.include_indexes {
            for statement in index_statements(&self.table, &self.index_columns()) {
                sql.push_str(&statement);
                sql.push_str(";\n");
            }
            if !sql.is_empty() {
                sql.push('\n');
            }
        }

        sql.push_str(&format!(
            "CREATE POLICY {} ON {}",
            quote_identifier(&self.name),
            quote_column(&self.table)
        ));
        if self.restrictive {
            sql.push_str(" AS RESTRICTIVE");
        }
        sql.push_str(" FOR ");
        sql.push_str(self.operation.as_sql());
        if let Some(role) = &self.role {
            sql.push_str(" TO ");
            sql.push_str(&escape_identifier(role));
        }
        if let Some(using) = &self.using {
            sql.push_str(&format!(" USING ({})", using.to_sql()));
        }
        if let Some(check) = &self.with_check {
            sql.push_str(&format!(" WITH CHECK ({})", check.to_sql()));
        }

        if options.include_comment {
            if let Some(description) = &self.description {
                sql.push_str(&format!(
                    ";\nCOMMENT ON POLICY {} ON {} IS {}",
                    quote_identifier(&self.name),
                    quote_column(&self.table),
                    escape_string(description)
                ));
            }
        }

        tracing::debug!(
            policy = %self.name,
            table = %self.table,
            operation = %self.operation,
            restrictive = self.restrictive,
            "rendered policy"
        );
        Ok(sql)
    }
}

/// Start a policy named `name`.
pub fn policy(name: impl Into<String>) -> NamedPolicy {
    NamedPolicy { name: name.into() }
}

/// A policy with a name but no table.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct NamedPolicy {
    name: String,
}

impl NamedPolicy {
    /// Set the protected table.
    pub fn on(self, table: impl Into<String>) -> TargetedPolicy {
        TargetedPolicy {
            name: self.name,
            table: table.into(),
        }
    }
}

/// A policy with a name and a table but no operation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct TargetedPolicy {
    name: String,
    table: String,
}

impl TargetedPolicy {
    /// Set the operation.
    pub fn for_operation(self, operation: Operation) -> PolicyBuilder {
        PolicyBuilder {
            definition: PolicyDefinition {
                name: self.name,
                table: self.table,
                operation,
                role: None,
                using: None,
                with_check: None,
                restrictive: false,
                description: None,
            },
        }
    }
}

/// Builder accumulating predicates and flags.
///
/// Setters replace earlier values; nothing is combined implicitly.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct PolicyBuilder {
    definition: PolicyDefinition,
}

impl PolicyBuilder {
    /// Grant the policy to `role`.
    pub fn to(mut self, role: impl Into<String>) -> Self {
        self.definition.role = Some(role.into());
        self
    }

    /// Set the USING predicate.
    pub fn when(mut self, condition: Condition) -> Self {
        self.definition.using = Some(condition);
        self
    }

    /// Set the WITH CHECK predicate.
    pub fn with_check(mut self, condition: Condition) -> Self {
        self.definition.with_check = Some(condition);
        self
    }

    /// Place `condition` in the clauses the operation evaluates: WITH CHECK
    /// for INSERT, USING for SELECT and DELETE, both for UPDATE and ALL.
    pub fn allow(mut self, condition: Condition) -> Self {
        let operation = self.definition.operation;
        match (operation.uses_using(), operation.uses_check()) {
            (true, true) => {
                self.definition.using = Some(condition.clone());
                self.definition.with_check = Some(condition);
            }
            (true, false) => self.definition.using = Some(condition),
            (false, _) => self.definition.with_check = Some(condition),
        }
        self
    }

    /// Make the policy restrictive.
    pub fn restrictive(mut self) -> Self {
        self.definition.restrictive = true;
        self
    }

    /// Attach a description.
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.definition.description = Some(text.into());
        self
    }

    /// The definition accumulated so far, without validation.
    pub fn definition(&self) -> &PolicyDefinition {
        &self.definition
    }

    /// Validate and produce the definition.
    pub fn build(self) -> PolicyResult<PolicyDefinition> {
        self.definition.validate()?;
        Ok(self.definition)
    }

    /// Render the policy.
    pub fn to_sql(&self, options: &RenderOptions) -> PolicyResult<String> {
        self.definition.to_sql(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::column;
    use crate::error::ErrorKind;

    fn docs(operation: Operation) -> PolicyBuilder {
        policy("docs_policy").on("documents").for_operation(operation)
    }

    #[test]
    fn test_allow_mapping() {
        let cond = column("owner_id").is_owner();

        let insert = docs(Operation::Insert).allow(cond.clone());
        assert!(insert.definition().using.is_none());
        assert!(insert.definition().with_check.is_some());

        for op in [Operation::Select, Operation::Delete] {
            let builder = docs(op).allow(cond.clone());
            assert!(builder.definition().using.is_some());
            assert!(builder.definition().with_check.is_none());
        }

        for op in [Operation::Update, Operation::All] {
            let builder = docs(op).allow(cond.clone());
            assert_eq!(builder.definition().using, builder.definition().with_check);
            assert!(builder.definition().using.is_some());
        }
    }

    #[test]
    fn test_insert_renders_only_with_check() {
        let sql = docs(Operation::Insert)
            .allow(column("owner_id").is_owner())
            .to_sql(&RenderOptions::default())
            .unwrap();
        assert_eq!(
            sql,
            "CREATE POLICY \"docs_policy\" ON \"documents\" FOR INSERT WITH CHECK (\"owner_id\" = auth.uid())"
        );
        assert!(!sql.contains("USING"));
    }

    #[test]
    fn test_independent_clauses() {
        let sql = docs(Operation::Update)
            .when(column("a").eq(1))
            .with_check(column("b").eq(2))
            .to_sql(&RenderOptions::default())
            .unwrap();
        assert!(sql.ends_with("FOR UPDATE USING (\"a\" = 1) WITH CHECK (\"b\" = 2)"));
    }

    #[test]
    fn test_restrictive_and_role() {
        let sql = docs(Operation::Select)
            .to("Support Staff")
            .when(column("tenant_id").eq(3))
            .restrictive()
            .to_sql(&RenderOptions::default())
            .unwrap();
        assert_eq!(
            sql,
            "CREATE POLICY \"docs_policy\" ON \"documents\" AS RESTRICTIVE FOR SELECT TO \"Support Staff\" USING (\"tenant_id\" = 3)"
        );
    }

    #[test]
    fn test_missing_predicate_fails() {
        let builder = docs(Operation::Select).to("authenticated");
        let err = builder.to_sql(&RenderOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
        assert!(builder.build().is_err());
    }

    #[test]
    fn test_render_is_repeatable() {
        let builder = docs(Operation::Select).when(column("a").eq(1));
        let options = RenderOptions::default().with_indexes();
        assert_eq!(
            builder.to_sql(&options).unwrap(),
            builder.to_sql(&options).unwrap()
        );
    }

    #[test]
    fn test_indexes_precede_policy() {
        let sql = docs(Operation::Select)
            .when(column("a").eq(1).and(column("b").eq(2)).and(column("a").eq(3)))
            .to_sql(&RenderOptions::default().with_indexes())
            .unwrap();
        let expected = "CREATE INDEX IF NOT EXISTS idx_documents_a ON \"documents\" (\"a\");\n\
                        CREATE INDEX IF NOT EXISTS idx_documents_b ON \"documents\" (\"b\");\n\
                        \n\
                        CREATE POLICY \"docs_policy\" ON \"documents\" FOR SELECT USING \
                        ((\"a\" = 1 AND \"b\" = 2 AND \"a\" = 3))";
        assert_eq!(sql, expected);
    }

    #[test]
    fn test_no_index_block_without_candidates() {
        let sql = docs(Operation::Select)
            .when(column("a").gt(1))
            .to_sql(&RenderOptions::default().with_indexes())
            .unwrap();
        assert!(sql.starts_with("CREATE POLICY"));
    }

    #[test]
    fn test_comment_suffix() {
        let builder = docs(Operation::Select)
            .when(column("a").eq(1))
            .description("Owner's rows");
        let plain = builder.to_sql(&RenderOptions::default()).unwrap();
        assert!(!plain.contains("COMMENT"));

        let sql = builder
            .to_sql(&RenderOptions::default().with_comment())
            .unwrap();
        assert!(sql.ends_with(
            ";\nCOMMENT ON POLICY \"docs_policy\" ON \"documents\" IS 'Owner''s rows'"
        ));
    }

    #[test]
    fn test_operation_parse_and_display() {
        assert_eq!("select".parse::<Operation>().unwrap(), Operation::Select);
        assert_eq!(" ALL ".parse::<Operation>().unwrap(), Operation::All);
        assert_eq!(Operation::Delete.to_string(), "DELETE");
        let err = "MERGE".parse::<Operation>().unwrap_err();
        assert!(err.to_string().contains("MERGE"));
    }

    #[test]
    fn test_operation_serde() {
        let op: Operation = serde_json::from_str("\"UPDATE\"").unwrap();
        assert_eq!(op, Operation::Update);
        assert_eq!(serde_json::to_string(&Operation::Insert).unwrap(), "\"INSERT\"");
    }
}
