//! Subquery fragments used as membership right-hand sides.
//!
//! A subquery has one from-table, at most one join and an optional `WHERE`
//! clause. Table scope is checked when the join and the `WHERE` clause are
//! attached, so an invalid fragment can never be built.

use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::error::{ClauseKind, PolicyError, PolicyResult};
use crate::escape::{escape_identifier, escape_reference};
use crate::scope::{available_tables, detect_missing_joins};

/// Kind of join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    /// `INNER JOIN`
    #[default]
    Inner,
    /// `LEFT JOIN`
    Left,
    /// `RIGHT JOIN`
    Right,
    /// `FULL JOIN`
    Full,
}

impl JoinKind {
    /// The SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER",
            JoinKind::Left => "LEFT",
            JoinKind::Right => "RIGHT",
            JoinKind::Full => "FULL",
        }
    }
}

/// A join attached to a subquery.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    /// Join kind.
    pub kind: JoinKind,
    /// Joined table.
    pub table: String,
    /// Optional alias for the joined table.
    pub alias: Option<String>,
    /// Join condition.
    pub on: Condition,
}

impl JoinClause {
    /// Create a join.
    pub fn new(kind: JoinKind, table: impl Into<String>, on: Condition) -> Self {
        Self {
            kind,
            table: table.into(),
            alias: None,
            on,
        }
    }

    /// Create an inner join.
    pub fn inner(table: impl Into<String>, on: Condition) -> Self {
        Self::new(JoinKind::Inner, table, on)
    }

    /// Create a left join.
    pub fn left(table: impl Into<String>, on: Condition) -> Self {
        Self::new(JoinKind::Left, table, on)
    }

    /// Create a right join.
    pub fn right(table: impl Into<String>, on: Condition) -> Self {
        Self::new(JoinKind::Right, table, on)
    }

    /// Create a full join.
    pub fn full(table: impl Into<String>, on: Condition) -> Self {
        Self::new(JoinKind::Full, table, on)
    }

    /// Set the alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// The name the joined table is visible under: its alias, or the table.
    pub fn scope_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }

    fn to_sql(&self) -> String {
        let mut sql = format!("{} JOIN {}", self.kind.as_sql(), escape_reference(&self.table));
        if let Some(alias) = &self.alias {
            sql.push(' ');
            sql.push_str(&escape_identifier(alias));
        }
        sql.push_str(" ON ");
        sql.push_str(&self.on.to_sql());
        sql
    }
}

/// An immutable `SELECT` fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct SubqueryDefinition {
    /// From-table.
    pub table: String,
    /// Optional alias for the from-table.
    pub alias: Option<String>,
    /// Selected columns; empty means `*`.
    pub columns: Vec<String>,
    /// The join, if any.
    pub join: Option<JoinClause>,
    /// The `WHERE` condition, if any.
    pub filter: Option<Condition>,
}

impl SubqueryDefinition {
    /// Render the fragment, always parenthesized.
    pub fn to_sql(&self) -> String {
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns
                .iter()
                .map(|c| escape_reference(c))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut sql = format!("(SELECT {} FROM {}", columns, escape_reference(&self.table));
        if let Some(alias) = &self.alias {
            sql.push(' ');
            sql.push_str(&escape_identifier(alias));
        }
        if let Some(join) = &self.join {
            sql.push(' ');
            sql.push_str(&join.to_sql());
        }
        if let Some(filter) = &self.filter {
            sql.push_str(" WHERE ");
            sql.push_str(&filter.to_sql());
        }
        sql.push(')');
        sql
    }

    /// Tables visible to clauses of this subquery.
    pub fn available_tables(&self) -> Vec<String> {
        available_tables(&self.table, self.alias.as_deref(), self.join.as_ref())
    }
}

/// Start a subquery over `table`.
///
/// # Example
///
/// ```rust
/// use pgrls::{column, current_auth_id, from, JoinClause};
///
/// let teams = from("teams")
///     .select("teams.id")
///     .join(JoinClause::inner("members", column("members.team_id").eq(pgrls::raw("teams.id"))))
///     .unwrap()
///     .filter(column("members.user_id").eq(current_auth_id()))
///     .unwrap()
///     .to_subquery();
/// assert!(teams.to_sql().starts_with("(SELECT teams.id FROM teams INNER JOIN members ON"));
/// ```
pub fn from(table: impl Into<String>) -> SubqueryBuilder {
    SubqueryBuilder::new(table)
}

/// Start a subquery over `table AS alias`.
pub fn from_aliased(table: impl Into<String>, alias: impl Into<String>) -> SubqueryBuilder {
    SubqueryBuilder::aliased(table, alias)
}

/// Builder for [`SubqueryDefinition`].
#[derive(Debug, Clone, PartialEq)]
pub struct SubqueryBuilder {
    definition: SubqueryDefinition,
}

impl SubqueryBuilder {
    /// Create a builder selecting `*` from `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            definition: SubqueryDefinition {
                table: table.into(),
                alias: None,
                columns: Vec::new(),
                join: None,
                filter: None,
            },
        }
    }

    /// Create a builder over an aliased table.
    pub fn aliased(table: impl Into<String>, alias: impl Into<String>) -> Self {
        let mut builder = Self::new(table);
        builder.definition.alias = Some(alias.into());
        builder
    }

    /// Select a single column.
    pub fn select(mut self, column: impl Into<String>) -> Self {
        self.definition.columns = vec![column.into()];
        self
    }

    /// Select several columns.
    pub fn select_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.definition.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Attach the join.
    ///
    /// The `ON` clause may reference the from-scope and the table the join
    /// introduces. A second join is rejected.
    pub fn join(mut self, join: JoinClause) -> PolicyResult<Self> {
        if let Some(existing) = &self.definition.join {
            tracing::debug!(
                table = %self.definition.table,
                existing = %existing.table,
                rejected = %join.table,
                "rejecting second join"
            );
            return Err(PolicyError::DuplicateJoin {
                table: self.definition.table.clone(),
                existing: existing.table.clone(),
            });
        }

        let available = self.definition.available_tables();
        let mut allowed = available.clone();
        allowed.push(join.scope_name().to_string());

        let missing = detect_missing_joins(&join.on, &allowed);
        if !missing.is_empty() {
            tracing::debug!(
                table = %self.definition.table,
                joined = %join.table,
                missing = ?missing,
                "join condition references tables outside scope"
            );
            return Err(PolicyError::MissingTables {
                clause: ClauseKind::JoinOn,
                tables: missing,
                available: allowed,
                hint: Some(format!(
                    "the ON clause may only reference {} and {}",
                    available.join(", "),
                    join.scope_name()
                )),
            });
        }

        self.definition.join = Some(join);
        Ok(self)
    }

    /// Attach a `WHERE` condition.
    ///
    /// Every table the condition references must be the from-table or the
    /// joined table. Calling this again ANDs the conditions together.
    pub fn filter(self, condition: Condition) -> PolicyResult<Self> {
        let available = self.definition.available_tables();
        let missing = detect_missing_joins(&condition, &available);
        if !missing.is_empty() {
            tracing::debug!(
                table = %self.definition.table,
                missing = ?missing,
                "where condition references tables outside scope"
            );
            let hint = self.join_hint(&missing);
            return Err(PolicyError::MissingTables {
                clause: ClauseKind::Where,
                tables: missing,
                available,
                hint: Some(hint),
            });
        }
        Ok(self.filter_unscoped(condition))
    }

    /// Attach a `WHERE` condition without a scope check. Only for conditions
    /// built here from unqualified columns.
    pub(crate) fn filter_unscoped(mut self, condition: Condition) -> Self {
        self.definition.filter = Some(match self.definition.filter.take() {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    fn join_hint(&self, missing: &[String]) -> String {
        if let Some(existing) = &self.definition.join {
            return format!(
                "this subquery already joins '{}'; use a nested subquery for other tables",
                existing.scope_name()
            );
        }
        match missing {
            [table] => format!(
                "add .join(JoinClause::inner(\"{}\", <on condition>)) before .filter(...)",
                table
            ),
            _ => format!(
                "a subquery can join only one table; {} cannot all be joined here",
                missing.join(", ")
            ),
        }
    }

    /// Produce the immutable definition.
    pub fn to_subquery(&self) -> SubqueryDefinition {
        self.definition.clone()
    }
}
