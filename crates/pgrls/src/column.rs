//! Column-bound condition builders.

use chrono::{DateTime, Utc};

use crate::condition::{
    ComparisonOp, Condition, MembershipOp, MembershipValue, NullCheckOp, PatternOp,
    HELPER_IS_MEMBER_OF,
};
use crate::context::{current_auth_id, session_variable, SessionVarType};
use crate::subquery::SubqueryBuilder;
use crate::value::{raw, Value};

/// Column used to match rows of membership tables against the current user.
pub const DEFAULT_USER_COLUMN: &str = "user_id";

/// Key column of the protected table used by [`ColumnBuilder::is_member_of`].
pub const DEFAULT_LOCAL_KEY: &str = "id";

/// Start building a condition on a column.
///
/// # Example
///
/// ```rust
/// use pgrls::{column, current_auth_id};
///
/// let owner = column("user_id").eq(current_auth_id());
/// assert_eq!(owner.to_sql(), r#""user_id" = auth.uid()"#);
/// ```
pub fn column(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder { name: name.into() }
}

/// Builder for conditions bound to a single column reference.
///
/// The reference is stored as given (`col`, `alias.col`, `"Quoted".col`);
/// quoting happens at render time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnBuilder {
    name: String,
}

impl ColumnBuilder {
    /// The column reference.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn compare(self, op: ComparisonOp, value: impl Into<Value>) -> Condition {
        Condition::Comparison {
            column: self.name,
            op,
            value: value.into(),
        }
    }

    /// `column = value`
    pub fn eq(self, value: impl Into<Value>) -> Condition {
        self.compare(ComparisonOp::Eq, value)
    }

    /// `column <> value`
    pub fn neq(self, value: impl Into<Value>) -> Condition {
        self.compare(ComparisonOp::Neq, value)
    }

    /// `column > value`
    pub fn gt(self, value: impl Into<Value>) -> Condition {
        self.compare(ComparisonOp::Gt, value)
    }

    /// `column >= value`
    pub fn gte(self, value: impl Into<Value>) -> Condition {
        self.compare(ComparisonOp::Gte, value)
    }

    /// `column < value`
    pub fn lt(self, value: impl Into<Value>) -> Condition {
        self.compare(ComparisonOp::Lt, value)
    }

    /// `column <= value`
    pub fn lte(self, value: impl Into<Value>) -> Condition {
        self.compare(ComparisonOp::Lte, value)
    }

    /// `column LIKE pattern`
    pub fn like(self, pattern: impl Into<String>) -> Condition {
        Condition::Pattern {
            column: self.name,
            op: PatternOp::Like,
            pattern: pattern.into(),
        }
    }

    /// `column ILIKE pattern`
    pub fn ilike(self, pattern: impl Into<String>) -> Condition {
        Condition::Pattern {
            column: self.name,
            op: PatternOp::ILike,
            pattern: pattern.into(),
        }
    }

    /// `column IN (...)` over a literal list or a subquery.
    pub fn is_in(self, values: impl Into<MembershipValue>) -> Condition {
        Condition::Membership {
            column: self.name,
            op: MembershipOp::In,
            value: values.into(),
        }
    }

    /// `column @> ARRAY[...]` over a literal list or a subquery.
    pub fn contains(self, values: impl Into<MembershipValue>) -> Condition {
        Condition::Membership {
            column: self.name,
            op: MembershipOp::Contains,
            value: values.into(),
        }
    }

    /// `column IS NULL`
    pub fn is_null(self) -> Condition {
        Condition::NullCheck {
            column: self.name,
            op: NullCheckOp::IsNull,
        }
    }

    /// `column IS NOT NULL`
    pub fn is_not_null(self) -> Condition {
        Condition::NullCheck {
            column: self.name,
            op: NullCheckOp::IsNotNull,
        }
    }

    /// The row belongs to the authenticated user.
    pub fn is_owner(self) -> Condition {
        self.eq(current_auth_id())
    }

    /// The row is flagged public.
    pub fn is_public(self) -> Condition {
        self.eq(true)
    }

    /// The row belongs to the tenant stored in the session setting `key`.
    pub fn belongs_to_tenant(self, key: impl Into<String>) -> Condition {
        self.eq(session_variable(key, SessionVarType::Integer))
    }

    /// The row's `id` appears in `join_table.foreign_key` for a membership row
    /// whose `user_id` equals the authenticated user.
    ///
    /// The bound column only starts the chain; the predicate is keyed on the
    /// local key and the membership table's [`DEFAULT_USER_COLUMN`].
    ///
    /// ```rust
    /// use pgrls::column;
    ///
    /// let member = column("project_id").is_member_of("project_members", "project_id");
    /// assert_eq!(
    ///     member.to_sql(),
    ///     r#""id" IN (SELECT project_id FROM project_members WHERE "user_id" = auth.uid())"#
    /// );
    /// ```
    pub fn is_member_of(
        self,
        join_table: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Condition {
        self.is_member_of_with_key(join_table, foreign_key, DEFAULT_LOCAL_KEY)
    }

    /// Like [`is_member_of`](Self::is_member_of) with an explicit local key.
    pub fn is_member_of_with_key(
        self,
        join_table: impl Into<String>,
        foreign_key: impl Into<String>,
        local_key: impl Into<String>,
    ) -> Condition {
        Condition::Helper {
            name: HELPER_IS_MEMBER_OF.to_string(),
            params: vec![
                ("join_table".to_string(), Value::String(join_table.into())),
                ("foreign_key".to_string(), Value::String(foreign_key.into())),
                ("local_key".to_string(), Value::String(local_key.into())),
            ],
        }
    }

    /// The column's value is one of the values of the same column in `table`
    /// for rows owned by the authenticated user.
    pub fn user_belongs_to(self, table: impl Into<String>) -> Condition {
        let select = self.name.clone();
        self.user_belongs_to_column(table, select)
    }

    /// The column's value is one of `table.select_column` for rows owned by
    /// the authenticated user.
    pub fn user_belongs_to_column(
        self,
        table: impl Into<String>,
        select_column: impl Into<String>,
    ) -> Condition {
        let subquery = SubqueryBuilder::new(table)
            .select(select_column)
            .filter_unscoped(column(DEFAULT_USER_COLUMN).is_owner())
            .to_subquery();
        self.is_in(subquery)
    }

    /// `column <= date`, or `column <= now()` when no date is given.
    pub fn released_before(self, date: Option<DateTime<Utc>>) -> Condition {
        match date {
            Some(date) => self.lte(date),
            None => self.lte(raw("now()")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_shortcuts() {
        assert_eq!(column("owner_id").is_owner().to_sql(), "\"owner_id\" = auth.uid()");
        assert_eq!(column("is_public").is_public().to_sql(), "\"is_public\" = TRUE");
        assert_eq!(
            column("tenant_id")
                .belongs_to_tenant("app.current_tenant_id")
                .to_sql(),
            "\"tenant_id\" = current_setting('app.current_tenant_id', true)::integer"
        );
    }

    #[test]
    fn test_is_member_of_with_key() {
        let condition =
            column("member_id").is_member_of_with_key("team_members", "team_id", "team_id");
        assert_eq!(
            condition.to_sql(),
            "\"team_id\" IN (SELECT team_id FROM team_members WHERE \"user_id\" = auth.uid())"
        );
        assert_eq!(condition.helper_param("join_table"), Some("team_members"));
    }

    #[test]
    fn test_is_member_of_matches_membership_user_column() {
        // The bound column never stands in for the membership table's user column.
        for bound in ["project_id", "user_id", "owner_id"] {
            assert_eq!(
                column(bound)
                    .is_member_of("project_members", "project_id")
                    .to_sql(),
                "\"id\" IN (SELECT project_id FROM project_members WHERE \"user_id\" = auth.uid())"
            );
        }
    }

    #[test]
    fn test_user_belongs_to() {
        assert_eq!(
            column("org_id").user_belongs_to("org_members").to_sql(),
            "\"org_id\" IN (SELECT org_id FROM org_members WHERE \"user_id\" = auth.uid())"
        );
        assert_eq!(
            column("project_id")
                .user_belongs_to_column("assignments", "project")
                .to_sql(),
            "\"project_id\" IN (SELECT project FROM assignments WHERE \"user_id\" = auth.uid())"
        );
    }

    #[test]
    fn test_released_before() {
        assert_eq!(
            column("released_at").released_before(None).to_sql(),
            "\"released_at\" <= now()"
        );
        let date = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(
            column("released_at").released_before(Some(date)).to_sql(),
            "\"released_at\" <= '2025-06-01T00:00:00.000Z'::TIMESTAMP"
        );
    }

    #[test]
    fn test_qualified_column() {
        let condition = column("m.role").eq("admin");
        assert_eq!(condition.to_sql(), "\"m\".\"role\" = 'admin'");
        assert_eq!(condition.column(), Some("m.role"));
    }
}
