//! The condition tree.
//!
//! A [`Condition`] is an immutable value. Combinators consume their operands
//! and return a new tree; nothing is mutated after construction.

use std::fmt;

use crate::column::DEFAULT_USER_COLUMN;
use crate::context::ContextExpr;
use crate::escape::{escape_reference, escape_string, escape_value, quote_column};
use crate::subquery::SubqueryDefinition;
use crate::value::Value;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    /// Equal (`=`).
    Eq,
    /// Not equal (`<>`).
    Neq,
    /// Greater than (`>`).
    Gt,
    /// Greater than or equal (`>=`).
    Gte,
    /// Less than (`<`).
    Lt,
    /// Less than or equal (`<=`).
    Lte,
}

impl ComparisonOp {
    /// The SQL operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Neq => "<>",
            ComparisonOp::Gt => ">",
            ComparisonOp::Gte => ">=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Lte => "<=",
        }
    }
}

/// Pattern matching operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternOp {
    /// Case-sensitive `LIKE`.
    Like,
    /// Case-insensitive `ILIKE`.
    ILike,
}

/// Membership operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipOp {
    /// `column IN (...)`.
    In,
    /// Array containment, `column @> ARRAY[...]`.
    Contains,
}

/// Null check operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullCheckOp {
    /// `IS NULL`.
    IsNull,
    /// `IS NOT NULL`.
    IsNotNull,
}

/// Logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// All children must hold.
    And,
    /// At least one child must hold.
    Or,
}

impl LogicalOp {
    /// The SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
        }
    }
}

/// Right-hand side of a membership condition.
#[derive(Debug, Clone, PartialEq)]
pub enum MembershipValue {
    /// A literal list of values.
    List(Vec<Value>),
    /// A subquery producing the values.
    Subquery(Box<SubqueryDefinition>),
}

impl<T: Into<Value>> From<Vec<T>> for MembershipValue {
    fn from(values: Vec<T>) -> Self {
        MembershipValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<SubqueryDefinition> for MembershipValue {
    fn from(subquery: SubqueryDefinition) -> Self {
        MembershipValue::Subquery(Box::new(subquery))
    }
}

/// An argument to a function call condition.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionArg {
    /// A column or identifier reference.
    Column(String),
    /// A nested condition or context expression.
    Condition(Box<Condition>),
}

impl From<&str> for FunctionArg {
    fn from(column: &str) -> Self {
        FunctionArg::Column(column.to_string())
    }
}

impl From<String> for FunctionArg {
    fn from(column: String) -> Self {
        FunctionArg::Column(column)
    }
}

impl From<Condition> for FunctionArg {
    fn from(condition: Condition) -> Self {
        FunctionArg::Condition(Box::new(condition))
    }
}

/// Name of the role-check helper.
pub const HELPER_HAS_ROLE: &str = "has_role";
/// Name of the constant-true helper.
pub const HELPER_ALWAYS_TRUE: &str = "always_true";
/// Name of the membership-table helper.
pub const HELPER_IS_MEMBER_OF: &str = "is_member_of";

/// A node in the condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `column <op> value`.
    Comparison {
        column: String,
        op: ComparisonOp,
        value: Value,
    },
    /// `column LIKE pattern` / `column ILIKE pattern`.
    Pattern {
        column: String,
        op: PatternOp,
        pattern: String,
    },
    /// `column IN (...)` / `column @> ...`.
    Membership {
        column: String,
        op: MembershipOp,
        value: MembershipValue,
    },
    /// `column IS [NOT] NULL`.
    NullCheck { column: String, op: NullCheckOp },
    /// A parenthesized group of two or more children joined by one operator.
    ///
    /// A child is never a `Logical` node with the same operator.
    Logical {
        op: LogicalOp,
        conditions: Vec<Condition>,
    },
    /// A named boilerplate predicate with ordered named parameters.
    Helper {
        name: String,
        params: Vec<(String, Value)>,
    },
    /// An arbitrary function invocation.
    FunctionCall { name: String, args: Vec<FunctionArg> },
    /// A context expression (`auth.uid()`, `current_setting(...)`, `current_user`).
    Context(ContextExpr),
}

impl Condition {
    /// Combine with `AND`, flattening same-operator chains.
    pub fn and(self, other: impl Into<Condition>) -> Condition {
        self.combine(LogicalOp::And, other.into())
    }

    /// Combine with `OR`, flattening same-operator chains.
    pub fn or(self, other: impl Into<Condition>) -> Condition {
        self.combine(LogicalOp::Or, other.into())
    }

    /// `AND` together all conditions. Returns `None` for an empty input.
    pub fn all(conditions: impl IntoIterator<Item = Condition>) -> Option<Condition> {
        conditions.into_iter().reduce(|acc, c| acc.and(c))
    }

    /// `OR` together all conditions. Returns `None` for an empty input.
    pub fn any(conditions: impl IntoIterator<Item = Condition>) -> Option<Condition> {
        conditions.into_iter().reduce(|acc, c| acc.or(c))
    }

    fn combine(self, op: LogicalOp, other: Condition) -> Condition {
        let mut conditions = self.into_operands(op);
        conditions.extend(other.into_operands(op));
        Condition::Logical { op, conditions }
    }

    fn into_operands(self, op: LogicalOp) -> Vec<Condition> {
        match self {
            Condition::Logical {
                op: inner,
                conditions,
            } if inner == op => conditions,
            other => vec![other],
        }
    }

    /// The column this node is bound to, if any.
    pub fn column(&self) -> Option<&str> {
        match self {
            Condition::Comparison { column, .. }
            | Condition::Pattern { column, .. }
            | Condition::Membership { column, .. }
            | Condition::NullCheck { column, .. } => Some(column),
            _ => None,
        }
    }

    /// Look up a string-valued helper parameter.
    pub fn helper_param(&self, key: &str) -> Option<&str> {
        match self {
            Condition::Helper { params, .. } => params
                .iter()
                .find(|(name, _)| name == key)
                .and_then(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    /// Render the condition as SQL.
    pub fn to_sql(&self) -> String {
        match self {
            Condition::Comparison { column, op, value } => {
                format!("{} {} {}", quote_column(column), op.as_sql(), escape_value(value))
            }
            Condition::Pattern {
                column,
                op,
                pattern,
            } => {
                let keyword = match op {
                    PatternOp::Like => "LIKE",
                    PatternOp::ILike => "ILIKE",
                };
                format!("{} {} {}", quote_column(column), keyword, escape_string(pattern))
            }
            Condition::Membership { column, op, value } => {
                render_membership(column, *op, value)
            }
            Condition::NullCheck { column, op } => match op {
                NullCheckOp::IsNull => format!("{} IS NULL", quote_column(column)),
                NullCheckOp::IsNotNull => format!("{} IS NOT NULL", quote_column(column)),
            },
            Condition::Logical { op, conditions } => {
                if conditions.is_empty() {
                    // Identity element of the operator.
                    return match op {
                        LogicalOp::And => "TRUE".to_string(),
                        LogicalOp::Or => "FALSE".to_string(),
                    };
                }
                let separator = format!(" {} ", op.as_sql());
                let parts: Vec<String> = conditions.iter().map(Condition::to_sql).collect();
                format!("({})", parts.join(&separator))
            }
            Condition::Helper { name, params } => self
                .render_known_helper(name)
                .unwrap_or_else(|| render_generic_helper(name, params)),
            Condition::FunctionCall { name, args } => {
                let args: Vec<String> = args
                    .iter()
                    .map(|arg| match arg {
                        FunctionArg::Column(column) => quote_column(column),
                        FunctionArg::Condition(condition) => condition.to_sql(),
                    })
                    .collect();
                format!("{}({})", escape_reference(name), args.join(", "))
            }
            Condition::Context(expr) => expr.to_sql(),
        }
    }

    fn render_known_helper(&self, name: &str) -> Option<String> {
        match name {
            HELPER_ALWAYS_TRUE => Some("TRUE".to_string()),
            HELPER_HAS_ROLE => {
                let role = self.helper_param("role")?;
                let table = self.helper_param("table")?;
                Some(format!(
                    "EXISTS (SELECT 1 FROM {} WHERE user_id = auth.uid() AND role = {})",
                    escape_reference(table),
                    escape_string(role)
                ))
            }
            HELPER_IS_MEMBER_OF => {
                let join_table = self.helper_param("join_table")?;
                let foreign_key = self.helper_param("foreign_key")?;
                let local_key = self.helper_param("local_key")?;
                Some(format!(
                    "{} IN (SELECT {} FROM {} WHERE {} = auth.uid())",
                    quote_column(local_key),
                    escape_reference(foreign_key),
                    escape_reference(join_table),
                    quote_column(DEFAULT_USER_COLUMN)
                ))
            }
            _ => None,
        }
    }
}

fn render_membership(column: &str, op: MembershipOp, value: &MembershipValue) -> String {
    let column = quote_column(column);
    match (op, value) {
        // `IN ()` is not valid SQL; an empty list matches nothing.
        (MembershipOp::In, MembershipValue::List(values)) if values.is_empty() => {
            "FALSE".to_string()
        }
        (MembershipOp::In, MembershipValue::List(values)) => {
            let values: Vec<String> = values.iter().map(escape_value).collect();
            format!("{} IN ({})", column, values.join(", "))
        }
        (MembershipOp::In, MembershipValue::Subquery(subquery)) => {
            format!("{} IN {}", column, subquery.to_sql())
        }
        // An empty ARRAY[] has no type; the untyped literal takes the column's.
        (MembershipOp::Contains, MembershipValue::List(values)) if values.is_empty() => {
            format!("{} @> '{{}}'", column)
        }
        (MembershipOp::Contains, MembershipValue::List(values)) => {
            format!("{} @> {}", column, escape_value(&Value::Array(values.clone())))
        }
        (MembershipOp::Contains, MembershipValue::Subquery(subquery)) => {
            format!("{} @> ARRAY{}", column, subquery.to_sql())
        }
    }
}

fn render_generic_helper(name: &str, params: &[(String, Value)]) -> String {
    let args: Vec<String> = params.iter().map(|(_, v)| escape_value(v)).collect();
    format!("{}({})", escape_reference(name), args.join(", "))
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}
