//! Table-reference analysis over condition trees.
//!
//! Qualifiers are inferred from column reference strings. This is a
//! best-effort heuristic: a reference such as `schema.table.col` yields
//! `schema`, and a string parameter of a helper that happens to contain a dot
//! is read as a qualified column. The logic is kept in this module so it can
//! be replaced by typed references without touching the builders.

use crate::condition::{Condition, FunctionArg, MembershipValue};
use crate::escape::{split_reference, unquote_segment};
use crate::subquery::JoinClause;
use crate::value::Value;

/// Extract the table qualifier from a column reference.
///
/// Returns the part before the first unquoted `.`, or the content of a
/// leading quoted segment followed by `.`. Unqualified references yield
/// `None`.
pub fn extract_table_from_column(reference: &str) -> Option<String> {
    let segments = split_reference(reference);
    if segments.len() < 2 {
        return None;
    }
    let qualifier = unquote_segment(segments[0]);
    if qualifier.is_empty() {
        None
    } else {
        Some(qualifier)
    }
}

/// Split a column reference into its optional qualifier and bare column name.
pub(crate) fn split_column(reference: &str) -> (Option<String>, String) {
    let segments = split_reference(reference);
    let name = segments
        .last()
        .map(|s| unquote_segment(s))
        .unwrap_or_default();
    (extract_table_from_column(reference), name)
}

/// Collect every table qualifier referenced by a condition, in first-seen
/// order without duplicates.
///
/// Subqueries used as membership values form their own scope and are not
/// descended into.
pub fn extract_table_references(condition: &Condition) -> Vec<String> {
    let mut tables = Vec::new();
    collect_references(condition, &mut tables);
    tables
}

fn push_unique(tables: &mut Vec<String>, table: String) {
    if !tables.contains(&table) {
        tables.push(table);
    }
}

fn collect_column(reference: &str, tables: &mut Vec<String>) {
    if let Some(table) = extract_table_from_column(reference) {
        push_unique(tables, table);
    }
}

fn collect_value(value: &Value, tables: &mut Vec<String>) {
    match value {
        Value::Condition(nested) => collect_references(nested, tables),
        Value::Array(items) => {
            for item in items {
                collect_value(item, tables);
            }
        }
        _ => {}
    }
}

fn collect_references(condition: &Condition, tables: &mut Vec<String>) {
    match condition {
        Condition::Comparison { column, value, .. } => {
            collect_column(column, tables);
            collect_value(value, tables);
        }
        Condition::Pattern { column, .. } | Condition::NullCheck { column, .. } => {
            collect_column(column, tables);
        }
        Condition::Membership { column, value, .. } => {
            collect_column(column, tables);
            if let MembershipValue::List(values) = value {
                for v in values {
                    collect_value(v, tables);
                }
            }
        }
        Condition::Logical { conditions, .. } => {
            for child in conditions {
                collect_references(child, tables);
            }
        }
        Condition::Helper { params, .. } => {
            for (_, value) in params {
                match value {
                    Value::String(s) => collect_column(s, tables),
                    other => collect_value(other, tables),
                }
            }
        }
        Condition::FunctionCall { args, .. } => {
            for arg in args {
                match arg {
                    FunctionArg::Column(column) => collect_column(column, tables),
                    FunctionArg::Condition(nested) => collect_references(nested, tables),
                }
            }
        }
        Condition::Context(_) => {}
    }
}

/// Tables visible in a subquery scope: the from-table (or its alias) and the
/// joined table (or its alias).
pub fn available_tables(
    from_table: &str,
    from_alias: Option<&str>,
    join: Option<&JoinClause>,
) -> Vec<String> {
    let mut tables = vec![from_alias.unwrap_or(from_table).to_string()];
    if let Some(join) = join {
        push_unique(&mut tables, join.scope_name().to_string());
    }
    tables
}

/// Tables referenced by `condition` that are not in `available`, in
/// first-seen order.
pub fn detect_missing_joins(condition: &Condition, available: &[String]) -> Vec<String> {
    extract_table_references(condition)
        .into_iter()
        .filter(|table| !available.contains(table))
        .collect()
}
