//! Index suggestions derived from policy predicates.
//!
//! A policy predicate is evaluated for every row a query touches. Columns it
//! compares for equality or membership are the ones worth indexing.

use crate::condition::{ComparisonOp, Condition, MembershipOp, HELPER_IS_MEMBER_OF};
use crate::escape::{quote_column, quote_identifier};
use crate::scope::split_column;

/// Collect index candidates from the USING and WITH CHECK predicates.
///
/// Candidates are unqualified columns used in `=` comparisons, `IN`
/// membership (list or subquery) and the local key of membership-table
/// helpers. USING is walked first; the result is de-duplicated in first-seen
/// order.
pub fn suggest_index_columns(using: Option<&Condition>, check: Option<&Condition>) -> Vec<String> {
    let mut columns = Vec::new();
    for condition in [using, check].into_iter().flatten() {
        collect_candidates(condition, &mut columns);
    }
    tracing::debug!(columns = ?columns, "derived index candidates");
    columns
}

fn push_candidate(reference: &str, columns: &mut Vec<String>) {
    let (qualifier, name) = split_column(reference);
    if qualifier.is_some() || name.is_empty() || name == "*" {
        return;
    }
    if !columns.contains(&name) {
        columns.push(name);
    }
}

fn collect_candidates(condition: &Condition, columns: &mut Vec<String>) {
    match condition {
        Condition::Comparison {
            column,
            op: ComparisonOp::Eq,
            ..
        } => push_candidate(column, columns),
        Condition::Membership {
            column,
            op: MembershipOp::In,
            ..
        } => push_candidate(column, columns),
        Condition::Logical { conditions, .. } => {
            for child in conditions {
                collect_candidates(child, columns);
            }
        }
        Condition::Helper { name, .. } if name == HELPER_IS_MEMBER_OF => {
            if let Some(local_key) = condition.helper_param("local_key") {
                push_candidate(local_key, columns);
            }
        }
        _ => {}
    }
}

/// PostgreSQL truncates identifiers longer than this many bytes.
const MAX_IDENTIFIER_LEN: usize = 63;

/// Length of the `_<hash>` disambiguation suffix.
const HASH_SUFFIX_LEN: usize = 9;

/// Index name for `table.column`: `idx_<table>_<column>`.
///
/// Plain names are used as is. When a character outside `[A-Za-z0-9_]` had to
/// be replaced by `_`, or the name exceeds the identifier length limit, the
/// name is shortened if needed and suffixed with a hash of the original table
/// and column, so `Owner Id` and `Owner_Id` get distinct indexes. Plain names
/// that differ only in where the underscore falls (`a_b` + `c` against `a` +
/// `b_c`) still share a name.
pub fn index_name(table: &str, column: &str) -> String {
    let raw = format!("idx_{}_{}", table, column);
    let sanitized: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if sanitized == raw && sanitized.len() <= MAX_IDENTIFIER_LEN {
        return sanitized;
    }

    let mut name = sanitized;
    name.truncate(MAX_IDENTIFIER_LEN - HASH_SUFFIX_LEN);
    format!("{}_{:08x}", name, name_hash(table, column))
}

/// 32-bit FNV-1a over `table`, a NUL separator and `column`.
fn name_hash(table: &str, column: &str) -> u32 {
    const OFFSET: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    table
        .bytes()
        .chain(std::iter::once(0))
        .chain(column.bytes())
        .fold(OFFSET, |hash, byte| (hash ^ u32::from(byte)).wrapping_mul(PRIME))
}

/// One `CREATE INDEX IF NOT EXISTS` statement per column, without
/// terminators.
pub fn index_statements(table: &str, columns: &[String]) -> Vec<String> {
    columns
        .iter()
        .map(|column| {
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                index_name(table, column),
                quote_column(table),
                quote_identifier(column)
            )
        })
        .collect()
}
