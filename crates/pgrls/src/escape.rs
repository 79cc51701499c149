//! SQL-safe rendering of identifiers and literal values.
//!
//! Every value supplied by a caller becomes SQL text through
//! [`escape_value`]; identifiers go through [`escape_identifier`],
//! [`escape_reference`] or [`quote_column`]. None of these functions fail.

use chrono::SecondsFormat;

use crate::value::Value;

/// Escape an identifier.
///
/// Names made only of ASCII letters, digits and underscores are returned
/// unchanged. Anything else is wrapped in double quotes with embedded quotes
/// doubled.
pub fn escape_identifier(name: &str) -> String {
    if is_plain_identifier(name) {
        name.to_string()
    } else {
        quote_identifier(name)
    }
}

/// Wrap an identifier in double quotes unconditionally.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Escape a string as a single-quoted literal.
pub fn escape_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn is_plain_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Split a possibly qualified reference on dots that are not inside quotes.
///
/// Quoted segments are returned with their quotes intact.
pub fn split_reference(reference: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;

    for (i, ch) in reference.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '.' if !in_quotes => {
                segments.push(&reference[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&reference[start..]);
    segments
}

/// Check whether a segment is a complete quoted identifier: wrapped in double
/// quotes, with every inner quote doubled.
fn is_quoted_segment(segment: &str) -> bool {
    segment.len() >= 2
        && segment.starts_with('"')
        && segment.ends_with('"')
        && !segment[1..segment.len() - 1]
            .replace("\"\"", "")
            .contains('"')
}

/// Strip the quotes from a quoted segment, undoubling embedded quotes.
pub(crate) fn unquote_segment(segment: &str) -> String {
    if is_quoted_segment(segment) {
        segment[1..segment.len() - 1].replace("\"\"", "\"")
    } else {
        segment.to_string()
    }
}

/// Escape a possibly qualified reference segment by segment.
///
/// `*` and already-quoted segments are kept as they are.
pub fn escape_reference(reference: &str) -> String {
    render_segments(reference, escape_identifier)
}

/// Render a column reference with every segment double-quoted.
///
/// `user_id` becomes `"user_id"` and `m.team_id` becomes `"m"."team_id"`.
pub fn quote_column(reference: &str) -> String {
    render_segments(reference, quote_identifier)
}

fn render_segments(reference: &str, quote: fn(&str) -> String) -> String {
    split_reference(reference)
        .into_iter()
        .map(|segment| {
            if segment == "*" || is_quoted_segment(segment) {
                segment.to_string()
            } else {
                quote(segment)
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Render a value as a SQL literal.
pub fn escape_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => {
            if f.is_finite() {
                f.to_string()
            } else if f.is_nan() {
                escape_string("NaN")
            } else if f.is_sign_positive() {
                escape_string("Infinity")
            } else {
                escape_string("-Infinity")
            }
        }
        Value::String(s) => escape_string(s),
        Value::Timestamp(ts) => format!(
            "{}::TIMESTAMP",
            escape_string(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
        ),
        Value::Array(items) => format!(
            "ARRAY[{}]",
            items.iter().map(escape_value).collect::<Vec<_>>().join(", ")
        ),
        Value::Raw(sql) => sql.clone(),
        Value::Condition(condition) => condition.to_sql(),
    }
}
