//! Named collections of policies rendered together.

use crate::error::PolicyResult;
use crate::policy::{PolicyDefinition, RenderOptions};

/// Separator between rendered statements.
pub const STATEMENT_SEPARATOR: &str = ";\n\n";

/// An ordered set of policies under a shared label.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyGroup {
    /// Group name.
    pub name: String,
    /// Member policies, rendered in order.
    pub policies: Vec<PolicyDefinition>,
    /// Rendered as a leading comment when present.
    pub description: Option<String>,
}

impl PolicyGroup {
    /// Tables the member policies protect, in first-seen order.
    pub fn tables(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = Vec::new();
        for policy in &self.policies {
            if !tables.contains(&policy.table.as_str()) {
                tables.push(&policy.table);
            }
        }
        tables
    }
}

/// Create a group.
pub fn create_policy_group(
    name: impl Into<String>,
    policies: Vec<PolicyDefinition>,
    description: Option<String>,
) -> PolicyGroup {
    PolicyGroup {
        name: name.into(),
        policies,
        description,
    }
}

/// Render every member with `options` and join them with `;\n\n`.
///
/// The first failing member aborts rendering.
pub fn policy_group_to_sql(group: &PolicyGroup, options: &RenderOptions) -> PolicyResult<String> {
    let rendered = group
        .policies
        .iter()
        .map(|policy| policy.to_sql(options))
        .collect::<PolicyResult<Vec<_>>>()?;

    let mut sql = String::new();
    if let Some(description) = &group.description {
        // `--` comments end at any line break, including a bare `\r`.
        let line = description
            .split(char::is_control)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        sql.push_str(&format!("-- {}\n", line));
    }
    sql.push_str(&rendered.join(STATEMENT_SEPARATOR));

    tracing::debug!(group = %group.name, policies = group.policies.len(), "rendered policy group");
    Ok(sql)
}
