//! JSON policy manifests.
//!
//! A manifest describes groups of policies as data. Loading it lowers every
//! entry onto the public builders ([`column`], [`from`], [`policy`], the
//! templates), so a manifest can express nothing the builders would reject.
//!
//! ```rust
//! use pgrls::{PolicyManifest, RenderOptions};
//!
//! let manifest = PolicyManifest::from_json(r#"{
//!     "groups": [{
//!         "name": "notes",
//!         "policies": [
//!             { "table": "notes", "template": { "kind": "user_owned", "operation": "SELECT" } }
//!         ]
//!     }]
//! }"#).unwrap();
//!
//! let sql = manifest.render(&RenderOptions::default(), false).unwrap();
//! assert_eq!(
//!     sql,
//!     r#"CREATE POLICY "notes_owner_access" ON "notes" FOR SELECT USING ("user_id" = auth.uid())"#
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::column::{column, DEFAULT_LOCAL_KEY};
use crate::condition::{Condition, FunctionArg, MembershipValue};
use crate::context::{current_auth_id, current_database_user, session_variable, SessionVarType};
use crate::ddl::enable_rls_sql;
use crate::error::{ManifestError, ManifestResult};
use crate::group::{create_policy_group, policy_group_to_sql, PolicyGroup, STATEMENT_SEPARATOR};
use crate::helpers::{always_true, call, has_role_in, DEFAULT_ROLE_TABLE};
use crate::policy::{policy, Operation, PolicyBuilder, PolicyDefinition, RenderOptions};
use crate::subquery::{from, from_aliased, JoinClause, JoinKind, SubqueryDefinition};
use crate::templates::{
    self, DEFAULT_OWNER_COLUMN, DEFAULT_PUBLIC_COLUMN, DEFAULT_TENANT_COLUMN,
    DEFAULT_TENANT_SETTING,
};
use crate::value::Value;

fn default_owner_column() -> String {
    DEFAULT_OWNER_COLUMN.to_string()
}

fn default_tenant_column() -> String {
    DEFAULT_TENANT_COLUMN.to_string()
}

fn default_tenant_setting() -> String {
    DEFAULT_TENANT_SETTING.to_string()
}

fn default_public_column() -> String {
    DEFAULT_PUBLIC_COLUMN.to_string()
}

fn default_local_key() -> String {
    DEFAULT_LOCAL_KEY.to_string()
}

fn default_role_table() -> String {
    DEFAULT_ROLE_TABLE.to_string()
}

fn default_operation() -> Operation {
    Operation::All
}

/// A manifest document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyManifest {
    /// Groups, rendered in order.
    pub groups: Vec<GroupSpec>,
}

/// A group of policies.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupSpec {
    /// Group name.
    pub name: String,
    /// Rendered as a leading comment.
    #[serde(default)]
    pub description: Option<String>,
    /// Member policies.
    #[serde(default)]
    pub policies: Vec<PolicySpec>,
}

/// One policy: either a template or an explicit definition.
///
/// With a template, `name`, `role`, `restrictive` and `description` act as
/// overrides. Without one, `name` and `operation` are required; `using` and
/// `with_check` take precedence over what `allow` sets.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicySpec {
    /// Protected table.
    pub table: String,
    #[serde(default)]
    pub template: Option<TemplateSpec>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub operation: Option<Operation>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub using: Option<ConditionSpec>,
    #[serde(default)]
    pub with_check: Option<ConditionSpec>,
    #[serde(default)]
    pub allow: Option<ConditionSpec>,
    #[serde(default)]
    pub restrictive: bool,
    #[serde(default)]
    pub description: Option<String>,
}

/// A prebuilt policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TemplateSpec {
    UserOwned {
        #[serde(default = "default_owner_column")]
        column: String,
        #[serde(default = "default_operation")]
        operation: Operation,
    },
    TenantIsolation {
        #[serde(default = "default_tenant_column")]
        column: String,
        #[serde(default = "default_tenant_setting")]
        session_key: String,
    },
    PublicAccess {
        #[serde(default = "default_public_column")]
        column: String,
    },
    RoleAccess {
        role: String,
        #[serde(default = "default_operation")]
        operation: Operation,
    },
}

impl TemplateSpec {
    fn builder(&self, table: &str) -> PolicyBuilder {
        match self {
            TemplateSpec::UserOwned { column, operation } => {
                templates::user_owned(table, column, *operation)
            }
            TemplateSpec::TenantIsolation {
                column,
                session_key,
            } => templates::tenant_isolation(table, column, session_key),
            TemplateSpec::PublicAccess { column } => templates::public_access(table, column),
            TemplateSpec::RoleAccess { role, operation } => {
                templates::role_access(table, role, *operation)
            }
        }
    }
}

/// Context expressions usable as values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSpec {
    AuthUid,
    CurrentUser,
}

/// A literal or context value.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ValueSpec {
    Null,
    Bool(bool),
    Int(i64),
    Unsigned(u64),
    Float(f64),
    Text(String),
    Array(Vec<ValueSpec>),
    Timestamp {
        timestamp: DateTime<Utc>,
    },
    Context {
        context: ContextSpec,
    },
    Session {
        session: String,
        #[serde(rename = "type", default)]
        cast: SessionVarType,
    },
    Raw {
        raw: String,
    },
}

impl ValueSpec {
    fn lower(&self) -> ManifestResult<Value> {
        let value = match self {
            ValueSpec::Null => Value::Null,
            ValueSpec::Bool(b) => Value::Bool(*b),
            ValueSpec::Int(i) => Value::Int(*i),
            ValueSpec::Unsigned(n) => {
                return Err(ManifestError::Invalid(format!(
                    "integer {n} does not fit in a signed 64-bit value"
                )))
            }
            ValueSpec::Float(f) => Value::Float(*f),
            ValueSpec::Text(s) => Value::String(s.clone()),
            ValueSpec::Array(items) => Value::Array(
                items
                    .iter()
                    .map(ValueSpec::lower)
                    .collect::<ManifestResult<_>>()?,
            ),
            ValueSpec::Timestamp { timestamp } => Value::Timestamp(*timestamp),
            ValueSpec::Context { context } => match context {
                ContextSpec::AuthUid => current_auth_id().into(),
                ContextSpec::CurrentUser => current_database_user().into(),
            },
            ValueSpec::Session { session, cast } => session_variable(session.as_str(), *cast).into(),
            ValueSpec::Raw { raw } => Value::Raw(raw.clone()),
        };
        Ok(value)
    }
}

/// A function argument: a column reference or a nested condition.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ArgSpec {
    Column(String),
    Condition(Box<ConditionSpec>),
}

/// A subquery used as a membership source.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubquerySpec {
    pub from: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub select: Vec<String>,
    #[serde(default)]
    pub join: Option<JoinSpec>,
    #[serde(default, rename = "where")]
    pub filter: Option<Box<ConditionSpec>>,
}

impl SubquerySpec {
    fn lower(&self) -> ManifestResult<SubqueryDefinition> {
        let mut builder = match &self.alias {
            Some(alias) => from_aliased(self.from.as_str(), alias.as_str()),
            None => from(self.from.as_str()),
        };
        if !self.select.is_empty() {
            builder = builder.select_columns(self.select.iter().cloned());
        }
        if let Some(join) = &self.join {
            let mut clause = JoinClause::new(join.kind, join.table.as_str(), join.on.lower()?);
            if let Some(alias) = &join.alias {
                clause = clause.with_alias(alias.as_str());
            }
            builder = builder.join(clause)?;
        }
        if let Some(filter) = &self.filter {
            builder = builder.filter(filter.lower()?)?;
        }
        Ok(builder.to_subquery())
    }
}

/// The join of a [`SubquerySpec`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinSpec {
    #[serde(default)]
    pub kind: JoinKind,
    pub table: String,
    #[serde(default)]
    pub alias: Option<String>,
    pub on: Box<ConditionSpec>,
}

/// A condition, tagged by `kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionSpec {
    Eq {
        column: String,
        value: ValueSpec,
    },
    Neq {
        column: String,
        value: ValueSpec,
    },
    Gt {
        column: String,
        value: ValueSpec,
    },
    Gte {
        column: String,
        value: ValueSpec,
    },
    Lt {
        column: String,
        value: ValueSpec,
    },
    Lte {
        column: String,
        value: ValueSpec,
    },
    Like {
        column: String,
        pattern: String,
    },
    Ilike {
        column: String,
        pattern: String,
    },
    In {
        column: String,
        #[serde(default)]
        values: Option<Vec<ValueSpec>>,
        #[serde(default)]
        subquery: Option<SubquerySpec>,
    },
    Contains {
        column: String,
        #[serde(default)]
        values: Option<Vec<ValueSpec>>,
        #[serde(default)]
        subquery: Option<SubquerySpec>,
    },
    IsNull {
        column: String,
    },
    IsNotNull {
        column: String,
    },
    IsOwner {
        #[serde(default = "default_owner_column")]
        column: String,
    },
    IsPublic {
        #[serde(default = "default_public_column")]
        column: String,
    },
    BelongsToTenant {
        #[serde(default = "default_tenant_column")]
        column: String,
        #[serde(default = "default_tenant_setting")]
        key: String,
    },
    IsMemberOf {
        join_table: String,
        foreign_key: String,
        #[serde(default = "default_local_key")]
        local_key: String,
    },
    UserBelongsTo {
        column: String,
        table: String,
        #[serde(default)]
        select: Option<String>,
    },
    ReleasedBefore {
        column: String,
        #[serde(default)]
        date: Option<DateTime<Utc>>,
    },
    HasRole {
        role: String,
        #[serde(default = "default_role_table")]
        table: String,
    },
    AlwaysTrue,
    Call {
        function: String,
        #[serde(default)]
        args: Vec<ArgSpec>,
    },
    And {
        conditions: Vec<ConditionSpec>,
    },
    Or {
        conditions: Vec<ConditionSpec>,
    },
}

fn membership_source(
    name: &str,
    values: &Option<Vec<ValueSpec>>,
    subquery: &Option<SubquerySpec>,
) -> ManifestResult<MembershipValue> {
    match (values, subquery) {
        (Some(values), None) => Ok(MembershipValue::List(
            values
                .iter()
                .map(ValueSpec::lower)
                .collect::<ManifestResult<_>>()?,
        )),
        (None, Some(subquery)) => Ok(subquery.lower()?.into()),
        _ => Err(ManifestError::Invalid(format!(
            "membership on '{name}' needs exactly one of `values` or `subquery`"
        ))),
    }
}

impl ConditionSpec {
    /// Build the condition through the public builders.
    pub fn lower(&self) -> ManifestResult<Condition> {
        let condition = match self {
            ConditionSpec::Eq { column: name, value } => column(name).eq(value.lower()?),
            ConditionSpec::Neq { column: name, value } => column(name).neq(value.lower()?),
            ConditionSpec::Gt { column: name, value } => column(name).gt(value.lower()?),
            ConditionSpec::Gte { column: name, value } => column(name).gte(value.lower()?),
            ConditionSpec::Lt { column: name, value } => column(name).lt(value.lower()?),
            ConditionSpec::Lte { column: name, value } => column(name).lte(value.lower()?),
            ConditionSpec::Like { column: name, pattern } => column(name).like(pattern),
            ConditionSpec::Ilike { column: name, pattern } => column(name).ilike(pattern),
            ConditionSpec::In {
                column: name,
                values,
                subquery,
            } => column(name).is_in(membership_source(name, values, subquery)?),
            ConditionSpec::Contains {
                column: name,
                values,
                subquery,
            } => column(name).contains(membership_source(name, values, subquery)?),
            ConditionSpec::IsNull { column: name } => column(name).is_null(),
            ConditionSpec::IsNotNull { column: name } => column(name).is_not_null(),
            ConditionSpec::IsOwner { column: name } => column(name).is_owner(),
            ConditionSpec::IsPublic { column: name } => column(name).is_public(),
            ConditionSpec::BelongsToTenant { column: name, key } => {
                column(name).belongs_to_tenant(key)
            }
            ConditionSpec::IsMemberOf {
                join_table,
                foreign_key,
                local_key,
            } => column(local_key).is_member_of_with_key(join_table, foreign_key, local_key),
            ConditionSpec::UserBelongsTo {
                column: name,
                table,
                select,
            } => match select {
                Some(select) => column(name).user_belongs_to_column(table, select),
                None => column(name).user_belongs_to(table),
            },
            ConditionSpec::ReleasedBefore { column: name, date } => {
                column(name).released_before(*date)
            }
            ConditionSpec::HasRole { role, table } => has_role_in(role, table),
            ConditionSpec::AlwaysTrue => always_true(),
            ConditionSpec::Call { function, args } => {
                let args = args
                    .iter()
                    .map(|arg| -> ManifestResult<FunctionArg> {
                        match arg {
                            ArgSpec::Column(name) => Ok(FunctionArg::from(name.as_str())),
                            ArgSpec::Condition(nested) => Ok(FunctionArg::from(nested.lower()?)),
                        }
                    })
                    .collect::<ManifestResult<Vec<_>>>()?;
                call(function, args)
            }
            ConditionSpec::And { conditions } => {
                Condition::all(lower_all(conditions)?).ok_or_else(|| {
                    ManifestError::Invalid("`and` needs at least one condition".to_string())
                })?
            }
            ConditionSpec::Or { conditions } => {
                Condition::any(lower_all(conditions)?).ok_or_else(|| {
                    ManifestError::Invalid("`or` needs at least one condition".to_string())
                })?
            }
        };
        Ok(condition)
    }
}

fn lower_all(conditions: &[ConditionSpec]) -> ManifestResult<Vec<Condition>> {
    conditions.iter().map(ConditionSpec::lower).collect()
}

impl PolicySpec {
    /// Build the policy through the public builders.
    pub fn lower(&self) -> ManifestResult<PolicyDefinition> {
        let mut builder = match &self.template {
            Some(template) => {
                if self.operation.is_some()
                    || self.using.is_some()
                    || self.with_check.is_some()
                    || self.allow.is_some()
                {
                    return Err(ManifestError::Invalid(format!(
                        "templated policy on '{}' cannot set operation or predicates",
                        self.table
                    )));
                }
                template.builder(&self.table)
            }
            None => self.explicit_builder()?,
        };

        if let Some(role) = &self.role {
            builder = builder.to(role);
        }
        if self.restrictive {
            builder = builder.restrictive();
        }
        if let Some(description) = &self.description {
            builder = builder.description(description);
        }

        let mut definition = builder.build()?;
        if let Some(name) = &self.name {
            definition.name = name.clone();
        }
        Ok(definition)
    }

    fn explicit_builder(&self) -> ManifestResult<PolicyBuilder> {
        let name = self.name.as_deref().ok_or_else(|| {
            ManifestError::Invalid(format!("policy on '{}' needs a name or a template", self.table))
        })?;
        let operation = self.operation.ok_or_else(|| {
            ManifestError::Invalid(format!("policy '{name}' needs an operation"))
        })?;

        let mut builder = policy(name).on(self.table.as_str()).for_operation(operation);
        if let Some(allow) = &self.allow {
            builder = builder.allow(allow.lower()?);
        }
        if let Some(using) = &self.using {
            builder = builder.when(using.lower()?);
        }
        if let Some(check) = &self.with_check {
            builder = builder.with_check(check.lower()?);
        }
        Ok(builder)
    }
}

impl PolicyManifest {
    /// Parse a manifest from JSON.
    pub fn from_json(input: &str) -> ManifestResult<Self> {
        Ok(serde_json::from_str(input)?)
    }

    /// Lower every group.
    ///
    /// Fails on an empty manifest, an empty group, or two policies with the
    /// same name on the same table.
    pub fn to_groups(&self) -> ManifestResult<Vec<PolicyGroup>> {
        if self.groups.is_empty() {
            return Err(ManifestError::Invalid("manifest defines no groups".to_string()));
        }

        let mut seen: Vec<(String, String)> = Vec::new();
        let mut groups = Vec::with_capacity(self.groups.len());
        for group in &self.groups {
            if group.policies.is_empty() {
                return Err(ManifestError::Invalid(format!(
                    "group '{}' has no policies",
                    group.name
                )));
            }

            let policies = group
                .policies
                .iter()
                .map(PolicySpec::lower)
                .collect::<ManifestResult<Vec<_>>>()?;
            for definition in &policies {
                let key = (definition.table.clone(), definition.name.clone());
                if seen.contains(&key) {
                    return Err(ManifestError::Invalid(format!(
                        "policy '{}' is defined twice on '{}'",
                        definition.name, definition.table
                    )));
                }
                seen.push(key);
            }

            tracing::debug!(group = %group.name, policies = policies.len(), "lowered group");
            groups.push(create_policy_group(
                group.name.as_str(),
                policies,
                group.description.clone(),
            ));
        }
        Ok(groups)
    }

    /// Distinct tables across all groups, in first-seen order.
    pub fn tables(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = Vec::new();
        for policy in self.groups.iter().flat_map(|g| &g.policies) {
            if !tables.contains(&policy.table.as_str()) {
                tables.push(&policy.table);
            }
        }
        tables
    }

    /// Render every group, separated by `;\n\n`.
    ///
    /// With `enable_rls`, an `ALTER TABLE ... ENABLE ROW LEVEL SECURITY`
    /// statement for every table comes first.
    pub fn render(&self, options: &RenderOptions, enable_rls: bool) -> ManifestResult<String> {
        let groups = self.to_groups()?;

        let mut statements = Vec::new();
        if enable_rls {
            statements.extend(self.tables().into_iter().map(enable_rls_sql));
        }
        for group in &groups {
            statements.push(policy_group_to_sql(group, options)?);
        }
        Ok(statements.join(STATEMENT_SEPARATOR))
    }
}
