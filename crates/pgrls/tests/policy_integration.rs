//! Integration tests for policy compilation.

use pgrls::{
    always_true, call, column, create_policy_group, current_auth_id, escape_identifier,
    escape_value, from, from_aliased, has_role, policy, policy_group_to_sql, raw, templates,
    Condition, ErrorKind, JoinClause, ManifestError, Operation, PolicyError, PolicyManifest,
    RenderOptions, Value,
};
use pretty_assertions::assert_eq;

fn render(sql: pgrls::PolicyResult<String>) -> String {
    sql.unwrap()
}

#[test]
fn test_identifier_escaping() {
    for safe in ["user_id", "Posts2", "_x"] {
        assert_eq!(escape_identifier(safe), safe);
        assert_eq!(escape_identifier(&escape_identifier(safe)), safe);
    }
    assert_eq!(escape_identifier("team members"), "\"team members\"");
    assert_eq!(escape_identifier("a\"b"), "\"a\"\"b\"");
    assert_eq!(escape_identifier(""), "\"\"");
}

#[test]
fn test_array_value_escaping() {
    let value = Value::Array(vec!["a'b".into(), 1.into(), Value::Null]);
    assert_eq!(escape_value(&value), "ARRAY['a''b', 1, NULL]");
}

#[test]
fn test_three_way_and_is_flat() {
    let combined = column("a")
        .eq(1)
        .and(column("b").eq(2))
        .and(column("c").eq(3));
    match &combined {
        Condition::Logical { conditions, .. } => assert_eq!(conditions.len(), 3),
        other => panic!("expected logical node, got {other:?}"),
    }
}

#[test]
fn test_where_with_undeclared_table_fails() {
    let err = from("t").filter(column("m.col").eq(1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Scope);
    assert_eq!(err.missing_tables(), ["m".to_string()]);
}

#[test]
fn test_second_join_fails() {
    let builder = from_aliased("teams", "t")
        .join(JoinClause::inner("a", column("a.t_id").eq(raw("t.id"))))
        .unwrap();
    let err = builder
        .join(JoinClause::inner("b", column("b.t_id").eq(raw("t.id"))))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);
}

#[test]
fn test_insert_allow_renders_only_with_check() {
    let sql = render(
        policy("items_insert")
            .on("items")
            .for_operation(Operation::Insert)
            .allow(column("owner_id").is_owner())
            .to_sql(&RenderOptions::default()),
    );
    assert_eq!(
        sql,
        "CREATE POLICY \"items_insert\" ON \"items\" FOR INSERT WITH CHECK (\"owner_id\" = auth.uid())"
    );
}

#[test]
fn test_update_with_independent_clauses() {
    let sql = render(
        policy("items_update")
            .on("items")
            .for_operation(Operation::Update)
            .when(column("owner_id").is_owner())
            .with_check(column("locked").eq(false))
            .to_sql(&RenderOptions::default()),
    );
    assert_eq!(
        sql,
        "CREATE POLICY \"items_update\" ON \"items\" FOR UPDATE \
         USING (\"owner_id\" = auth.uid()) WITH CHECK (\"locked\" = FALSE)"
    );
}

#[test]
fn test_index_suggestions_deduplicate_in_order() {
    let sql = render(
        policy("items_read")
            .on("items")
            .for_operation(Operation::Select)
            .when(
                column("a")
                    .eq(1)
                    .and(column("b").eq(current_auth_id()))
                    .and(column("a").eq(2)),
            )
            .to_sql(&RenderOptions::default().with_indexes()),
    );
    assert_eq!(
        sql,
        "CREATE INDEX IF NOT EXISTS idx_items_a ON \"items\" (\"a\");\n\
         CREATE INDEX IF NOT EXISTS idx_items_b ON \"items\" (\"b\");\n\
         \n\
         CREATE POLICY \"items_read\" ON \"items\" FOR SELECT \
         USING ((\"a\" = 1 AND \"b\" = auth.uid() AND \"a\" = 2))"
    );
}

#[test]
fn test_policy_without_predicate_fails() {
    let err = policy("empty")
        .on("items")
        .for_operation(Operation::Delete)
        .to_sql(&RenderOptions::default())
        .unwrap_err();
    assert!(matches!(err, PolicyError::MissingPredicate { .. }));
}

#[test]
fn test_team_membership_policy() {
    let teams = from_aliased("teams", "t")
        .select("t.id")
        .join(
            JoinClause::inner("team_members", column("m.team_id").eq(raw("t.id"))).with_alias("m"),
        )
        .unwrap()
        .filter(column("m.user_id").eq(current_auth_id()))
        .unwrap()
        .to_subquery();

    let sql = render(
        policy("projects_team")
            .on("projects")
            .for_operation(Operation::Select)
            .to("authenticated")
            .allow(
                column("team_id")
                    .is_in(teams)
                    .or(has_role("admin"))
                    .or(column("archived_at").is_null()),
            )
            .restrictive()
            .to_sql(&RenderOptions::default()),
    );
    assert_eq!(
        sql,
        "CREATE POLICY \"projects_team\" ON \"projects\" AS RESTRICTIVE FOR SELECT TO authenticated \
         USING ((\"team_id\" IN (SELECT t.id FROM teams t INNER JOIN team_members m \
         ON \"m\".\"team_id\" = t.id WHERE \"m\".\"user_id\" = auth.uid()) \
         OR EXISTS (SELECT 1 FROM user_roles WHERE user_id = auth.uid() AND role = 'admin') \
         OR \"archived_at\" IS NULL))"
    );
}

#[test]
fn test_injection_attempts_stay_literal() {
    let sql = render(
        policy("p")
            .on("docs")
            .for_operation(Operation::Select)
            .when(column("title").eq("x'; DROP TABLE docs; --"))
            .to_sql(&RenderOptions::default()),
    );
    assert!(sql.ends_with("USING (\"title\" = 'x''; DROP TABLE docs; --')"));

    let condition = column("\"x\" OR 1=1 --\"").eq(1);
    assert!(!condition.to_sql().starts_with("\"x\" OR"));
}

#[test]
fn test_group_of_templates() {
    let group = create_policy_group(
        "notes",
        vec![
            templates::user_owned("notes", templates::DEFAULT_OWNER_COLUMN, Operation::All)
                .build()
                .unwrap(),
            templates::public_access("notes", templates::DEFAULT_PUBLIC_COLUMN)
                .build()
                .unwrap(),
        ],
        Some("Notes access".to_string()),
    );
    let sql = policy_group_to_sql(&group, &RenderOptions::default()).unwrap();
    assert_eq!(
        sql,
        "-- Notes access\n\
         CREATE POLICY \"notes_owner_access\" ON \"notes\" FOR ALL \
         USING (\"user_id\" = auth.uid()) WITH CHECK (\"user_id\" = auth.uid());\n\n\
         CREATE POLICY \"notes_public_read\" ON \"notes\" FOR SELECT USING (\"is_public\" = TRUE)"
    );
}

#[test]
fn test_function_call_and_always_true() {
    let sql = render(
        policy("audit")
            .on("events")
            .for_operation(Operation::Select)
            .when(call("app.can_view", ["org_id"]).and(always_true()))
            .to_sql(&RenderOptions::default()),
    );
    assert!(sql.ends_with("USING ((app.can_view(\"org_id\") AND TRUE))"));
}

#[test]
fn test_manifest_end_to_end() {
    let manifest = PolicyManifest::from_json(
        r#"{
            "groups": [
                {
                    "name": "documents",
                    "description": "Document access",
                    "policies": [
                        { "table": "documents", "template": { "kind": "user_owned" } },
                        {
                            "name": "documents_team_read",
                            "table": "documents",
                            "operation": "SELECT",
                            "role": "authenticated",
                            "allow": { "kind": "is_member_of",
                                       "join_table": "team_members", "foreign_key": "team_id",
                                       "local_key": "team_id" },
                            "description": "Team members can read"
                        }
                    ]
                }
            ]
        }"#,
    )
    .unwrap();

    let options = RenderOptions::default().with_indexes().with_comment();
    let sql = manifest.render(&options, true).unwrap();
    assert_eq!(
        sql,
        "ALTER TABLE \"documents\" ENABLE ROW LEVEL SECURITY;\n\n\
         -- Document access\n\
         CREATE INDEX IF NOT EXISTS idx_documents_user_id ON \"documents\" (\"user_id\");\n\
         \n\
         CREATE POLICY \"documents_owner_access\" ON \"documents\" FOR ALL \
         USING (\"user_id\" = auth.uid()) WITH CHECK (\"user_id\" = auth.uid());\n\n\
         CREATE INDEX IF NOT EXISTS idx_documents_team_id ON \"documents\" (\"team_id\");\n\
         \n\
         CREATE POLICY \"documents_team_read\" ON \"documents\" FOR SELECT TO authenticated \
         USING (\"team_id\" IN (SELECT team_id FROM team_members WHERE \"user_id\" = auth.uid()));\n\
         COMMENT ON POLICY \"documents_team_read\" ON \"documents\" IS 'Team members can read'"
    );
}

#[test]
fn test_manifest_rejects_bad_json() {
    let err = PolicyManifest::from_json("{ \"groups\": [ { \"name\": 1 } ] }").unwrap_err();
    assert!(matches!(err, ManifestError::Json(_)));
}
