//! Endpoint-level behavior checks across the analysis surface.

use serde_json::json;

use super::common::{get, post_json, test_router};

#[tokio::test]
async fn test_health_probe() {
    let router = test_router();
    let (status, body) = get(&router, "/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_analyze_simple_select() {
    let router = test_router();
    let (status, body) = post_json(
        &router,
        "/mcp/analyze",
        &json!({ "sql": "SELECT 1", "dialect": "tsql" }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["version"], "0.6");
    assert_eq!(body["control_flow"]["summary"]["cyclomatic_complexity"], 1);
    assert_eq!(body["data_changes"]["has_writes"], false);
    assert_eq!(body["migration_impacts"]["items"], json!([]));
    assert_eq!(body["errors"], json!([]));
}

#[tokio::test]
async fn test_analyze_rejects_empty_sql() {
    let router = test_router();
    let (status, _) = post_json(&router, "/mcp/analyze", &json!({ "sql": "" })).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_callers_endpoint() {
    let router = test_router();
    let (status, body) = post_json(
        &router,
        "/mcp/callers",
        &json!({
            "target": "dbo.usp_Target",
            "objects": [
                { "name": "dbo.usp_A", "type": "procedure", "sql": "EXEC dbo.usp_Target" },
                { "name": "dbo.usp_B", "type": "procedure", "sql": "SELECT 1" }
            ]
        }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["version"], "2.1.0");
    assert_eq!(body["summary"]["caller_count"], 1);
    assert_eq!(body["callers"][0]["name"], "dbo.usp_A");
}

#[tokio::test]
async fn test_call_graph_three_nodes() {
    let router = test_router();
    let (status, body) = post_json(
        &router,
        "/mcp/common/call-graph",
        &json!({
            "objects": [
                { "name": "dbo.usp_A", "type": "procedure", "sql": "EXEC dbo.usp_B" },
                { "name": "dbo.usp_B", "type": "procedure", "sql": "SELECT dbo.fn_C(1)" },
                { "name": "dbo.fn_C", "type": "function", "sql": "SELECT 1" }
            ]
        }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["version"], "2.4.0");
    assert_eq!(body["summary"]["node_count"], 3);
    assert_eq!(body["summary"]["edge_count"], 2);
    assert_eq!(body["summary"]["has_cycles"], false);
    assert_eq!(body["graph"]["edges"][0]["from"], "dbo.usp_a");
    assert_eq!(body["graph"]["edges"][0]["to"], "dbo.usp_b");
    assert_eq!(body["graph"]["edges"][0]["kind"], "exec");
    assert_eq!(body["graph"]["edges"][0]["count"], 1);
    assert_eq!(body["graph"]["edges"][1]["kind"], "function_call");
}

#[tokio::test]
async fn test_call_graph_ambiguous_target() {
    let router = test_router();
    let (status, body) = post_json(
        &router,
        "/mcp/common/call-graph",
        &json!({
            "objects": [
                { "name": "dbo.usp_A", "type": "procedure", "sql": "EXEC usp_X" },
                { "name": "dbo.usp_X", "type": "procedure", "sql": "SELECT 1" },
                { "name": "audit.usp_X", "type": "procedure", "sql": "SELECT 2" }
            ]
        }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["summary"]["edge_count"], 0);
    let errors = body["errors"].as_array().unwrap();
    let ambiguity = errors
        .iter()
        .find(|e| e["id"] == "AMBIGUOUS_TARGET")
        .expect("ambiguity error");
    assert_eq!(ambiguity["object"], "dbo.usp_A");
    assert!(ambiguity["message"].as_str().unwrap().contains("usp_x"));
}

#[tokio::test]
async fn test_performance_risk_antipatterns() {
    let router = test_router();
    let (status, body) = post_json(
        &router,
        "/mcp/quality/performance-risk",
        &json!({
            "name": "dbo.usp_Bad",
            "type": "procedure",
            "sql": "SELECT * FROM dbo.Customers WITH (NOLOCK) WHERE UPPER(name) LIKE '%x'"
        }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["version"], "4.1.0");
    let ids: Vec<&str> = body["findings"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|f| f["id"].as_str())
        .collect();
    for id in [
        "PRF_SELECT_STAR",
        "PRF_LEADING_WILDCARD_LIKE",
        "PRF_FUNCTION_ON_COLUMN",
        "PRF_NOLOCK",
    ] {
        assert!(ids.contains(&id), "missing {id}");
    }
    let level = body["summary"]["risk_level"].as_str().unwrap();
    assert!(matches!(level, "medium" | "high" | "critical"));
}

#[tokio::test]
async fn test_reusability_lookup_candidate() {
    let router = test_router();
    let (status, body) = post_json(
        &router,
        "/mcp/common/reusability",
        &json!({
            "name": "dbo.usp_GetUsers",
            "type": "procedure",
            "sql": "CREATE PROCEDURE usp AS SELECT * FROM dbo.Users"
        }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["version"], "2.2.0");
    let grade = body["summary"]["grade"].as_str().unwrap();
    assert!(matches!(grade, "A" | "B"));
    assert_eq!(body["summary"]["is_candidate"], true);
    assert_eq!(body["summary"]["candidate_type"], "lookup");
}

#[tokio::test]
async fn test_reusability_heavy_mutator() {
    let router = test_router();
    let sql = "
        CREATE PROCEDURE dbo.usp_Heavy AS
        BEGIN
            BEGIN TRAN;
            DECLARE c CURSOR FOR SELECT id FROM dbo.A;
            EXEC(@dyn);
            INSERT INTO dbo.B (id) VALUES (1);
            COMMIT TRAN;
        END
    ";
    let (status, body) = post_json(
        &router,
        "/mcp/common/reusability",
        &json!({ "name": "dbo.usp_Heavy", "type": "procedure", "sql": sql }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["summary"]["grade"], "D");
    assert_eq!(body["summary"]["is_candidate"], false);
    let reason_ids: Vec<&str> = body["reasons"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["id"].as_str())
        .collect();
    for id in ["RSN_DYN_SQL", "RSN_CURSOR", "RSN_TXN", "RSN_WRITES"] {
        assert!(reason_ids.contains(&id), "missing {id}");
    }
}

#[tokio::test]
async fn test_standardize_spec_requires_sql_xor_inputs() {
    let router = test_router();
    let (status, _) = post_json(
        &router,
        "/mcp/standardize/spec",
        &json!({ "object": { "name": "dbo.usp_X", "type": "procedure" } }),
    )
    .await;
    assert_eq!(status, 400);

    let (status, _) = post_json(
        &router,
        "/mcp/standardize/spec",
        &json!({
            "object": { "name": "dbo.usp_X", "type": "procedure" },
            "sql": "SELECT 1",
            "inputs": {}
        }),
    )
    .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_standardize_spec_with_evidence_retrieval() {
    let docs = tempfile::tempdir().expect("temp docs dir");
    std::fs::write(
        docs.path().join("mybatis_dynamic_sql.md"),
        "# MyBatis Dynamic SQL Standard\n\nPrefer dynamic_sql handling with <if>/<choose>/<foreach> tags to avoid concatenation.\nUse mybatis tags to keep SQL readable.\n",
    )
    .unwrap();
    std::fs::write(
        docs.path().join("transactions.md"),
        "# Transaction Boundaries\n\nDefine @Transactional at the service layer and keep boundaries consistent.\n",
    )
    .unwrap();

    let router = test_router();
    let (status, body) = post_json(
        &router,
        "/mcp/standardize/spec-with-evidence",
        &json!({
            "object": { "name": "dbo.usp_Sample", "type": "procedure" },
            "sql": "CREATE PROCEDURE dbo.usp_Sample AS BEGIN BEGIN TRANSACTION; EXEC(@dyn); COMMIT TRANSACTION; END",
            "options": {
                "docs_dir": docs.path().display().to_string(),
                "top_k": 5,
                "max_snippet_chars": 120
            }
        }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["version"], "5.2.0");
    let documents = body["evidence"]["documents"].as_array().unwrap();
    assert!(!documents.is_empty());
    assert!(documents.len() <= 5);
    for document in documents {
        assert!(document["snippet"].as_str().unwrap().chars().count() <= 120);
    }
    let recommendation_ids: Vec<&str> = body["evidence"]["pattern_recommendations"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["id"].as_str())
        .collect();
    assert!(recommendation_ids.contains(&"PAT_MYBATIS_DYNAMIC_TAGS"));
}

#[tokio::test]
async fn test_standardize_spec_with_evidence_missing_docs_dir() {
    let router = test_router();
    let (status, body) = post_json(
        &router,
        "/mcp/standardize/spec-with-evidence",
        &json!({
            "object": { "name": "dbo.usp_Sample", "type": "procedure" },
            "sql": "CREATE PROCEDURE dbo.usp_Sample AS EXEC('SELECT 1');",
            "options": { "docs_dir": "/nonexistent/atlas/docs" }
        }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["evidence"]["documents"], json!([]));
    let errors: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e.as_str())
        .collect();
    assert!(errors.iter().any(|e| e.starts_with("DOCS_DIR_NOT_FOUND")));
    // Pattern recommendations still derive from tags alone.
    let recommendation_ids: Vec<&str> = body["evidence"]["pattern_recommendations"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["id"].as_str())
        .collect();
    assert!(recommendation_ids.contains(&"PAT_MYBATIS_DYNAMIC_TAGS"));
}
