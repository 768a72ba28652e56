//! Re-running any endpoint on identical input must yield identical JSON.

use serde_json::json;

use super::common::{post_json_raw, test_router};

const PROCEDURE_SQL: &str = "
    CREATE PROCEDURE dbo.usp_Deterministic AS
    BEGIN
        BEGIN TRAN;
        SELECT id FROM dbo.Users;
        UPDATE dbo.Users SET name = 'x' WHERE id = 1;
        COMMIT TRAN;
    END
";

#[tokio::test]
async fn test_analyze_is_deterministic() {
    let router = test_router();
    let payload = json!({ "sql": PROCEDURE_SQL, "dialect": "tsql" });

    let (first_status, first) = post_json_raw(&router, "/mcp/analyze", &payload).await;
    let (second_status, second) = post_json_raw(&router, "/mcp/analyze", &payload).await;

    assert_eq!(first_status, 200);
    assert_eq!(second_status, 200);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_mapping_strategy_is_deterministic() {
    let router = test_router();
    let payload = json!({
        "name": "dbo.usp_Deterministic",
        "type": "procedure",
        "sql": PROCEDURE_SQL
    });

    let (_, first) = post_json_raw(&router, "/mcp/migration/mapping-strategy", &payload).await;
    let (_, second) = post_json_raw(&router, "/mcp/migration/mapping-strategy", &payload).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_performance_risk_is_deterministic() {
    let router = test_router();
    let payload = json!({
        "name": "dbo.usp_Deterministic",
        "type": "procedure",
        "sql": PROCEDURE_SQL
    });

    let (_, first) = post_json_raw(&router, "/mcp/quality/performance-risk", &payload).await;
    let (_, second) = post_json_raw(&router, "/mcp/quality/performance-risk", &payload).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_standardize_spec_is_deterministic() {
    let router = test_router();
    let payload = json!({
        "object": { "name": "dbo.usp_Deterministic", "type": "procedure" },
        "sql": PROCEDURE_SQL
    });

    let (_, first) = post_json_raw(&router, "/mcp/standardize/spec", &payload).await;
    let (_, second) = post_json_raw(&router, "/mcp/standardize/spec", &payload).await;
    assert_eq!(first, second);
}
