//! POST /mcp/analyze - the combined primitive analyzer endpoint.

use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::services::analyzer::{
    ControlFlow, DataChanges, ErrorHandling, MigrationImpacts, References, analyze_control_flow,
    analyze_data_changes, analyze_error_handling, analyze_migration_impacts, analyze_references,
    analyze_transactions,
};
use crate::services::analyzer::TransactionSummary;
use crate::utils::ApiResult;

pub const VERSION: &str = "0.6";

fn default_dialect() -> String {
    "tsql".to_string()
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AnalyzeRequest {
    #[validate(length(min = 1))]
    pub sql: String,
    #[serde(default = "default_dialect")]
    pub dialect: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AnalyzeResponse {
    pub version: String,
    pub references: References,
    pub transactions: TransactionSummary,
    pub migration_impacts: MigrationImpacts,
    pub control_flow: ControlFlow,
    pub data_changes: DataChanges,
    pub error_handling: ErrorHandling,
    pub errors: Vec<String>,
}

pub fn run_analysis(sql: &str, dialect: &str) -> AnalyzeResponse {
    let references = analyze_references(sql, dialect);
    let transactions = analyze_transactions(sql);
    let migration_impacts = analyze_migration_impacts(sql);
    let control_flow = analyze_control_flow(sql, dialect);
    let data_changes = analyze_data_changes(sql, dialect);
    let error_handling = analyze_error_handling(sql);

    let mut errors = references.errors;
    errors.extend(control_flow.errors);
    errors.extend(data_changes.errors);

    AnalyzeResponse {
        version: VERSION.to_string(),
        references: references.references,
        transactions,
        migration_impacts,
        control_flow: control_flow.control_flow,
        data_changes: data_changes.data_changes,
        error_handling,
        errors,
    }
}

#[utoipa::path(
    post,
    path = "/mcp/analyze",
    request_body = AnalyzeRequest,
    responses((status = 200, description = "Combined analysis result", body = AnalyzeResponse)),
    tag = "Analyze"
)]
pub async fn analyze(Json(request): Json<AnalyzeRequest>) -> ApiResult<Json<AnalyzeResponse>> {
    request.validate()?;
    Ok(Json(run_analysis(&request.sql, &request.dialect)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_one_baseline() {
        let response = run_analysis("SELECT 1", "tsql");
        assert_eq!(response.version, "0.6");
        assert_eq!(response.control_flow.summary.cyclomatic_complexity, 1);
        assert!(!response.data_changes.has_writes);
        assert!(response.migration_impacts.items.is_empty());
        assert!(response.errors.is_empty());
    }

    #[test]
    fn test_transactional_block_signals() {
        let sql = "
            SET XACT_ABORT ON;
            SET TRANSACTION ISOLATION LEVEL READ COMMITTED;
            BEGIN TRY
                BEGIN TRAN;
                UPDATE dbo.T SET x = 1 WHERE id = 1;
                COMMIT TRANSACTION;
            END TRY
            BEGIN CATCH
                ROLLBACK TRAN;
                THROW;
            END CATCH
        ";
        let response = run_analysis(sql, "tsql");
        let transactions = &response.transactions;
        assert!(transactions.uses_transaction);
        assert_eq!(transactions.begin_count, 1);
        assert_eq!(transactions.commit_count, 1);
        assert_eq!(transactions.rollback_count, 1);
        assert!(transactions.has_try_catch);
        assert_eq!(transactions.xact_abort.as_deref(), Some("ON"));
        assert_eq!(transactions.isolation_level.as_deref(), Some("READ COMMITTED"));
    }

    #[test]
    fn test_determinism() {
        let sql = "CREATE PROCEDURE dbo.usp_D AS BEGIN TRAN; UPDATE dbo.U SET n = 'x' WHERE id = 1; COMMIT TRAN;";
        let first = serde_json::to_string(&run_analysis(sql, "tsql")).unwrap();
        let second = serde_json::to_string(&run_analysis(sql, "tsql")).unwrap();
        assert_eq!(first, second);
    }
}
