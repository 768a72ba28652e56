//! Reusability scoring for a single SP/FN definition.
//!
//! Deterministic model: start at 100, subtract penalties, apply one bonus,
//! clamp to 0..100.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::analyzer::{
    analyze_control_flow, analyze_data_changes, analyze_error_handling, analyze_migration_impacts,
    analyze_references, analyze_transactions,
};
use crate::services::safe_sql::{strip_comments_and_strings, summarize};
use crate::utils::{re, sorted_unique};

static IF_EXISTS: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bif\s+exists\b"));
static EXISTS_CALL: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bexists\s*\("));

pub const VERSION: &str = "2.2.0";

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ObjectInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReusabilitySummary {
    pub score: i64,
    pub grade: String,
    pub is_candidate: bool,
    pub candidate_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReusabilitySignals {
    pub read_only: bool,
    pub has_writes: bool,
    pub uses_transaction: bool,
    pub has_dynamic_sql: bool,
    pub has_cursor: bool,
    pub uses_temp_objects: bool,
    pub cyclomatic_complexity: usize,
    pub table_count: usize,
    pub function_call_count: usize,
    pub has_try_catch: bool,
    pub error_signaling: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Reason {
    pub id: String,
    pub impact: String,
    pub weight: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Recommendation {
    pub id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReusabilityReport {
    pub version: String,
    pub object: ObjectInfo,
    pub summary: ReusabilitySummary,
    pub signals: ReusabilitySignals,
    pub reasons: Vec<Reason>,
    pub recommendations: Vec<Recommendation>,
    pub errors: Vec<String>,
}

pub fn evaluate_reusability(
    name: &str,
    object_type: &str,
    sql: &str,
    dialect: &str,
    max_reason_items: usize,
) -> ReusabilityReport {
    let summary = summarize(sql);
    tracing::info!(
        sql_len = summary.len,
        sql_hash = %summary.sha256_8,
        "evaluate_reusability"
    );

    let references = analyze_references(sql, dialect);
    let transactions = analyze_transactions(sql);
    let impacts = analyze_migration_impacts(sql);
    let control_flow = analyze_control_flow(sql, dialect);
    let data_changes = analyze_data_changes(sql, dialect);
    let error_handling = analyze_error_handling(sql);

    let table_count = references.references.tables.len();
    let function_call_count = references.references.functions.len();
    let cyclomatic_complexity = control_flow.control_flow.summary.cyclomatic_complexity;
    let has_writes = data_changes.data_changes.has_writes;
    let read_only = !has_writes;
    let uses_transaction = transactions.uses_transaction;

    let has_dynamic_sql = impacts.has("IMP_DYN_SQL");
    let has_cursor = impacts.has("IMP_CURSOR");
    let uses_temp_objects = impacts.has_any(&["IMP_TEMP_TABLE", "IMP_TABLE_VARIABLE"]);
    let external_system_impact = impacts.has_any(&["IMP_LINKED_SERVER", "IMP_SYSTEM_PROC"]);

    let mut error_signaling = Vec::new();
    if error_handling.uses_throw {
        error_signaling.push("THROW".to_string());
    }
    if error_handling.uses_raiserror {
        error_signaling.push("RAISERROR".to_string());
    }
    if error_handling.uses_return {
        error_signaling.push("RETURN".to_string());
    }
    let error_signaling = sorted_unique(error_signaling);

    let mut score: i64 = 100;
    let mut reasons: Vec<Reason> = Vec::new();
    let mut recommendations: Vec<Recommendation> = Vec::new();

    let reason = |reasons: &mut Vec<Reason>, id: &str, impact: &str, weight: i64, message: &str| {
        reasons.push(Reason {
            id: id.to_string(),
            impact: impact.to_string(),
            weight,
            message: message.to_string(),
        });
    };
    let recommend = |recommendations: &mut Vec<Recommendation>, id: &str, message: &str| {
        recommendations.push(Recommendation { id: id.to_string(), message: message.to_string() });
    };

    if has_writes {
        score -= 25;
        reason(
            &mut reasons,
            "RSN_WRITES",
            "-",
            25,
            "Data writes reduce portability for reusable utilities.",
        );
        recommend(
            &mut recommendations,
            "REC_REDUCE_WRITES",
            "Minimize writes or isolate mutating logic for safer reuse.",
        );
    } else {
        reason(
            &mut reasons,
            "RSN_READ_ONLY",
            "+",
            15,
            "Read-only logic is easier to reuse safely.",
        );
    }

    if uses_transaction {
        score -= 15;
        reason(
            &mut reasons,
            "RSN_TXN",
            "-",
            15,
            "Explicit transactions complicate reuse and composition.",
        );
        recommend(
            &mut recommendations,
            "REC_REVIEW_TXN",
            "Revisit transaction boundaries to keep utilities composable.",
        );
    }

    if has_dynamic_sql {
        score -= 20;
        reason(
            &mut reasons,
            "RSN_DYN_SQL",
            "-",
            20,
            "Dynamic SQL makes behavior harder to reuse and test.",
        );
        recommend(
            &mut recommendations,
            "REC_AVOID_DYNAMIC_SQL",
            "Avoid dynamic SQL to improve portability and testability.",
        );
    }

    if has_cursor {
        score -= 20;
        reason(
            &mut reasons,
            "RSN_CURSOR",
            "-",
            20,
            "Cursor usage often limits reuse due to imperative flow.",
        );
        recommend(
            &mut recommendations,
            "REC_AVOID_CURSOR",
            "Prefer set-based logic instead of cursors for reuse.",
        );
    }

    if uses_temp_objects {
        score -= 10;
        reason(
            &mut reasons,
            "RSN_TEMP_OBJECTS",
            "-",
            10,
            "Temporary objects reduce reuse across contexts.",
        );
        recommend(
            &mut recommendations,
            "REC_REDUCE_TEMP_OBJECTS",
            "Limit temp tables/variables to keep utilities lightweight.",
        );
    }

    if table_count > 5 {
        let penalty = (((table_count - 5) * 2) as i64).min(20);
        score -= penalty;
        reason(
            &mut reasons,
            "RSN_TABLE_COUNT",
            "-",
            penalty,
            "Large table footprints reduce reuse and portability.",
        );
        recommend(
            &mut recommendations,
            "REC_REDUCE_TABLES",
            "Reduce table dependencies or split into smaller utilities.",
        );
    }

    if cyclomatic_complexity > 5 {
        let penalty = (((cyclomatic_complexity - 5) * 2) as i64).min(20);
        score -= penalty;
        reason(
            &mut reasons,
            "RSN_COMPLEXITY",
            "-",
            penalty,
            "High control-flow complexity reduces reuse clarity.",
        );
        recommend(
            &mut recommendations,
            "REC_REDUCE_COMPLEXITY",
            "Simplify branching to improve utility reusability.",
        );
    }

    if external_system_impact {
        score -= 25;
        reason(
            &mut reasons,
            "RSN_EXTERNAL_IMPACT",
            "-",
            25,
            "External/system dependencies reduce safe reuse.",
        );
        recommend(
            &mut recommendations,
            "REC_REVIEW_EXTERNALS",
            "Review linked/system dependencies for portability.",
        );
    }

    if read_only && !uses_transaction && !has_dynamic_sql && cyclomatic_complexity <= 3 {
        score += 5;
        reason(
            &mut reasons,
            "RSN_LOW_COMPLEXITY",
            "+",
            5,
            "Simple, read-only flow favors reuse.",
        );
    }

    let score = score.clamp(0, 100);
    let grade = grade(score);
    let is_candidate = score >= 65;
    let candidate_type =
        candidate_type(sql, has_writes, read_only, table_count, cyclomatic_complexity);

    let errors = sorted_unique(
        references
            .errors
            .iter()
            .chain(control_flow.errors.iter())
            .chain(data_changes.errors.iter())
            .cloned(),
    );

    ReusabilityReport {
        version: VERSION.to_string(),
        object: ObjectInfo { name: name.to_string(), object_type: object_type.to_string() },
        summary: ReusabilitySummary { score, grade, is_candidate, candidate_type },
        signals: ReusabilitySignals {
            read_only,
            has_writes,
            uses_transaction,
            has_dynamic_sql,
            has_cursor,
            uses_temp_objects,
            cyclomatic_complexity,
            table_count,
            function_call_count,
            has_try_catch: error_handling.has_try_catch,
            error_signaling,
        },
        reasons: normalize_reasons(reasons, max_reason_items),
        recommendations: normalize_recommendations(recommendations),
        errors,
    }
}

fn grade(score: i64) -> String {
    if score >= 80 {
        "A".to_string()
    } else if score >= 65 {
        "B".to_string()
    } else if score >= 50 {
        "C".to_string()
    } else {
        "D".to_string()
    }
}

fn candidate_type(
    sql: &str,
    has_writes: bool,
    read_only: bool,
    table_count: usize,
    cyclomatic_complexity: usize,
) -> Option<String> {
    if has_writes {
        return Some("mutator".to_string());
    }
    if read_only && table_count <= 3 && cyclomatic_complexity <= 3 {
        return Some("lookup".to_string());
    }
    if read_only && has_guard_checks(sql) {
        return Some("validation".to_string());
    }
    None
}

fn has_guard_checks(sql: &str) -> bool {
    let stripped = strip_comments_and_strings(sql);
    IF_EXISTS.is_match(&stripped) || EXISTS_CALL.is_match(&stripped)
}

fn normalize_reasons(reasons: Vec<Reason>, max_items: usize) -> Vec<Reason> {
    let mut unique: Vec<Reason> = Vec::new();
    for reason in reasons {
        if !unique.iter().any(|existing| existing.id == reason.id) {
            unique.push(reason);
        }
    }
    unique.sort_by(|a, b| {
        b.weight
            .abs()
            .cmp(&a.weight.abs())
            .then_with(|| a.id.cmp(&b.id))
    });
    unique.truncate(max_items);
    unique
}

fn normalize_recommendations(recommendations: Vec<Recommendation>) -> Vec<Recommendation> {
    let mut unique: Vec<Recommendation> = Vec::new();
    for recommendation in recommendations {
        if !unique.iter().any(|existing| existing.id == recommendation.id) {
            unique.push(recommendation);
        }
    }
    unique.sort_by(|a, b| a.id.cmp(&b.id));
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_lookup_procedure() {
        let report = evaluate_reusability(
            "dbo.usp_GetUsers",
            "procedure",
            "CREATE PROCEDURE usp AS SELECT * FROM dbo.Users",
            "tsql",
            20,
        );
        assert!(matches!(report.summary.grade.as_str(), "A" | "B"));
        assert!(report.summary.is_candidate);
        assert_eq!(report.summary.candidate_type.as_deref(), Some("lookup"));
        assert!(report.reasons.iter().any(|r| r.id == "RSN_READ_ONLY"));
    }

    #[test]
    fn test_heavy_procedure_grades_d() {
        let sql = "
            CREATE PROCEDURE dbo.usp_Heavy AS
            BEGIN
                BEGIN TRAN;
                DECLARE c CURSOR FOR SELECT id FROM dbo.A;
                DECLARE @dyn NVARCHAR(200) = 'SELECT 1';
                EXEC(@dyn);
                INSERT INTO dbo.B (id) VALUES (1);
                COMMIT TRAN;
            END
        ";
        let report = evaluate_reusability("dbo.usp_Heavy", "procedure", sql, "tsql", 20);
        assert_eq!(report.summary.grade, "D");
        assert!(!report.summary.is_candidate);
        assert_eq!(report.summary.candidate_type.as_deref(), Some("mutator"));
        let reason_ids: Vec<_> = report.reasons.iter().map(|r| r.id.as_str()).collect();
        for id in ["RSN_DYN_SQL", "RSN_CURSOR", "RSN_TXN", "RSN_WRITES"] {
            assert!(reason_ids.contains(&id), "missing {id}");
        }
    }

    #[test]
    fn test_validation_candidate() {
        let sql = "CREATE PROCEDURE usp AS IF EXISTS (SELECT 1 FROM dbo.A JOIN dbo.B ON 1=1 JOIN dbo.C ON 1=1 JOIN dbo.D ON 1=1) SELECT 1";
        let report = evaluate_reusability("usp", "procedure", sql, "tsql", 20);
        // Four tables and a branch disqualify lookup; the EXISTS guard makes
        // it a validation candidate.
        assert_eq!(report.summary.candidate_type.as_deref(), Some("validation"));
    }

    #[test]
    fn test_reasons_sorted_by_weight_then_id() {
        let sql = "
            BEGIN TRAN;
            INSERT INTO dbo.T (id) VALUES (1);
            COMMIT TRAN;
        ";
        let report = evaluate_reusability("usp", "procedure", sql, "tsql", 20);
        assert_eq!(report.reasons[0].id, "RSN_WRITES");
        assert_eq!(report.reasons[1].id, "RSN_TXN");
    }

    #[test]
    fn test_recommendations_sorted_by_id() {
        let sql = "BEGIN TRAN; INSERT INTO dbo.T (id) VALUES (1); COMMIT TRAN;";
        let report = evaluate_reusability("usp", "procedure", sql, "tsql", 20);
        let ids: Vec<_> = report.recommendations.iter().map(|r| r.id.clone()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_max_reason_items_truncates() {
        let sql = "BEGIN TRAN; DECLARE c CURSOR FOR SELECT 1; EXEC(@d); INSERT INTO dbo.T (id) VALUES (1);";
        let report = evaluate_reusability("usp", "procedure", sql, "tsql", 2);
        assert_eq!(report.reasons.len(), 2);
    }
}
