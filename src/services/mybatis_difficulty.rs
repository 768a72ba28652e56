//! Migration difficulty scoring for MyBatis conversion.
//!
//! Deterministic model: base score 10, add points per signal, clamp 0..100.

use serde::Serialize;
use utoipa::ToSchema;

use crate::services::analyzer::{
    analyze_control_flow, analyze_data_changes, analyze_error_handling, analyze_migration_impacts,
    analyze_references, analyze_transactions,
};
use crate::services::reusability::{ObjectInfo, Recommendation};
use crate::services::safe_sql::summarize;
use crate::utils::sorted_unique;

pub const VERSION: &str = "3.3.0";

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Factor {
    pub id: String,
    pub points: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DifficultySummary {
    pub difficulty_score: i64,
    pub difficulty_level: String,
    pub estimated_work_units: i64,
    pub is_rewrite_recommended: bool,
    pub confidence: f64,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DifficultySignals {
    pub table_count: usize,
    pub function_call_count: usize,
    pub has_writes: bool,
    pub write_ops: Vec<String>,
    pub uses_transaction: bool,
    pub has_dynamic_sql: bool,
    pub has_cursor: bool,
    pub uses_temp_objects: bool,
    pub has_merge: bool,
    pub has_output_clause: bool,
    pub has_identity_retrieval: bool,
    pub has_try_catch: bool,
    pub error_signaling: Vec<String>,
    pub cyclomatic_complexity: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DifficultyReport {
    pub version: String,
    pub object: ObjectInfo,
    pub summary: DifficultySummary,
    pub signals: DifficultySignals,
    pub factors: Vec<Factor>,
    pub recommendations: Vec<Recommendation>,
    pub errors: Vec<String>,
}

pub fn evaluate_mybatis_difficulty(
    name: &str,
    object_type: &str,
    sql: &str,
    dialect: &str,
    case_insensitive: bool,
    max_reason_items: usize,
) -> DifficultyReport {
    let summary = summarize(sql);
    tracing::info!(
        sql_len = summary.len,
        sql_hash = %summary.sha256_8,
        "evaluate_mybatis_difficulty"
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

    let changes = &data_changes.data_changes;
    let mut write_ops = changes.operations.write_ops();
    write_ops.sort();
    let has_writes = changes.has_writes;

    let has_dynamic_sql = impacts.has("IMP_DYN_SQL");
    let has_cursor = impacts.has("IMP_CURSOR");
    let uses_temp_objects = impacts.has_any(&["IMP_TEMP_TABLE", "IMP_TABLE_VARIABLE"]);
    let has_merge = impacts.has("IMP_MERGE") || changes.operations.merge.count > 0;
    let has_output_clause =
        impacts.has("IMP_OUTPUT_CLAUSE") || changes.signals.contains(&"OUTPUT".to_string());
    let has_identity_retrieval = impacts.has("IMP_IDENTITY");

    let uses_transaction = transactions.uses_transaction;
    let has_try_catch = error_handling.has_try_catch;
    let uses_at_at_error = error_handling.uses_at_at_error;

    let error_signaling = error_signaling(&error_handling, case_insensitive);

    let mut score: i64 = 10;
    let mut factors: Vec<Factor> = Vec::new();
    let factor = |factors: &mut Vec<Factor>, id: &str, points: i64, message: &str| {
        factors.push(Factor { id: id.to_string(), points, message: message.to_string() });
    };

    if has_dynamic_sql {
        score += 25;
        factor(
            &mut factors,
            "FAC_DYN_SQL",
            25,
            "Dynamic SQL increases rewrite complexity and requires MyBatis dynamic tags or refactor.",
        );
    }
    if has_cursor {
        score += 25;
        factor(
            &mut factors,
            "FAC_CURSOR",
            25,
            "Cursor usage typically needs set-based rewrites when moving to MyBatis.",
        );
    }
    if uses_temp_objects {
        score += 12;
        factor(
            &mut factors,
            "FAC_TEMP_OBJECTS",
            12,
            "Temporary tables or table variables require alternative structures in Java/MyBatis.",
        );
    }
    if has_merge {
        score += 10;
        factor(
            &mut factors,
            "FAC_MERGE",
            10,
            "MERGE statements often need custom merge logic in MyBatis.",
        );
    }
    if has_output_clause {
        score += 10;
        factor(
            &mut factors,
            "FAC_OUTPUT",
            10,
            "OUTPUT clauses require explicit result handling in MyBatis.",
        );
    }
    if has_identity_retrieval {
        score += 8;
        factor(
            &mut factors,
            "FAC_IDENTITY",
            8,
            "Identity retrieval patterns add key handling complexity in MyBatis.",
        );
    }
    if uses_transaction {
        score += 10;
        factor(
            &mut factors,
            "FAC_TXN_IN_SQL",
            10,
            "Transaction statements inside SQL need careful boundary handling.",
        );
    }
    if has_writes {
        score += 10;
        factor(
            &mut factors,
            "FAC_WRITES",
            10,
            "Write operations increase migration complexity compared with read-only logic.",
        );
    }
    if write_ops.len() > 1 {
        let points = (3 * (write_ops.len() as i64 - 1)).min(12);
        score += points;
        factor(
            &mut factors,
            "FAC_MULTI_WRITE_OPS",
            points,
            "Multiple write operation types increase mapping complexity in MyBatis.",
        );
    }
    if has_try_catch {
        score += 5;
        factor(
            &mut factors,
            "FAC_TRY_CATCH",
            5,
            "TRY/CATCH blocks require aligned exception handling in Java.",
        );
    }
    if uses_at_at_error {
        score += 8;
        factor(
            &mut factors,
            "FAC_LEGACY_ERROR",
            8,
            "Legacy @@ERROR handling needs refactoring to Java exceptions.",
        );
    }
    if cyclomatic_complexity > 5 {
        let points = (2 * (cyclomatic_complexity as i64 - 5)).min(20);
        score += points;
        factor(
            &mut factors,
            "FAC_COMPLEXITY",
            points,
            "Higher control flow complexity increases migration effort.",
        );
    }
    if table_count > 6 {
        let points = (2 * (table_count as i64 - 6)).min(14);
        score += points;
        factor(
            &mut factors,
            "FAC_MANY_TABLES",
            points,
            "Large table fan-out increases query mapping complexity.",
        );
    }
    if function_call_count > 10 {
        score += 5;
        factor(
            &mut factors,
            "FAC_MANY_FUNCS",
            5,
            "High function call volume can complicate migration logic.",
        );
    }

    let score = score.clamp(0, 100);
    let difficulty_level = difficulty_level(score);
    let estimated_work_units = ((score as f64 / 5.0).round() as i64).clamp(0, 20);
    let is_rewrite_recommended = matches!(difficulty_level.as_str(), "low" | "medium")
        && !(has_cursor || has_dynamic_sql);

    let confidence = confidence(
        &difficulty_level,
        has_dynamic_sql,
        has_cursor,
        uses_temp_objects,
        has_merge,
        cyclomatic_complexity,
    );

    let factors = normalize_factors(factors);
    let recommendations =
        recommendations_for_factors(&factors, &difficulty_level, is_rewrite_recommended);
    let (factors, recommendations, truncated, truncation_error) =
        apply_max_items(factors, recommendations, max_reason_items);

    let mut errors = sorted_unique(
        references
            .errors
            .iter()
            .chain(control_flow.errors.iter())
            .chain(data_changes.errors.iter())
            .cloned(),
    );
    if let Some(error) = truncation_error {
        errors.push(error);
    }

    DifficultyReport {
        version: VERSION.to_string(),
        object: ObjectInfo { name: name.to_string(), object_type: object_type.to_string() },
        summary: DifficultySummary {
            difficulty_score: score,
            difficulty_level,
            estimated_work_units,
            is_rewrite_recommended,
            confidence,
            truncated,
        },
        signals: DifficultySignals {
            table_count,
            function_call_count,
            has_writes,
            write_ops,
            uses_transaction,
            has_dynamic_sql,
            has_cursor,
            uses_temp_objects,
            has_merge,
            has_output_clause,
            has_identity_retrieval,
            has_try_catch,
            error_signaling,
            cyclomatic_complexity,
        },
        factors,
        recommendations,
        errors,
    }
}

fn difficulty_level(score: i64) -> String {
    if score <= 24 {
        "low".to_string()
    } else if score <= 49 {
        "medium".to_string()
    } else if score <= 74 {
        "high".to_string()
    } else {
        "very_high".to_string()
    }
}

fn confidence(
    difficulty_level: &str,
    has_dynamic_sql: bool,
    has_cursor: bool,
    uses_temp_objects: bool,
    has_merge: bool,
    cyclomatic_complexity: usize,
) -> f64 {
    if matches!(difficulty_level, "low" | "medium")
        && !(has_dynamic_sql || has_cursor || uses_temp_objects || has_merge)
        && cyclomatic_complexity <= 6
    {
        return 0.85;
    }
    match difficulty_level {
        "medium" => 0.75,
        "high" => 0.65,
        _ => 0.55,
    }
}

fn error_signaling(
    error_handling: &crate::services::analyzer::ErrorHandling,
    case_insensitive: bool,
) -> Vec<String> {
    let mut signals = Vec::new();
    if error_handling.has_try_catch {
        signals.push("TRY/CATCH".to_string());
    }
    if error_handling.uses_throw {
        signals.push("THROW".to_string());
    }
    if error_handling.uses_raiserror {
        signals.push("RAISERROR".to_string());
    }
    if error_handling.uses_at_at_error {
        signals.push("@@ERROR".to_string());
    }
    if error_handling.uses_return {
        signals.push("RETURN_CODE".to_string());
    }
    if error_handling.uses_output_error_params {
        signals.push("OUTPUT_PARAM".to_string());
    }
    if case_insensitive {
        sorted_unique(signals.into_iter().map(|s| s.to_ascii_uppercase()))
    } else {
        sorted_unique(signals)
    }
}

fn normalize_factors(factors: Vec<Factor>) -> Vec<Factor> {
    let mut unique: Vec<Factor> = Vec::new();
    for factor in factors {
        if !unique.iter().any(|existing| existing.id == factor.id) {
            unique.push(factor);
        }
    }
    unique.sort_by(|a, b| b.points.cmp(&a.points).then_with(|| a.id.cmp(&b.id)));
    unique
}

fn recommendations_for_factors(
    factors: &[Factor],
    difficulty_level: &str,
    is_rewrite_recommended: bool,
) -> Vec<Recommendation> {
    let has = |id: &str| factors.iter().any(|factor| factor.id == id);
    let mut recommendations: Vec<Recommendation> = Vec::new();
    let recommend = |recommendations: &mut Vec<Recommendation>, id: &str, message: &str| {
        recommendations.push(Recommendation { id: id.to_string(), message: message.to_string() });
    };

    if has("FAC_DYN_SQL") || has("FAC_CURSOR") {
        recommend(
            &mut recommendations,
            "REC_CALL_SP_FIRST",
            "Start with CallableStatement mapping, then refactor to MyBatis SQL.",
        );
        recommend(
            &mut recommendations,
            "REC_REFRACTOR_DYNAMIC_SQL",
            "Refactor dynamic SQL into MyBatis <if> and <choose> constructs.",
        );
        recommend(
            &mut recommendations,
            "REC_REPLACE_CURSOR",
            "Replace cursor logic with set-based queries or batch processing.",
        );
    }
    if has("FAC_TXN_IN_SQL") {
        recommend(
            &mut recommendations,
            "REC_TX_BOUNDARY_REVIEW",
            "Review transaction boundaries for relocation to the service layer.",
        );
    }
    if has("FAC_OUTPUT") || has("FAC_IDENTITY") {
        recommend(
            &mut recommendations,
            "REC_HANDLE_KEYS_AND_OUTPUT",
            "Plan for key retrieval and OUTPUT clause handling in MyBatis.",
        );
    }
    if has("FAC_COMPLEXITY") {
        recommend(
            &mut recommendations,
            "REC_REDUCE_BRANCHING",
            "Reduce branching or split logic into smaller MyBatis mappings.",
        );
    }
    if has("FAC_TEMP_OBJECTS") {
        recommend(
            &mut recommendations,
            "REC_REWRITE_TEMP_OBJECTS",
            "Rewrite temp table usage using collections or staging tables.",
        );
    }
    if matches!(difficulty_level, "low" | "medium") && is_rewrite_recommended {
        recommend(
            &mut recommendations,
            "REC_DIRECT_REWRITE",
            "Proceed with direct SQL rewrite to MyBatis mapper statements.",
        );
    }

    let mut unique: Vec<Recommendation> = Vec::new();
    for recommendation in recommendations {
        if !unique.iter().any(|existing| existing.id == recommendation.id) {
            unique.push(recommendation);
        }
    }
    unique.sort_by(|a, b| a.id.cmp(&b.id));
    unique
}

fn apply_max_items(
    factors: Vec<Factor>,
    recommendations: Vec<Recommendation>,
    max_items: usize,
) -> (Vec<Factor>, Vec<Recommendation>, bool, Option<String>) {
    const MESSAGE: &str = "max_reason_items_exceeded: truncated factors and recommendations";
    if max_items == 0 {
        return (Vec::new(), Vec::new(), true, Some(MESSAGE.to_string()));
    }
    if factors.len() + recommendations.len() <= max_items {
        return (factors, recommendations, false, None);
    }
    if factors.len() >= max_items {
        let mut factors = factors;
        factors.truncate(max_items);
        return (factors, Vec::new(), true, Some(MESSAGE.to_string()));
    }
    let remaining = max_items - factors.len();
    let mut recommendations = recommendations;
    recommendations.truncate(remaining);
    (factors, recommendations, true, Some(MESSAGE.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_select_is_low() {
        let report = evaluate_mybatis_difficulty(
            "dbo.usp_Get",
            "procedure",
            "SELECT id FROM dbo.Users WHERE id = 1",
            "tsql",
            true,
            25,
        );
        assert_eq!(report.summary.difficulty_score, 10);
        assert_eq!(report.summary.difficulty_level, "low");
        assert_eq!(report.summary.estimated_work_units, 2);
        assert!(report.summary.is_rewrite_recommended);
        assert_eq!(report.summary.confidence, 0.85);
    }

    #[test]
    fn test_cursor_and_dynamic_sql_block_rewrite() {
        let sql = "DECLARE c CURSOR FOR SELECT 1; EXEC(@dyn);";
        let report =
            evaluate_mybatis_difficulty("usp", "procedure", sql, "tsql", true, 25);
        // 10 + 25 + 25
        assert_eq!(report.summary.difficulty_score, 60);
        assert_eq!(report.summary.difficulty_level, "high");
        assert!(!report.summary.is_rewrite_recommended);
        let factor_ids: Vec<_> = report.factors.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(factor_ids, vec!["FAC_CURSOR", "FAC_DYN_SQL"]);
        assert!(
            report
                .recommendations
                .iter()
                .any(|r| r.id == "REC_CALL_SP_FIRST")
        );
    }

    #[test]
    fn test_multi_write_ops_points() {
        let sql = "INSERT INTO dbo.A (id) VALUES (1); UPDATE dbo.B SET x = 1 WHERE id = 1; DELETE FROM dbo.C WHERE id = 1;";
        let report =
            evaluate_mybatis_difficulty("usp", "procedure", sql, "tsql", true, 25);
        let multi = report
            .factors
            .iter()
            .find(|f| f.id == "FAC_MULTI_WRITE_OPS")
            .expect("factor present");
        assert_eq!(multi.points, 6);
        assert_eq!(report.signals.write_ops, vec!["delete", "insert", "update"]);
    }

    #[test]
    fn test_error_signaling_upper_sorted() {
        let sql = "BEGIN TRY SELECT 1 END TRY BEGIN CATCH THROW END CATCH IF @@ERROR <> 0 RETURN -1";
        let report =
            evaluate_mybatis_difficulty("usp", "procedure", sql, "tsql", true, 25);
        let signaling = &report.signals.error_signaling;
        let mut expected = signaling.clone();
        expected.sort();
        assert_eq!(signaling, &expected);
        assert!(signaling.contains(&"TRY/CATCH".to_string()));
        assert!(signaling.contains(&"RETURN_CODE".to_string()));
    }

    #[test]
    fn test_max_items_truncation_error() {
        let sql = "DECLARE c CURSOR FOR SELECT 1; EXEC(@dyn); BEGIN TRAN; INSERT INTO dbo.T (id) VALUES (1); COMMIT;";
        let report = evaluate_mybatis_difficulty("usp", "procedure", sql, "tsql", true, 3);
        assert!(report.summary.truncated);
        assert!(
            report
                .errors
                .iter()
                .any(|e| e.starts_with("max_reason_items_exceeded"))
        );
        assert_eq!(report.factors.len() + report.recommendations.len(), 3);
    }
}
