//! Java/MyBatis mapping strategy recommendation.
//!
//! Defaults to a direct rewrite; risk signals (cursor, dynamic SQL, temp
//! objects, MERGE) or high complexity switch the approach to an interim
//! callable mapping.

use serde::Serialize;
use utoipa::ToSchema;

use crate::services::analyzer::{
    analyze_control_flow, analyze_data_changes, analyze_error_handling, analyze_migration_impacts,
    analyze_references, analyze_transactions,
};
use crate::services::reusability::{ObjectInfo, Recommendation};
use crate::services::safe_sql::summarize;
use crate::services::tx_boundary::error_signaling;
use crate::utils::sorted_unique;

pub const VERSION: &str = "3.1.0";

pub const APPROACH_REWRITE: &str = "rewrite_to_mybatis_sql";
pub const APPROACH_CALL_SP_FIRST: &str = "call_sp_first";

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StrategySummary {
    pub approach: String,
    pub confidence: f64,
    pub difficulty: String,
    pub is_recommended: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StrategySignals {
    pub read_only: bool,
    pub has_writes: bool,
    pub writes_kind: Vec<String>,
    pub uses_transaction: bool,
    pub has_dynamic_sql: bool,
    pub has_cursor: bool,
    pub uses_temp_objects: bool,
    pub has_merge: bool,
    pub has_identity_retrieval: bool,
    pub has_output_clause: bool,
    pub cyclomatic_complexity: usize,
    pub table_count: usize,
    pub has_try_catch: bool,
    pub error_signaling: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StrategyItem {
    pub id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StrategyPlan {
    pub migration_path: Vec<String>,
    pub recommended_patterns: Vec<StrategyItem>,
    pub anti_patterns: Vec<StrategyItem>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MapperMethod {
    pub name: String,
    pub kind: String,
    pub parameter_style: String,
    pub return_style: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct XmlTemplate {
    pub statement_tag: String,
    pub skeleton: String,
    pub dynamic_tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MyBatisMapping {
    pub mapper_method: MapperMethod,
    pub xml_template: XmlTemplate,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ServicePattern {
    pub transactional: bool,
    pub exception_mapping: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DtoSuggestion {
    pub id: String,
    pub fields: Vec<String>,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JavaMapping {
    pub service_pattern: ServicePattern,
    pub dto_suggestions: Vec<DtoSuggestion>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StrategyReason {
    pub id: String,
    pub weight: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MappingStrategyReport {
    pub version: String,
    pub object: ObjectInfo,
    pub summary: StrategySummary,
    pub signals: StrategySignals,
    pub strategy: StrategyPlan,
    pub mybatis: MyBatisMapping,
    pub java: JavaMapping,
    pub reasons: Vec<StrategyReason>,
    pub recommendations: Vec<Recommendation>,
    pub errors: Vec<String>,
}

#[allow(clippy::too_many_lines)]
pub fn recommend_mapping_strategy(
    name: &str,
    object_type: &str,
    sql: &str,
    dialect: &str,
    target_style: &str,
    max_items: usize,
) -> MappingStrategyReport {
    let summary = summarize(sql);
    tracing::info!(
        sql_len = summary.len,
        sql_hash = %summary.sha256_8,
        "recommend_mapping_strategy"
    );

    let references = analyze_references(sql, dialect);
    let transactions = analyze_transactions(sql);
    let impacts = analyze_migration_impacts(sql);
    let control_flow = analyze_control_flow(sql, dialect);
    let data_changes = analyze_data_changes(sql, dialect);
    let error_handling = analyze_error_handling(sql);

    let table_count = references.references.tables.len();
    let cyclomatic_complexity = control_flow.control_flow.summary.cyclomatic_complexity;
    let uses_transaction = transactions.uses_transaction;
    let has_try_catch = error_handling.has_try_catch;

    let changes = &data_changes.data_changes;
    let has_writes = changes.has_writes;
    let read_only = !has_writes;
    let write_kinds = changes.operations.write_ops();

    let has_dynamic_sql = impacts.has("IMP_DYN_SQL");
    let has_cursor = impacts.has("IMP_CURSOR");
    let uses_temp_objects = impacts.has_any(&["IMP_TEMP_TABLE", "IMP_TABLE_VARIABLE"]);
    let has_merge = impacts.has("IMP_MERGE") || changes.operations.merge.count > 0;
    let has_output_clause =
        impacts.has("IMP_OUTPUT_CLAUSE") || changes.signals.contains(&"OUTPUT".to_string());
    let has_identity_retrieval = impacts.has("IMP_IDENTITY");

    let signaling = error_signaling(&error_handling);
    let risk_signals = has_cursor || has_dynamic_sql || uses_temp_objects || has_merge;

    let approach = choose_approach(
        target_style,
        risk_signals,
        uses_transaction,
        has_writes,
        cyclomatic_complexity,
    );

    let difficulty = difficulty_level(
        has_writes,
        uses_transaction,
        cyclomatic_complexity,
        has_dynamic_sql,
        has_cursor,
        uses_temp_objects,
        has_merge,
    );

    let confidence = confidence_score(
        approach,
        read_only,
        has_writes,
        uses_transaction,
        risk_signals,
        cyclomatic_complexity,
        &write_kinds,
    );

    let (recommended_patterns, anti_patterns) =
        strategy_patterns(approach, read_only, has_writes, has_dynamic_sql);
    let (reasons, recommendations) = reasons_and_recommendations(
        read_only,
        has_writes,
        has_dynamic_sql,
        has_cursor,
        uses_temp_objects,
        has_merge,
        uses_transaction,
        cyclomatic_complexity,
        &signaling,
        has_identity_retrieval,
        has_output_clause,
        approach,
    );

    let mut errors = sorted_unique(
        references
            .errors
            .iter()
            .chain(control_flow.errors.iter())
            .chain(data_changes.errors.iter())
            .cloned(),
    );

    let reasons = normalize_reasons(reasons);
    let recommendations = normalize_recommendations(recommendations);
    let (reasons, recommendations, truncation_error) =
        apply_max_items(reasons, recommendations, max_items);
    if let Some(error) = truncation_error {
        errors.push(error);
        errors = sorted_unique(errors);
    }

    let mapper_method = mapper_method(object_type, approach, read_only, &write_kinds);
    let xml_template = xml_template(approach, read_only, &write_kinds, has_dynamic_sql);

    MappingStrategyReport {
        version: VERSION.to_string(),
        object: ObjectInfo { name: name.to_string(), object_type: object_type.to_string() },
        summary: StrategySummary {
            approach: approach.to_string(),
            confidence,
            difficulty,
            is_recommended: true,
        },
        signals: StrategySignals {
            read_only,
            has_writes,
            writes_kind: if write_kinds.is_empty() {
                vec!["select".to_string()]
            } else {
                write_kinds.clone()
            },
            uses_transaction,
            has_dynamic_sql,
            has_cursor,
            uses_temp_objects,
            has_merge,
            has_identity_retrieval,
            has_output_clause,
            cyclomatic_complexity,
            table_count,
            has_try_catch,
            error_signaling: signaling,
        },
        strategy: StrategyPlan {
            migration_path: if approach == APPROACH_CALL_SP_FIRST {
                vec!["intermediate_state".to_string(), "target_state".to_string()]
            } else {
                vec!["target_state".to_string()]
            },
            recommended_patterns,
            anti_patterns,
        },
        mybatis: MyBatisMapping { mapper_method, xml_template },
        java: JavaMapping {
            service_pattern: ServicePattern {
                transactional: uses_transaction && approach == APPROACH_REWRITE,
                exception_mapping: "throw domain exception on error".to_string(),
            },
            dto_suggestions: vec![DtoSuggestion {
                id: "DTO_REQUEST".to_string(),
                fields: vec!["...".to_string()],
                notes: "best-effort based on parameter markers; no SQL text".to_string(),
            }],
        },
        reasons,
        recommendations,
        errors,
    }
}

fn choose_approach(
    target_style: &str,
    risk_signals: bool,
    uses_transaction: bool,
    has_writes: bool,
    cyclomatic_complexity: usize,
) -> &'static str {
    let risk_based = risk_signals
        || cyclomatic_complexity >= 12
        || (uses_transaction && has_writes && cyclomatic_complexity >= 8);
    if target_style == APPROACH_CALL_SP_FIRST {
        if !risk_signals && cyclomatic_complexity <= 5 {
            return APPROACH_REWRITE;
        }
        return APPROACH_CALL_SP_FIRST;
    }
    if risk_based { APPROACH_CALL_SP_FIRST } else { APPROACH_REWRITE }
}

fn difficulty_level(
    has_writes: bool,
    uses_transaction: bool,
    cyclomatic_complexity: usize,
    has_dynamic_sql: bool,
    has_cursor: bool,
    uses_temp_objects: bool,
    has_merge: bool,
) -> String {
    const LEVELS: [&str; 4] = ["low", "medium", "high", "very_high"];
    let mut index = 0usize;
    if has_writes {
        index += 1;
    }
    if uses_transaction {
        index += 1;
    }
    if cyclomatic_complexity > 8 {
        index += 1;
    }
    let risk_count = [has_dynamic_sql, has_cursor, uses_temp_objects, has_merge]
        .iter()
        .filter(|flag| **flag)
        .count();
    if risk_count > 0 {
        index += risk_count.min(2);
    }
    LEVELS[index.min(LEVELS.len() - 1)].to_string()
}

fn confidence_score(
    approach: &str,
    read_only: bool,
    has_writes: bool,
    uses_transaction: bool,
    risk_signals: bool,
    cyclomatic_complexity: usize,
    write_kinds: &[String],
) -> f64 {
    let simple_write = has_writes
        && write_kinds.len() == 1
        && !uses_transaction
        && !risk_signals
        && cyclomatic_complexity <= 6;
    let base: f64 = if approach == APPROACH_REWRITE {
        if read_only && cyclomatic_complexity <= 5 && !risk_signals && !uses_transaction {
            0.85
        } else if simple_write {
            0.75
        } else {
            0.65
        }
    } else if risk_signals || cyclomatic_complexity >= 12 {
        0.85
    } else {
        0.65
    };
    base.clamp(0.5, 0.9)
}

fn strategy_patterns(
    approach: &str,
    read_only: bool,
    has_writes: bool,
    has_dynamic_sql: bool,
) -> (Vec<StrategyItem>, Vec<StrategyItem>) {
    let mut patterns: Vec<StrategyItem> = Vec::new();
    let mut anti_patterns: Vec<StrategyItem> = Vec::new();
    let item = |id: &str, message: &str| StrategyItem {
        id: id.to_string(),
        message: message.to_string(),
    };

    if approach == APPROACH_REWRITE {
        if read_only {
            patterns.push(item(
                "PAT_SELECT_MAPPER",
                "Use <select> with resultType/resultMap for read queries.",
            ));
        }
        if has_writes {
            patterns.push(item(
                "PAT_DML_STATEMENTS",
                "Use <insert>/<update>/<delete> tags that match write operations.",
            ));
        }
        if has_dynamic_sql {
            patterns.push(item(
                "PAT_MYBATIS_DYNAMIC_TAGS",
                "Use MyBatis <if>/<choose>/<foreach> instead of string concatenation.",
            ));
            anti_patterns.push(item(
                "ANTI_DYN_SQL_CONCAT",
                "Avoid string-concatenated dynamic SQL; use MyBatis dynamic tags.",
            ));
        }
    } else {
        patterns.push(item(
            "PAT_CALLABLE_STATEMENT",
            "Use statementType=CALLABLE with IN/OUT param bindings.",
        ));
        if has_dynamic_sql {
            anti_patterns.push(item(
                "ANTI_DYN_SQL_CONCAT",
                "Avoid string-concatenated dynamic SQL; use MyBatis dynamic tags.",
            ));
        }
    }

    (normalize_strategy_items(patterns), normalize_strategy_items(anti_patterns))
}

#[allow(clippy::too_many_arguments)]
fn reasons_and_recommendations(
    read_only: bool,
    has_writes: bool,
    has_dynamic_sql: bool,
    has_cursor: bool,
    uses_temp_objects: bool,
    has_merge: bool,
    uses_transaction: bool,
    cyclomatic_complexity: usize,
    error_signaling: &[String],
    has_identity_retrieval: bool,
    has_output_clause: bool,
    approach: &str,
) -> (Vec<StrategyReason>, Vec<Recommendation>) {
    let mut reasons: Vec<StrategyReason> = Vec::new();
    let mut recommendations: Vec<Recommendation> = Vec::new();
    let reason = |id: &str, weight: i64, message: &str| StrategyReason {
        id: id.to_string(),
        weight,
        message: message.to_string(),
    };
    let recommendation = |id: &str, message: &str| Recommendation {
        id: id.to_string(),
        message: message.to_string(),
    };

    if read_only && cyclomatic_complexity <= 5 {
        reasons.push(reason(
            "RSN_READ_ONLY_LOW_COMPLEXITY",
            20,
            "Read-only + low complexity favors direct SQL rewrite in MyBatis.",
        ));
        recommendations.push(recommendation(
            "REC_RESULTMAP_FOR_JOINS",
            "Prefer resultMap when column aliases or joins increase mapping complexity.",
        ));
    }
    if has_writes {
        reasons.push(reason(
            "RSN_HAS_WRITES",
            15,
            "Write operations increase migration care for MyBatis mappings.",
        ));
    }
    if uses_transaction {
        recommendations.push(recommendation(
            "REC_SERVICE_TXN_AWARE",
            "Prefer service-layer transaction demarcation in rewrite flows to avoid nesting stored-proc transactions.",
        ));
    }
    if has_dynamic_sql {
        reasons.push(reason(
            "RSN_DYNAMIC_SQL",
            18,
            "Dynamic SQL suggests an interim callable strategy or careful refactor.",
        ));
    }
    if has_cursor {
        reasons.push(reason(
            "RSN_CURSOR",
            18,
            "Cursor usage often requires an interim callable strategy.",
        ));
    }
    if uses_temp_objects {
        reasons.push(reason(
            "RSN_TEMP_OBJECTS",
            12,
            "Temporary objects add rewrite complexity.",
        ));
    }
    if has_merge {
        reasons.push(reason(
            "RSN_MERGE",
            12,
            "MERGE statements often need careful translation.",
        ));
    }
    if cyclomatic_complexity >= 12 {
        reasons.push(reason(
            "RSN_HIGH_COMPLEXITY",
            20,
            "High control-flow complexity favors staged migration.",
        ));
    }

    let has_signal = |signal: &str| error_signaling.iter().any(|s| s == signal);
    if has_signal("THROW") || has_signal("RAISERROR") {
        recommendations.push(recommendation(
            "REC_MAP_TO_EXCEPTION",
            "Map THROW/RAISERROR to custom domain exceptions with standardized codes.",
        ));
    }
    if has_signal("@@ERROR") {
        recommendations.push(recommendation(
            "REC_REMOVE_LEGACY_ERROR",
            "Replace @@ERROR handling with TRY/CATCH + THROW in Java services.",
        ));
    }
    if has_identity_retrieval {
        recommendations.push(recommendation(
            "REC_USE_SELECTKEY_OR_RETURNING",
            "Use MyBatis <selectKey> or follow-up selects for identity retrieval.",
        ));
    }
    if has_output_clause {
        recommendations.push(recommendation(
            "REC_OUTPUT_MAPPING",
            "Map OUTPUT clause rows to DTOs via explicit resultMap definitions.",
        ));
    }
    if approach == APPROACH_CALL_SP_FIRST {
        recommendations.push(recommendation(
            "REC_REFRACTOR_LATER",
            "Plan a later refactor into smaller MyBatis queries for target-state rewrite.",
        ));
    }

    (reasons, recommendations)
}

fn mapper_method(
    object_type: &str,
    approach: &str,
    read_only: bool,
    write_kinds: &[String],
) -> MapperMethod {
    let prefix = if approach == APPROACH_CALL_SP_FIRST {
        "call"
    } else if read_only {
        "select"
    } else {
        "execute"
    };
    let suffix = camelize(object_type);
    let name = format!("{prefix}{}", if suffix.is_empty() { "Object".to_string() } else { suffix });

    let kind = if approach == APPROACH_REWRITE {
        if read_only {
            "selectOne"
        } else if write_kinds.len() == 1 {
            match write_kinds[0].as_str() {
                "insert" => "insert",
                "delete" => "delete",
                _ => "update",
            }
        } else {
            "update"
        }
    } else {
        "call"
    };

    MapperMethod {
        name,
        kind: kind.to_string(),
        parameter_style: "dto".to_string(),
        return_style: "dto".to_string(),
    }
}

fn xml_template(
    approach: &str,
    read_only: bool,
    write_kinds: &[String],
    has_dynamic_sql: bool,
) -> XmlTemplate {
    let (statement_tag, skeleton) = if approach == APPROACH_CALL_SP_FIRST {
        (
            "select".to_string(),
            "CALLABLE template: {call proc_name(#{inParam,mode=IN},#{outParam,mode=OUT})}"
                .to_string(),
        )
    } else if read_only {
        ("select".to_string(), "SELECT <columns> FROM <table> WHERE <conditions>".to_string())
    } else {
        let tag = if write_kinds.len() == 1 {
            match write_kinds[0].as_str() {
                "insert" => "insert",
                "delete" => "delete",
                _ => "update",
            }
        } else {
            "update"
        };
        (tag.to_string(), "DML template: <statement> <table> <set/values> <where>".to_string())
    };

    XmlTemplate {
        statement_tag,
        skeleton,
        dynamic_tags: if has_dynamic_sql {
            vec!["if".to_string(), "choose".to_string(), "foreach".to_string()]
        } else {
            Vec::new()
        },
    }
}

fn camelize(value: &str) -> String {
    let mut cleaned = value
        .split('.')
        .next_back()
        .unwrap_or("")
        .replace(['[', ']'], "");
    for prefix in ["usp_", "ufn_", "fn_", "sp_", "trg_"] {
        if cleaned.to_ascii_lowercase().starts_with(prefix) {
            cleaned = cleaned[prefix.len()..].to_string();
            break;
        }
    }
    let normalized = cleaned.replace('-', "_");
    let parts: Vec<&str> = normalized.split('_').filter(|part| !part.is_empty()).collect();
    if parts.is_empty() {
        let mut chars = cleaned.chars();
        return match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => cleaned,
        };
    }
    parts
        .iter()
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

fn normalize_strategy_items(items: Vec<StrategyItem>) -> Vec<StrategyItem> {
    let mut unique: Vec<StrategyItem> = Vec::new();
    for item in items {
        if !unique.iter().any(|existing| existing.id == item.id) {
            unique.push(item);
        }
    }
    unique.sort_by(|a, b| a.id.cmp(&b.id));
    unique
}

fn normalize_reasons(reasons: Vec<StrategyReason>) -> Vec<StrategyReason> {
    let mut unique: Vec<StrategyReason> = Vec::new();
    for reason in reasons {
        if !unique.iter().any(|existing| existing.id == reason.id) {
            unique.push(reason);
        }
    }
    unique.sort_by(|a, b| b.weight.cmp(&a.weight).then_with(|| a.id.cmp(&b.id)));
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

fn apply_max_items(
    reasons: Vec<StrategyReason>,
    recommendations: Vec<Recommendation>,
    max_items: usize,
) -> (Vec<StrategyReason>, Vec<Recommendation>, Option<String>) {
    const MESSAGE: &str = "max_items_exceeded: truncated reasons and recommendations";
    if max_items == 0 {
        return (Vec::new(), Vec::new(), Some(MESSAGE.to_string()));
    }
    if reasons.len() + recommendations.len() <= max_items {
        return (reasons, recommendations, None);
    }
    if reasons.len() >= max_items {
        let mut reasons = reasons;
        reasons.truncate(max_items);
        return (reasons, Vec::new(), Some(MESSAGE.to_string()));
    }
    let remaining = max_items - reasons.len();
    let mut recommendations = recommendations;
    recommendations.truncate(remaining);
    (reasons, recommendations, Some(MESSAGE.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_only_rewrite() {
        let report = recommend_mapping_strategy(
            "dbo.usp_GetUser",
            "procedure",
            "SELECT id FROM dbo.Users WHERE id = 1",
            "tsql",
            "rewrite",
            30,
        );
        assert_eq!(report.summary.approach, APPROACH_REWRITE);
        assert_eq!(report.summary.confidence, 0.85);
        assert_eq!(report.summary.difficulty, "low");
        assert_eq!(report.mybatis.mapper_method.kind, "selectOne");
        assert_eq!(report.mybatis.mapper_method.name, "selectGetUser");
        assert_eq!(report.strategy.migration_path, vec!["target_state"]);
    }

    #[test]
    fn test_cursor_forces_call_sp_first() {
        let sql = "DECLARE c CURSOR FOR SELECT 1;";
        let report =
            recommend_mapping_strategy("dbo.usp_Walk", "procedure", sql, "tsql", "rewrite", 30);
        assert_eq!(report.summary.approach, APPROACH_CALL_SP_FIRST);
        assert_eq!(report.summary.confidence, 0.85);
        assert_eq!(
            report.strategy.migration_path,
            vec!["intermediate_state", "target_state"]
        );
        assert!(
            report
                .strategy
                .recommended_patterns
                .iter()
                .any(|p| p.id == "PAT_CALLABLE_STATEMENT")
        );
        assert!(report.recommendations.iter().any(|r| r.id == "REC_REFRACTOR_LATER"));
    }

    #[test]
    fn test_target_style_call_sp_first_honored_unless_safe() {
        let safe = recommend_mapping_strategy(
            "usp",
            "procedure",
            "SELECT 1",
            "tsql",
            APPROACH_CALL_SP_FIRST,
            30,
        );
        assert_eq!(safe.summary.approach, APPROACH_REWRITE);

        let risky = recommend_mapping_strategy(
            "usp",
            "procedure",
            "EXEC(@dyn)",
            "tsql",
            APPROACH_CALL_SP_FIRST,
            30,
        );
        assert_eq!(risky.summary.approach, APPROACH_CALL_SP_FIRST);
    }

    #[test]
    fn test_simple_single_write_confidence() {
        let report = recommend_mapping_strategy(
            "usp",
            "procedure",
            "INSERT INTO dbo.T (id) VALUES (1)",
            "tsql",
            "rewrite",
            30,
        );
        assert_eq!(report.summary.approach, APPROACH_REWRITE);
        assert_eq!(report.summary.confidence, 0.75);
        assert_eq!(report.mybatis.mapper_method.kind, "insert");
        assert_eq!(report.mybatis.xml_template.statement_tag, "insert");
    }

    #[test]
    fn test_dynamic_tags_when_dynamic_sql() {
        let sql = "EXEC(@dyn); SELECT 1;";
        let report = recommend_mapping_strategy("usp", "procedure", sql, "tsql", "rewrite", 30);
        assert_eq!(report.mybatis.xml_template.dynamic_tags, vec!["if", "choose", "foreach"]);
    }

    #[test]
    fn test_camelize_strips_known_prefixes() {
        assert_eq!(camelize("dbo.usp_get_user_info"), "GetUserInfo");
        assert_eq!(camelize("fn_Active"), "Active");
        assert_eq!(camelize("[dbo].[usp_Order-Sync]"), "OrderSync");
    }

    #[test]
    fn test_writes_kind_defaults_to_select() {
        let report =
            recommend_mapping_strategy("usp", "procedure", "SELECT 1", "tsql", "rewrite", 30);
        assert_eq!(report.signals.writes_kind, vec!["select"]);
    }
}
