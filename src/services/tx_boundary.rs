//! Transaction boundary recommendation for Java migration.
//!
//! Read-only logic avoids transactions, writes default to a service-layer
//! boundary, and SQL-managed transactions get hybrid guidance that avoids
//! double-transactioning.

use serde::Serialize;
use utoipa::ToSchema;

use crate::services::analyzer::{
    ErrorHandling, analyze_control_flow, analyze_data_changes, analyze_error_handling,
    analyze_migration_impacts, analyze_transactions,
};
use crate::services::reusability::ObjectInfo;
use crate::services::safe_sql::summarize;
use crate::utils::sorted_unique;

pub const VERSION: &str = "3.2.0";

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GuidanceItem {
    pub id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TxBoundarySummary {
    pub recommended_boundary: String,
    pub transactional: bool,
    pub propagation: String,
    pub isolation_level: Option<String>,
    pub read_only: bool,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TxBoundarySignals {
    pub has_writes: bool,
    pub write_ops: Vec<String>,
    pub uses_transaction_in_sql: bool,
    pub begin_count: usize,
    pub commit_count: usize,
    pub rollback_count: usize,
    pub has_try_catch: bool,
    pub xact_abort: Option<String>,
    pub isolation_level_in_sql: Option<String>,
    pub has_dynamic_sql: bool,
    pub has_cursor: bool,
    pub uses_temp_objects: bool,
    pub cyclomatic_complexity: usize,
    pub error_signaling: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JavaSnippets {
    pub annotation_example: String,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TxBoundaryReport {
    pub version: String,
    pub object: ObjectInfo,
    pub summary: TxBoundarySummary,
    pub signals: TxBoundarySignals,
    pub suggestions: Vec<GuidanceItem>,
    pub anti_patterns: Vec<GuidanceItem>,
    pub java_snippets: JavaSnippets,
    pub errors: Vec<String>,
}

#[allow(clippy::too_many_lines)]
pub fn recommend_transaction_boundary(
    name: &str,
    object_type: &str,
    sql: &str,
    dialect: &str,
    max_items: usize,
) -> TxBoundaryReport {
    let summary = summarize(sql);
    tracing::info!(
        sql_len = summary.len,
        sql_hash = %summary.sha256_8,
        "recommend_transaction_boundary"
    );

    let transactions = analyze_transactions(sql);
    let data_changes = analyze_data_changes(sql, dialect);
    let error_handling = analyze_error_handling(sql);
    let control_flow = analyze_control_flow(sql, dialect);
    let impacts = analyze_migration_impacts(sql);

    let changes = &data_changes.data_changes;
    let has_writes = changes.has_writes;
    let write_ops = changes.operations.write_ops();

    let uses_transaction_in_sql = transactions.uses_transaction
        || transactions.begin_count > 0
        || transactions.commit_count > 0
        || transactions.rollback_count > 0;

    let has_try_catch = transactions.has_try_catch || error_handling.has_try_catch;
    let complexity = control_flow.control_flow.summary.cyclomatic_complexity;

    let has_dynamic_sql = impacts.has("IMP_DYN_SQL");
    let has_cursor = impacts.has("IMP_CURSOR");
    let uses_temp_objects = impacts.has_any(&["IMP_TEMP_TABLE", "IMP_TABLE_VARIABLE"]);
    let error_signaling = error_signaling(&error_handling);

    let mut recommended_boundary = "service_layer".to_string();
    let mut transactional = true;
    let mut propagation = "REQUIRED".to_string();
    let mut read_only = false;
    let mut confidence: f64 = if has_writes { 0.75 } else { 0.85 };
    let mut summary_isolation = None;

    let mut suggestions: Vec<GuidanceItem> = Vec::new();
    let mut anti_patterns: Vec<GuidanceItem> = Vec::new();
    let mut notes: Vec<String> = Vec::new();

    let guidance = |items: &mut Vec<GuidanceItem>, id: &str, message: &str| {
        items.push(GuidanceItem { id: id.to_string(), message: message.to_string() });
    };

    if !has_writes {
        recommended_boundary = "none".to_string();
        transactional = false;
        propagation = "SUPPORTS".to_string();
        read_only = true;
        guidance(
            &mut suggestions,
            "SUG_NO_TX_READONLY",
            "Do not open a transaction; keep method non-transactional.",
        );
        guidance(
            &mut suggestions,
            "SUG_OPTIONAL_READONLY_TX",
            "Optionally use @Transactional(readOnly = true) if your platform benefits from it.",
        );
        notes.push("Read-only access can omit @Transactional by default.".to_string());
    } else if !uses_transaction_in_sql {
        guidance(
            &mut suggestions,
            "SUG_SERVICE_TX_REQUIRED",
            "@Transactional(REQUIRED) over the service method.",
        );
        notes.push("Keep transaction scope minimal but spanning consistent write set.".to_string());
    }

    if uses_transaction_in_sql && has_writes {
        recommended_boundary = "hybrid".to_string();
        let rollback_in_catch = has_try_catch && transactions.rollback_count > 0;
        propagation = if rollback_in_catch {
            "NOT_SUPPORTED".to_string()
        } else {
            "REQUIRES_NEW".to_string()
        };
        guidance(
            &mut suggestions,
            "SUG_AVOID_DOUBLE_TX",
            "Avoid wrapping SP-managed transactions with Java transactions initially.",
        );
        guidance(
            &mut suggestions,
            "SUG_USE_NOT_SUPPORTED",
            "Consider Propagation.NOT_SUPPORTED when calling SP that manages its own transaction.",
        );
        guidance(
            &mut anti_patterns,
            "ANTI_NESTED_TX",
            "Avoid nested/overlapping Java+TSQL transactions without clear ownership.",
        );
        notes.push("Favor SP-owned transaction scope until refactor is complete.".to_string());
    }

    if let Some(isolation_level) = &transactions.isolation_level {
        summary_isolation = Some(normalize_isolation_level(isolation_level));
        guidance(
            &mut suggestions,
            "SUG_MATCH_ISOLATION",
            "Match SQL isolation level in Spring or keep it in DB at first.",
        );
    }

    if transactions.xact_abort.as_deref() == Some("ON") {
        guidance(
            &mut suggestions,
            "SUG_XACT_ABORT_ALIGN",
            "Ensure thrown exceptions trigger rollback to align with XACT_ABORT.",
        );
    }

    if error_handling.uses_throw || error_handling.uses_raiserror {
        guidance(
            &mut suggestions,
            "SUG_ROLLBACK_ON_EXCEPTION",
            "Configure rollback on exceptions to mirror DB rollback behavior.",
        );
    }

    if complexity >= 12 || has_dynamic_sql || has_cursor || uses_temp_objects {
        guidance(
            &mut anti_patterns,
            "ANTI_PARTIAL_TX",
            "Do not split writes into separate transactions if atomicity is required.",
        );
        notes.push("Complex rewrites benefit from narrower, well-owned boundaries.".to_string());
    }

    if !error_signaling.is_empty() {
        guidance(
            &mut anti_patterns,
            "ANTI_SWALLOW_ERRORS",
            "Do not swallow RAISERROR/THROW; map to exceptions and rollback.",
        );
    }

    if complexity > 8 {
        confidence -= 0.05;
    }
    if has_dynamic_sql || has_cursor || uses_temp_objects {
        confidence -= 0.05;
    }
    if uses_transaction_in_sql {
        confidence -= 0.15;
    }
    let confidence = confidence.clamp(0.5, 0.9);

    let suggestions = normalize_guidance(suggestions);
    let anti_patterns = normalize_guidance(anti_patterns);
    let (suggestions, anti_patterns, notes, truncation_error) =
        apply_max_items(suggestions, anti_patterns, notes, max_items);

    let mut errors = Vec::new();
    if let Some(error) = truncation_error {
        errors.push(error);
    }

    let annotation_example = match recommended_boundary.as_str() {
        "service_layer" => "@Transactional(propagation = Propagation.REQUIRED)".to_string(),
        "hybrid" => "@Transactional(propagation = Propagation.NOT_SUPPORTED)".to_string(),
        _ => String::new(),
    };

    TxBoundaryReport {
        version: VERSION.to_string(),
        object: ObjectInfo { name: name.to_string(), object_type: object_type.to_string() },
        summary: TxBoundarySummary {
            recommended_boundary,
            transactional,
            propagation,
            isolation_level: summary_isolation,
            read_only,
            confidence,
        },
        signals: TxBoundarySignals {
            has_writes,
            write_ops,
            uses_transaction_in_sql,
            begin_count: transactions.begin_count,
            commit_count: transactions.commit_count,
            rollback_count: transactions.rollback_count,
            has_try_catch,
            xact_abort: transactions.xact_abort.clone(),
            isolation_level_in_sql: transactions.isolation_level.clone(),
            has_dynamic_sql,
            has_cursor,
            uses_temp_objects,
            cyclomatic_complexity: complexity,
            error_signaling,
        },
        suggestions,
        anti_patterns,
        java_snippets: JavaSnippets { annotation_example, notes },
        errors,
    }
}

pub(crate) fn error_signaling(error_handling: &ErrorHandling) -> Vec<String> {
    let mut signals = Vec::new();
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
    sorted_unique(signals)
}

fn normalize_isolation_level(value: &str) -> String {
    let normalized = value
        .to_ascii_uppercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    match normalized.as_str() {
        "READ UNCOMMITTED" => "READ_UNCOMMITTED".to_string(),
        "READ COMMITTED" => "READ_COMMITTED".to_string(),
        "REPEATABLE READ" => "REPEATABLE_READ".to_string(),
        "SNAPSHOT" => "SNAPSHOT".to_string(),
        "SERIALIZABLE" => "SERIALIZABLE".to_string(),
        other => other.replace(' ', "_"),
    }
}

fn normalize_guidance(items: Vec<GuidanceItem>) -> Vec<GuidanceItem> {
    let mut unique: Vec<GuidanceItem> = Vec::new();
    for item in items {
        if !unique.iter().any(|existing| existing.id == item.id) {
            unique.push(item);
        }
    }
    unique.sort_by(|a, b| a.id.cmp(&b.id));
    unique
}

fn apply_max_items(
    suggestions: Vec<GuidanceItem>,
    anti_patterns: Vec<GuidanceItem>,
    notes: Vec<String>,
    max_items: usize,
) -> (Vec<GuidanceItem>, Vec<GuidanceItem>, Vec<String>, Option<String>) {
    const MESSAGE: &str = "max_items_exceeded: truncated suggestions/anti_patterns/notes";
    if max_items == 0 {
        return (Vec::new(), Vec::new(), Vec::new(), Some(MESSAGE.to_string()));
    }
    if suggestions.len() + anti_patterns.len() + notes.len() <= max_items {
        return (suggestions, anti_patterns, notes, None);
    }

    let mut remaining = max_items;
    let mut suggestions = suggestions;
    suggestions.truncate(remaining);
    remaining -= suggestions.len();

    let mut anti_patterns = anti_patterns;
    anti_patterns.truncate(remaining);
    remaining -= anti_patterns.len();

    let mut notes = notes;
    notes.truncate(remaining);

    (suggestions, anti_patterns, notes, Some(MESSAGE.to_string()))
}
