//! Caller discovery: scan a corpus of SQL objects for calls to a target.

use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::services::safe_sql::{strip_comments_and_strings, summarize};
use crate::utils::{normalize_full_name, re, split_schema_and_base, unique_ordered};

pub const VERSION: &str = "2.1.0";

pub const MAX_OBJECTS: usize = 500;
pub const MAX_TOTAL_SQL_LENGTH: usize = 1_000_000;
const SIGNAL_LIMIT: usize = 10;

const QUALIFIED_NAME: &str =
    r"(?:\[[^\]]+\]|[A-Za-z_][\w$#]*)(?:\s*\.\s*(?:\[[^\]]+\]|[A-Za-z_][\w$#]*))*";

/// EXEC and function-call patterns compiled per request: the
/// `case_insensitive` option governs the keyword match itself, not just
/// identifier folding.
fn build_patterns(case_insensitive: bool) -> (Regex, Regex) {
    let flags = if case_insensitive { "(?i)" } else { "" };
    (
        re(&format!(r"{flags}\b(?P<kind>EXEC(?:UTE)?)\s+(?P<name>{QUALIFIED_NAME})")),
        re(&format!(r"{flags}\b(?P<name>{QUALIFIED_NAME})\s*\(")),
    )
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SqlObject {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    pub sql: String,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(default)]
pub struct CallerOptions {
    pub case_insensitive: bool,
    pub schema_sensitive: bool,
    pub include_self: bool,
}

impl Default for CallerOptions {
    fn default() -> Self {
        Self { case_insensitive: true, schema_sensitive: false, include_self: false }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CallersTarget {
    pub name: String,
    #[serde(rename = "type")]
    pub target_type: String,
    pub normalized: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CallersSummary {
    pub has_callers: bool,
    pub caller_count: usize,
    pub total_calls: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Caller {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    pub call_count: usize,
    pub call_kinds: Vec<String>,
    pub signals: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CallersReport {
    pub version: String,
    pub target: CallersTarget,
    pub summary: CallersSummary,
    pub callers: Vec<Caller>,
    pub errors: Vec<String>,
}

pub fn find_callers(
    target: &str,
    target_type: &str,
    objects: &[SqlObject],
    options: CallerOptions,
) -> CallersReport {
    let normalized_target = normalize_full_name(target, true);
    let comparison_target = normalize_full_name(target, options.case_insensitive);
    let (target_schema, target_name) = split_schema_and_base(target, options.case_insensitive);
    let mut errors: Vec<String> = Vec::new();

    let total_length: usize = objects.iter().map(|object| object.sql.len()).sum();
    tracing::info!(
        target = %normalized_target,
        objects = objects.len(),
        total_sql_len = total_length,
        "find_callers"
    );

    let objects_to_process = apply_limits(objects, total_length, &mut errors);
    let (exec_pattern, function_pattern) = build_patterns(options.case_insensitive);

    let mut callers: Vec<Caller> = Vec::new();
    for object in objects_to_process {
        if !options.include_self
            && normalize_full_name(&object.name, options.case_insensitive) == comparison_target
        {
            continue;
        }

        let cleaned = strip_comments_and_strings(&object.sql);
        let object_summary = summarize(&object.sql);
        tracing::info!(
            object = %object.name,
            sql_len = object_summary.len,
            sql_hash = %object_summary.sha256_8,
            "find_callers object"
        );

        let matches: Vec<(String, String)> = if target_type == "function" {
            find_function_calls(
                &cleaned,
                target_schema.as_deref(),
                &target_name,
                options,
                &function_pattern,
            )
        } else {
            find_exec_calls(
                &cleaned,
                target_schema.as_deref(),
                &target_name,
                options,
                &exec_pattern,
            )
        };
        if matches.is_empty() {
            continue;
        }

        let call_kinds = unique_ordered(matches.iter().map(|(kind, _)| kind.clone()));
        let mut signals = unique_ordered(matches.iter().map(|(_, signal)| signal.clone()));
        signals.truncate(SIGNAL_LIMIT);

        callers.push(Caller {
            name: object.name.clone(),
            object_type: object.object_type.clone(),
            call_count: matches.len(),
            call_kinds,
            signals,
        });
    }

    callers.sort_by(|a, b| {
        b.call_count
            .cmp(&a.call_count)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });

    let total_calls: usize = callers.iter().map(|caller| caller.call_count).sum();

    CallersReport {
        version: VERSION.to_string(),
        target: CallersTarget {
            name: target.to_string(),
            target_type: target_type.to_string(),
            normalized: normalized_target,
        },
        summary: CallersSummary {
            has_callers: total_calls > 0,
            caller_count: callers.len(),
            total_calls,
        },
        callers,
        errors,
    }
}

/// Infer a target type when the request omits one: parenthesized targets are
/// treated as functions.
pub fn infer_target_type(target: &str, target_type: Option<&str>) -> String {
    if let Some(target_type) = target_type {
        return target_type.to_ascii_lowercase();
    }
    if target.contains('(') { "function".to_string() } else { "procedure".to_string() }
}

fn apply_limits<'a>(
    objects: &'a [SqlObject],
    total_length: usize,
    errors: &mut Vec<String>,
) -> &'a [SqlObject] {
    let mut limit = objects.len().min(MAX_OBJECTS);
    if objects.len() > MAX_OBJECTS {
        errors.push(format!(
            "object_limit_exceeded: max={MAX_OBJECTS} provided={} processed={limit}",
            objects.len()
        ));
    }
    if total_length > MAX_TOTAL_SQL_LENGTH {
        errors.push(format!(
            "sql_limit_exceeded: max_total_len={MAX_TOTAL_SQL_LENGTH} provided={total_length}"
        ));
    }

    let mut running = 0usize;
    let mut kept = 0usize;
    for object in &objects[..limit] {
        if running + object.sql.len() > MAX_TOTAL_SQL_LENGTH {
            break;
        }
        running += object.sql.len();
        kept += 1;
    }
    if kept < limit && total_length <= MAX_TOTAL_SQL_LENGTH {
        errors.push(
            "sql_limit_exceeded: truncated_objects due to per-request SQL length cap".to_string(),
        );
    }
    limit = kept;
    &objects[..limit]
}

fn matches_target(
    candidate: &str,
    target_schema: Option<&str>,
    target_name: &str,
    options: CallerOptions,
) -> bool {
    let (schema, name) = split_schema_and_base(candidate, options.case_insensitive);
    if options.schema_sensitive && target_schema.is_some() {
        return schema.as_deref() == target_schema && name == target_name;
    }
    name == target_name
}

fn find_exec_calls(
    sql: &str,
    target_schema: Option<&str>,
    target_name: &str,
    options: CallerOptions,
    exec_pattern: &Regex,
) -> Vec<(String, String)> {
    exec_pattern
        .captures_iter(sql)
        .filter(|captures| matches_target(&captures["name"], target_schema, target_name, options))
        .map(|captures| {
            let kind = captures["kind"].to_ascii_lowercase();
            let signal = if kind == "execute" { "EXECUTE" } else { "EXEC" };
            (kind, signal.to_string())
        })
        .collect()
}

fn find_function_calls(
    sql: &str,
    target_schema: Option<&str>,
    target_name: &str,
    options: CallerOptions,
    function_pattern: &Regex,
) -> Vec<(String, String)> {
    function_pattern
        .captures_iter(sql)
        .filter(|captures| matches_target(&captures["name"], target_schema, target_name, options))
        .map(|_| ("function_call".to_string(), "FUNCTION".to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(name: &str, object_type: &str, sql: &str) -> SqlObject {
        SqlObject {
            name: name.to_string(),
            object_type: object_type.to_string(),
            sql: sql.to_string(),
        }
    }

    #[test]
    fn test_exec_caller_found() {
        let objects = vec![
            object("dbo.usp_A", "procedure", "EXEC dbo.usp_Target @x = 1"),
            object("dbo.usp_B", "procedure", "SELECT 1"),
        ];
        let report =
            find_callers("dbo.usp_Target", "procedure", &objects, CallerOptions::default());
        assert!(report.summary.has_callers);
        assert_eq!(report.summary.caller_count, 1);
        assert_eq!(report.callers[0].name, "dbo.usp_A");
        assert_eq!(report.callers[0].call_kinds, vec!["exec"]);
        assert_eq!(report.callers[0].signals, vec!["EXEC"]);
    }

    #[test]
    fn test_dynamic_exec_not_counted() {
        let objects = vec![object(
            "dbo.usp_A",
            "procedure",
            "EXEC(@usp_Target); EXEC('usp_Target');",
        )];
        let report =
            find_callers("dbo.usp_Target", "procedure", &objects, CallerOptions::default());
        assert!(!report.summary.has_callers);
    }

    #[test]
    fn test_function_caller_found() {
        let objects = vec![object(
            "dbo.usp_A",
            "procedure",
            "SELECT dbo.fn_Score(id) FROM dbo.T",
        )];
        let report = find_callers("dbo.fn_Score", "function", &objects, CallerOptions::default());
        assert_eq!(report.summary.caller_count, 1);
        assert_eq!(report.callers[0].call_kinds, vec!["function_call"]);
        assert_eq!(report.callers[0].signals, vec!["FUNCTION"]);
    }

    #[test]
    fn test_schema_insensitive_matches_base_name() {
        let objects = vec![object("dbo.usp_A", "procedure", "EXEC audit.usp_Target")];
        let report =
            find_callers("dbo.usp_Target", "procedure", &objects, CallerOptions::default());
        assert_eq!(report.summary.caller_count, 1);
    }

    #[test]
    fn test_schema_sensitive_requires_schema_match() {
        let objects = vec![object("dbo.usp_A", "procedure", "EXEC audit.usp_Target")];
        let options = CallerOptions { schema_sensitive: true, ..CallerOptions::default() };
        let report = find_callers("dbo.usp_Target", "procedure", &objects, options);
        assert_eq!(report.summary.caller_count, 0);
    }

    #[test]
    fn test_self_excluded_by_default() {
        let objects = vec![object("dbo.usp_Target", "procedure", "EXEC dbo.usp_Target")];
        let report =
            find_callers("dbo.usp_Target", "procedure", &objects, CallerOptions::default());
        assert_eq!(report.summary.caller_count, 0);

        let options = CallerOptions { include_self: true, ..CallerOptions::default() };
        let report = find_callers("dbo.usp_Target", "procedure", &objects, options);
        assert_eq!(report.summary.caller_count, 1);
    }

    #[test]
    fn test_sorted_by_call_count_then_name() {
        let objects = vec![
            object("dbo.usp_Z", "procedure", "EXEC dbo.usp_T; EXEC dbo.usp_T;"),
            object("dbo.usp_A", "procedure", "EXEC dbo.usp_T"),
            object("dbo.usp_B", "procedure", "EXEC dbo.usp_T"),
        ];
        let report = find_callers("dbo.usp_T", "procedure", &objects, CallerOptions::default());
        let names: Vec<_> = report.callers.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["dbo.usp_Z", "dbo.usp_A", "dbo.usp_B"]);
        assert_eq!(report.summary.total_calls, 4);
    }

    #[test]
    fn test_case_sensitive_requires_exact_exec_case() {
        let objects = vec![object("dbo.usp_A", "procedure", "exec dbo.usp_Target")];
        let options = CallerOptions { case_insensitive: false, ..CallerOptions::default() };
        let report = find_callers("dbo.usp_Target", "procedure", &objects, options);
        assert!(!report.summary.has_callers);

        let objects = vec![object("dbo.usp_A", "procedure", "EXEC dbo.usp_Target")];
        let report = find_callers("dbo.usp_Target", "procedure", &objects, options);
        assert_eq!(report.summary.caller_count, 1);
    }

    #[test]
    fn test_object_limit() {
        let objects: Vec<SqlObject> = (0..MAX_OBJECTS + 5)
            .map(|index| object(&format!("dbo.usp_{index}"), "procedure", "SELECT 1"))
            .collect();
        let report = find_callers("dbo.usp_T", "procedure", &objects, CallerOptions::default());
        assert!(
            report
                .errors
                .iter()
                .any(|e| e.starts_with("object_limit_exceeded"))
        );
    }

    #[test]
    fn test_sql_length_limit() {
        let big = "X".repeat(MAX_TOTAL_SQL_LENGTH + 1);
        let objects = vec![object("dbo.usp_Big", "procedure", &big)];
        let report = find_callers("dbo.usp_T", "procedure", &objects, CallerOptions::default());
        assert!(
            report
                .errors
                .iter()
                .any(|e| e.starts_with("sql_limit_exceeded"))
        );
    }

    #[test]
    fn test_calls_in_comments_ignored() {
        let objects = vec![object(
            "dbo.usp_A",
            "procedure",
            "-- EXEC dbo.usp_Target\nSELECT 1",
        )];
        let report =
            find_callers("dbo.usp_Target", "procedure", &objects, CallerOptions::default());
        assert!(!report.summary.has_callers);
    }

    #[test]
    fn test_infer_target_type() {
        assert_eq!(infer_target_type("dbo.usp_X", None), "procedure");
        assert_eq!(infer_target_type("dbo.fn_X()", None), "function");
        assert_eq!(infer_target_type("dbo.x", Some("FUNCTION")), "function");
    }
}
