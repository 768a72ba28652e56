//! Performance risk findings over a fixed catalog.
//!
//! Findings carry severity-specific points with per-severity caps; the
//! aggregate score adds a complexity bump and clamps to 0..100.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::analyzer::{
    analyze_control_flow, analyze_data_changes, analyze_migration_impacts, analyze_references,
    analyze_transactions,
};
use crate::services::reusability::{ObjectInfo, Recommendation};
use crate::services::safe_sql::{normalized_scan_text, strip_comments, summarize};
use crate::services::sql_parser;
use crate::utils::re;

pub const VERSION: &str = "4.1.0";

static LEADING_WILDCARD_LIKE: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bLIKE\s+N?'\s*%"));
static IN_LIST: Lazy<Regex> = Lazy::new(|| re(r"(?is)\bIN\s*\(([^)]*)\)"));
static SELECT_KEYWORD: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bSELECT\b"));
static CURSOR: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bCURSOR\b"));
static WHILE: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bWHILE\b"));
static DML_KEYWORD: Lazy<Regex> = Lazy::new(|| re(r"(?i)\b(INSERT|UPDATE|DELETE)\b"));
static SP_EXECUTESQL: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bSP_EXECUTESQL\b"));
static EXEC_VAR: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bEXEC(?:UTE)?\s*\(?\s*@\w+"));
static SELECT_INTO: Lazy<Regex> = Lazy::new(|| re(r"(?is)\bSELECT\b.*?\bINTO\b"));
static MERGE: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bMERGE\b"));
static SELECT_STAR: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bSELECT\s+(?:TOP\s+\d+\s+)?\*"));
static FUNCTION_ON_COLUMN: Lazy<Regex> =
    Lazy::new(|| re(r"(?is)\bWHERE\b.*?\b(UPPER|LOWER|CONVERT|CAST)\s*\("));
static IMPLICIT_CONVERSION: Lazy<Regex> =
    Lazy::new(|| re(r"(?is)\bWHERE\b.*?\b(CAST|CONVERT)\s*\([^)]*\)\s*[=<>]"));
static WHERE_SEGMENT: Lazy<Regex> =
    Lazy::new(|| re(r"(?is)\bWHERE\b(.*?)(?:\bGROUP\b|\bORDER\b|\bHAVING\b|\bUNION\b|;|$)"));
static OR_KEYWORD: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bOR\b"));
static SCALAR_UDF: Lazy<Regex> = Lazy::new(|| re(r"(?i)\b(?:\w+\.)?fn_[A-Za-z0-9_]+\s*\("));
static NOLOCK: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bNOLOCK\b"));
static TABLE_VARIABLE: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bDECLARE\s+@\w+\s+TABLE\b"));
static TEMP_TABLE: Lazy<Regex> = Lazy::new(|| re(r"##?\w+"));
static UPDATE_STATEMENT: Lazy<Regex> = Lazy::new(|| re(r"(?is)\bUPDATE\b.*?(?:;|$)"));
static DELETE_STATEMENT: Lazy<Regex> = Lazy::new(|| re(r"(?is)\bDELETE\b.*?(?:;|$)"));

const IN_LIST_THRESHOLD: usize = 20;
const OR_CHAIN_THRESHOLD: usize = 5;

const SEVERITY_ORDER: [&str; 4] = ["critical", "high", "medium", "low"];

fn severity_rank(severity: &str) -> usize {
    SEVERITY_ORDER
        .iter()
        .position(|candidate| *candidate == severity)
        .unwrap_or(SEVERITY_ORDER.len())
}

fn severity_points(severity: &str) -> i64 {
    match severity {
        "critical" => 30,
        "high" => 20,
        "medium" => 10,
        _ => 5,
    }
}

fn severity_cap(severity: &str) -> i64 {
    match severity {
        "critical" | "high" => 60,
        "medium" => 40,
        _ => 20,
    }
}

const RECOMMENDATION_MAP: &[(&str, &str, &str)] = &[
    (
        "PRF_SELECT_STAR",
        "REC_AVOID_SELECT_STAR",
        "Replace SELECT * with explicit columns to reduce I/O and improve plan stability.",
    ),
    (
        "PRF_LEADING_WILDCARD_LIKE",
        "REC_REWRITE_LIKE_PATTERN",
        "Avoid leading wildcards in LIKE patterns to keep predicates sargable.",
    ),
    (
        "PRF_FUNCTION_ON_COLUMN",
        "REC_MAKE_PREDICATES_SARGABLE",
        "Avoid wrapping columns in functions inside predicates to preserve index usage.",
    ),
    (
        "PRF_CURSOR_RBAR",
        "REC_REPLACE_CURSOR_SET_BASED",
        "Replace cursor logic with set-based operations for better performance.",
    ),
    (
        "PRF_NOLOCK",
        "REC_REVIEW_NOLOCK_USAGE",
        "Review NOLOCK usage to avoid dirty reads unless explicitly acceptable.",
    ),
    (
        "PRF_NO_WHERE_ON_UPDATE",
        "REC_ADD_UPDATE_WHERE",
        "Ensure UPDATE statements include appropriate predicates to avoid full-table writes.",
    ),
    (
        "PRF_NO_WHERE_ON_DELETE",
        "REC_ADD_DELETE_WHERE",
        "Ensure DELETE statements include appropriate predicates to avoid full-table deletes.",
    ),
    (
        "PRF_POSSIBLE_NO_WHERE_UPDATE",
        "REC_REVIEW_UPDATE_PREDICATE",
        "Review UPDATE predicates to confirm the scope is intentional.",
    ),
    (
        "PRF_POSSIBLE_NO_WHERE_DELETE",
        "REC_REVIEW_DELETE_PREDICATE",
        "Review DELETE predicates to confirm the scope is intentional.",
    ),
    (
        "PRF_DYNAMIC_SQL",
        "REC_PARAMETERIZE_DYNAMIC_SQL",
        "Prefer parameterized statements over dynamic SQL to improve plan reuse.",
    ),
    (
        "PRF_LOOP_RBAR",
        "REC_BATCH_SET_BASED",
        "Refactor row-by-row loops to set-based operations when possible.",
    ),
    (
        "PRF_SELECT_INTO",
        "REC_REVIEW_SELECT_INTO",
        "Consider alternatives to SELECT INTO to control logging and tempdb usage.",
    ),
    (
        "PRF_MERGE",
        "REC_REVIEW_MERGE",
        "Review MERGE usage for concurrency and plan stability considerations.",
    ),
    (
        "PRF_IMPLICIT_CONVERSION_HINT",
        "REC_AVOID_IMPLICIT_CONVERSION",
        "Align data types to avoid implicit conversions in predicates.",
    ),
    (
        "PRF_OR_CHAIN",
        "REC_SIMPLIFY_OR_CHAINS",
        "Simplify large OR chains or consider alternative predicate strategies.",
    ),
    (
        "PRF_IN_LIST_LARGE",
        "REC_REVIEW_LARGE_IN_LIST",
        "Consider temp tables or table-valued parameters for large IN lists.",
    ),
    (
        "PRF_SCALAR_UDF",
        "REC_REWRITE_SCALAR_UDF",
        "Review scalar UDF usage and consider inline alternatives.",
    ),
    (
        "PRF_TABLE_VARIABLE",
        "REC_REVIEW_TABLE_VARIABLE",
        "Review table variable usage for cardinality estimation impacts.",
    ),
    (
        "PRF_TEMP_TABLE",
        "REC_REVIEW_TEMP_TABLE",
        "Review temp table usage to avoid unnecessary tempdb pressure.",
    ),
    (
        "PRF_ORDER_BY_NO_TOP",
        "REC_REVIEW_ORDER_BY",
        "Review ORDER BY usage when no TOP/OFFSET is present.",
    ),
];

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Finding {
    pub id: String,
    pub severity: String,
    pub title: String,
    pub markers: Vec<String>,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RiskSummary {
    pub risk_score: i64,
    pub risk_level: String,
    pub finding_count: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RiskSignals {
    pub table_count: usize,
    pub has_writes: bool,
    pub uses_transaction: bool,
    pub cyclomatic_complexity: usize,
    pub has_cursor: bool,
    pub has_dynamic_sql: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PerformanceRiskReport {
    pub version: String,
    pub object: ObjectInfo,
    pub summary: RiskSummary,
    pub signals: RiskSignals,
    pub findings: Vec<Finding>,
    pub recommendations: Vec<Recommendation>,
    pub errors: Vec<String>,
}

#[allow(clippy::too_many_lines)]
pub fn analyze_performance_risk(
    name: &str,
    object_type: &str,
    sql: &str,
    dialect: &str,
    max_findings: usize,
) -> PerformanceRiskReport {
    let summary = summarize(sql);
    tracing::info!(
        sql_len = summary.len,
        sql_hash = %summary.sha256_8,
        "analyze_performance_risk"
    );

    // String-content detectors run before masking; everything else runs on
    // masked, whitespace-normalized text.
    let stripped = strip_comments(sql);
    let wildcard_like = LEADING_WILDCARD_LIKE.is_match(&stripped);
    let large_in_list = detect_large_in_list(&stripped);
    let scan = normalized_scan_text(sql);

    let mut findings: Vec<Finding> = Vec::new();
    let mut errors: Vec<String> = Vec::new();

    let add = |findings: &mut Vec<Finding>,
                   id: &str,
                   severity: &str,
                   title: &str,
                   markers: &[&str],
                   recommendation: &str| {
        if findings.iter().any(|finding| finding.id == id) {
            return;
        }
        findings.push(Finding {
            id: id.to_string(),
            severity: severity.to_string(),
            title: title.to_string(),
            markers: markers.iter().map(|m| m.to_string()).collect(),
            recommendation: recommendation.to_string(),
        });
    };

    if CURSOR.is_match(&scan) {
        add(
            &mut findings,
            "PRF_CURSOR_RBAR",
            "critical",
            "Cursor usage detected",
            &["CURSOR"],
            "Rewrite cursor logic to set-based operations where possible.",
        );
    }

    if has_loop_dml(&scan) {
        add(
            &mut findings,
            "PRF_LOOP_RBAR",
            "high",
            "Row-by-row loop with DML detected",
            &["WHILE", "DML_IN_LOOP"],
            "Refactor WHILE loops that perform DML into set-based operations.",
        );
    }

    if SP_EXECUTESQL.is_match(&scan) || EXEC_VAR.is_match(&scan) {
        add(
            &mut findings,
            "PRF_DYNAMIC_SQL",
            "high",
            "Dynamic SQL detected",
            &["SP_EXECUTESQL", "EXEC(@)"],
            "Prefer parameterized statements over dynamic SQL for plan stability.",
        );
    }

    match detect_missing_where(sql, &scan, dialect, WriteKind::Update, &mut errors) {
        WhereStatus::Missing => add(
            &mut findings,
            "PRF_NO_WHERE_ON_UPDATE",
            "high",
            "UPDATE without WHERE detected",
            &["UPDATE", "NO_WHERE"],
            "Ensure write statements have appropriate predicates to avoid full-table operations.",
        ),
        WhereStatus::Possible => add(
            &mut findings,
            "PRF_POSSIBLE_NO_WHERE_UPDATE",
            "medium",
            "Possible UPDATE without WHERE detected",
            &["UPDATE", "POSSIBLE_NO_WHERE"],
            "Review UPDATE statements to confirm predicates are present.",
        ),
        WhereStatus::Present => {}
    }

    match detect_missing_where(sql, &scan, dialect, WriteKind::Delete, &mut errors) {
        WhereStatus::Missing => add(
            &mut findings,
            "PRF_NO_WHERE_ON_DELETE",
            "high",
            "DELETE without WHERE detected",
            &["DELETE", "NO_WHERE"],
            "Ensure write statements have appropriate predicates to avoid full-table operations.",
        ),
        WhereStatus::Possible => add(
            &mut findings,
            "PRF_POSSIBLE_NO_WHERE_DELETE",
            "medium",
            "Possible DELETE without WHERE detected",
            &["DELETE", "POSSIBLE_NO_WHERE"],
            "Review DELETE statements to confirm predicates are present.",
        ),
        WhereStatus::Present => {}
    }

    if SELECT_INTO.is_match(&scan) {
        add(
            &mut findings,
            "PRF_SELECT_INTO",
            "high",
            "SELECT INTO detected",
            &["SELECT", "INTO"],
            "Review SELECT INTO usage to avoid unexpected logging or tempdb pressure.",
        );
    }

    if MERGE.is_match(&scan) {
        add(
            &mut findings,
            "PRF_MERGE",
            "high",
            "MERGE statement detected",
            &["MERGE"],
            "Review MERGE usage for concurrency and plan stability impacts.",
        );
    }

    if SELECT_STAR.is_match(&scan) {
        add(
            &mut findings,
            "PRF_SELECT_STAR",
            "medium",
            "SELECT * usage detected",
            &["SELECT", "*"],
            "Replace SELECT * with explicit columns to reduce I/O and improve plan stability.",
        );
    }

    if wildcard_like {
        add(
            &mut findings,
            "PRF_LEADING_WILDCARD_LIKE",
            "medium",
            "Leading wildcard LIKE detected",
            &["LIKE", "LEADING_WILDCARD"],
            "Avoid leading wildcards in LIKE patterns to keep predicates sargable.",
        );
    }

    if FUNCTION_ON_COLUMN.is_match(&scan) {
        add(
            &mut findings,
            "PRF_FUNCTION_ON_COLUMN",
            "medium",
            "Function applied to predicate column detected",
            &["FUNCTION_ON_PREDICATE"],
            "Avoid wrapping columns in functions inside predicates to preserve index usage.",
        );
    }

    if IMPLICIT_CONVERSION.is_match(&scan) {
        add(
            &mut findings,
            "PRF_IMPLICIT_CONVERSION_HINT",
            "medium",
            "Possible implicit conversion detected",
            &["IMPLICIT_CONVERSION_RISK"],
            "Align data types to avoid implicit conversions in predicates.",
        );
    }

    if detect_or_chain(&scan) {
        add(
            &mut findings,
            "PRF_OR_CHAIN",
            "medium",
            "Long OR chain in WHERE detected",
            &["MANY_OR"],
            "Simplify large OR chains or consider alternative predicate strategies.",
        );
    }

    if large_in_list {
        add(
            &mut findings,
            "PRF_IN_LIST_LARGE",
            "medium",
            "Large IN list detected",
            &["LARGE_IN_LIST"],
            "Consider temp tables or table-valued parameters for large IN lists.",
        );
    }

    if SCALAR_UDF.is_match(&scan) {
        add(
            &mut findings,
            "PRF_SCALAR_UDF",
            "medium",
            "Scalar UDF call detected",
            &["SCALAR_UDF_CALL"],
            "Review scalar UDF usage and consider inline alternatives.",
        );
    }

    if NOLOCK.is_match(&scan) {
        add(
            &mut findings,
            "PRF_NOLOCK",
            "low",
            "NOLOCK hint detected",
            &["NOLOCK"],
            "Review NOLOCK usage to avoid dirty reads unless explicitly acceptable.",
        );
    }

    if TABLE_VARIABLE.is_match(&scan) {
        add(
            &mut findings,
            "PRF_TABLE_VARIABLE",
            "low",
            "Table variable usage detected",
            &["TABLE_VARIABLE"],
            "Review table variable usage for cardinality estimation impacts.",
        );
    }

    if TEMP_TABLE.is_match(&scan) {
        add(
            &mut findings,
            "PRF_TEMP_TABLE",
            "low",
            "Temporary table usage detected",
            &["TEMP_TABLE"],
            "Review temp table usage to avoid unnecessary tempdb pressure.",
        );
    }

    if detect_order_by_no_top(&scan) {
        add(
            &mut findings,
            "PRF_ORDER_BY_NO_TOP",
            "low",
            "ORDER BY without TOP/OFFSET detected",
            &["ORDER_BY"],
            "Review ORDER BY usage when no TOP/OFFSET is present.",
        );
    }

    findings.sort_by(|a, b| {
        severity_rank(&a.severity)
            .cmp(&severity_rank(&b.severity))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut truncated = false;
    if findings.len() > max_findings {
        findings.truncate(max_findings);
        truncated = true;
        errors.push(format!("findings_truncated: max_findings={max_findings}"));
    }

    let signals = build_signals(sql, dialect);
    let recommendations = build_recommendations(&findings);
    let risk_score = risk_score(&findings, signals.cyclomatic_complexity);

    PerformanceRiskReport {
        version: VERSION.to_string(),
        object: ObjectInfo { name: name.to_string(), object_type: object_type.to_string() },
        summary: RiskSummary {
            risk_score,
            risk_level: risk_level(risk_score),
            finding_count: findings.len(),
            truncated,
        },
        signals,
        findings,
        recommendations,
        errors,
    }
}

#[derive(Debug, Clone, Copy)]
enum WriteKind {
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WhereStatus {
    Present,
    Possible,
    Missing,
}

fn detect_missing_where(
    sql: &str,
    scan: &str,
    dialect: &str,
    kind: WriteKind,
    errors: &mut Vec<String>,
) -> WhereStatus {
    match sql_parser::parse_statements(sql, dialect) {
        Ok(statements) => {
            let ast = sql_parser::scan(&statements);
            let missing = match kind {
                WriteKind::Update => ast.update_missing_where,
                WriteKind::Delete => ast.delete_missing_where,
            };
            if missing { WhereStatus::Missing } else { WhereStatus::Present }
        }
        Err(parse_error) => {
            if !errors.contains(&parse_error) {
                errors.push(parse_error);
            }
            let pattern = match kind {
                WriteKind::Update => &UPDATE_STATEMENT,
                WriteKind::Delete => &DELETE_STATEMENT,
            };
            for statement in pattern.find_iter(scan) {
                if !statement.as_str().to_ascii_uppercase().contains(" WHERE ") {
                    return WhereStatus::Possible;
                }
            }
            WhereStatus::Present
        }
    }
}

fn detect_large_in_list(stripped: &str) -> bool {
    for captures in IN_LIST.captures_iter(stripped) {
        let content = &captures[1];
        if SELECT_KEYWORD.is_match(content) {
            continue;
        }
        let items = content
            .split(',')
            .filter(|item| !item.trim().is_empty())
            .count();
        if items >= IN_LIST_THRESHOLD {
            return true;
        }
    }
    false
}

fn has_loop_dml(scan: &str) -> bool {
    for hit in WHILE.find_iter(scan) {
        let window_end = (hit.end() + 300).min(scan.len());
        // Clamp to a char boundary so the window slice stays valid.
        let mut end = window_end;
        while !scan.is_char_boundary(end) {
            end -= 1;
        }
        if DML_KEYWORD.is_match(&scan[hit.end()..end]) {
            return true;
        }
    }
    false
}

fn detect_or_chain(scan: &str) -> bool {
    for captures in WHERE_SEGMENT.captures_iter(scan) {
        if OR_KEYWORD.find_iter(&captures[1]).count() >= OR_CHAIN_THRESHOLD {
            return true;
        }
    }
    false
}

fn detect_order_by_no_top(scan: &str) -> bool {
    for statement in scan.split(';') {
        let upper = statement.to_ascii_uppercase();
        if upper.contains("ORDER BY")
            && !upper.contains(" TOP ")
            && !upper.contains(" OFFSET ")
            && !upper.contains(" FETCH ")
        {
            return true;
        }
    }
    false
}

fn build_signals(sql: &str, dialect: &str) -> RiskSignals {
    let references = analyze_references(sql, dialect);
    let transactions = analyze_transactions(sql);
    let control_flow = analyze_control_flow(sql, dialect);
    let data_changes = analyze_data_changes(sql, dialect);
    let impacts = analyze_migration_impacts(sql);

    RiskSignals {
        table_count: references.references.tables.len(),
        has_writes: data_changes.data_changes.has_writes,
        uses_transaction: transactions.uses_transaction,
        cyclomatic_complexity: control_flow.control_flow.summary.cyclomatic_complexity,
        has_cursor: impacts.has("IMP_CURSOR"),
        has_dynamic_sql: impacts.has("IMP_DYN_SQL"),
    }
}

fn build_recommendations(findings: &[Finding]) -> Vec<Recommendation> {
    let mut recommendations: Vec<Recommendation> = Vec::new();
    for finding in findings {
        if let Some((_, rec_id, message)) = RECOMMENDATION_MAP
            .iter()
            .find(|(finding_id, _, _)| *finding_id == finding.id)
            && !recommendations.iter().any(|existing| existing.id == *rec_id)
        {
            recommendations.push(Recommendation {
                id: rec_id.to_string(),
                message: message.to_string(),
            });
        }
    }
    recommendations.sort_by(|a, b| a.id.cmp(&b.id));
    recommendations
}

fn risk_score(findings: &[Finding], cyclomatic_complexity: usize) -> i64 {
    let mut score = 0i64;
    for severity in SEVERITY_ORDER {
        let count = findings
            .iter()
            .filter(|finding| finding.severity == severity)
            .count() as i64;
        score += (count * severity_points(severity)).min(severity_cap(severity));
    }
    if cyclomatic_complexity > 8 {
        score += 5;
    }
    score.clamp(0, 100)
}

fn risk_level(score: i64) -> String {
    if score >= 75 {
        "critical".to_string()
    } else if score >= 50 {
        "high".to_string()
    } else if score >= 25 {
        "medium".to_string()
    } else {
        "low".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(sql: &str) -> PerformanceRiskReport {
        analyze_performance_risk("dbo.usp_Test", "procedure", sql, "tsql", 50)
    }

    #[test]
    fn test_clean_query_has_no_findings() {
        let report = run("SELECT id, name FROM dbo.Users WHERE id = 1");
        assert!(report.findings.is_empty());
        assert_eq!(report.summary.risk_score, 0);
        assert_eq!(report.summary.risk_level, "low");
    }

    #[test]
    fn test_antipattern_combo() {
        let report = run("SELECT * FROM dbo.Customers WITH (NOLOCK) WHERE UPPER(name) LIKE '%x'");
        let ids: Vec<_> = report.findings.iter().map(|f| f.id.as_str()).collect();
        for id in [
            "PRF_SELECT_STAR",
            "PRF_LEADING_WILDCARD_LIKE",
            "PRF_FUNCTION_ON_COLUMN",
            "PRF_NOLOCK",
        ] {
            assert!(ids.contains(&id), "missing {id}");
        }
        assert!(matches!(
            report.summary.risk_level.as_str(),
            "medium" | "high" | "critical"
        ));
    }

    #[test]
    fn test_cursor_is_critical() {
        let report = run("DECLARE c CURSOR FOR SELECT 1");
        assert_eq!(report.findings[0].id, "PRF_CURSOR_RBAR");
        assert_eq!(report.findings[0].severity, "critical");
        assert!(report.summary.risk_score >= 30);
    }

    #[test]
    fn test_findings_sorted_by_severity_then_id() {
        let report = run("DECLARE c CURSOR FOR SELECT 1; SELECT * FROM dbo.T WITH (NOLOCK);");
        let ranks: Vec<_> = report
            .findings
            .iter()
            .map(|f| severity_rank(&f.severity))
            .collect();
        let mut sorted = ranks.clone();
        sorted.sort_unstable();
        assert_eq!(ranks, sorted);
    }

    #[test]
    fn test_update_without_where_via_ast() {
        let report = run("UPDATE dbo.Users SET active = 0");
        assert!(report.findings.iter().any(|f| f.id == "PRF_NO_WHERE_ON_UPDATE"));
    }

    #[test]
    fn test_update_without_where_fallback_is_possible() {
        // The IF wrapper defeats the structural parse, so the regex fallback
        // downgrades the finding to the "possible" variant.
        let report = run("IF @run = 1 UPDATE dbo.Users SET active = 0");
        assert!(
            report
                .findings
                .iter()
                .any(|f| f.id == "PRF_POSSIBLE_NO_WHERE_UPDATE")
        );
    }

    #[test]
    fn test_large_in_list_without_subquery() {
        let values: Vec<String> = (1..=25).map(|n| n.to_string()).collect();
        let sql = format!("SELECT id FROM dbo.T WHERE id IN ({})", values.join(", "));
        let report = run(&sql);
        assert!(report.findings.iter().any(|f| f.id == "PRF_IN_LIST_LARGE"));

        let subquery = "SELECT id FROM dbo.T WHERE id IN (SELECT id FROM dbo.U)";
        let report = run(subquery);
        assert!(!report.findings.iter().any(|f| f.id == "PRF_IN_LIST_LARGE"));
    }

    #[test]
    fn test_severity_caps_bound_score() {
        // Four high findings would be 80 points uncapped; the high cap is 60.
        let sql = "
            WHILE @i < 10 INSERT INTO dbo.T (id) VALUES (1);
            EXEC(@dyn);
            MERGE INTO dbo.Target AS t USING dbo.S AS s ON t.id = s.id WHEN MATCHED THEN UPDATE SET t.x = s.x;
            SELECT a INTO dbo.Copy FROM dbo.Src;
        ";
        let report = run(sql);
        let high_count = report
            .findings
            .iter()
            .filter(|f| f.severity == "high")
            .count();
        assert!(high_count >= 4);
        assert!(report.summary.risk_score <= 100);
    }

    #[test]
    fn test_recommendations_deduplicated_sorted() {
        let report = run("SELECT * FROM dbo.A; SELECT * FROM dbo.B;");
        let star_recs: Vec<_> = report
            .recommendations
            .iter()
            .filter(|r| r.id == "REC_AVOID_SELECT_STAR")
            .collect();
        assert_eq!(star_recs.len(), 1);
        let ids: Vec<_> = report.recommendations.iter().map(|r| r.id.clone()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_order_by_without_top() {
        let report = run("SELECT id FROM dbo.T ORDER BY id");
        assert!(report.findings.iter().any(|f| f.id == "PRF_ORDER_BY_NO_TOP"));

        let report = run("SELECT TOP 10 id FROM dbo.T ORDER BY id");
        assert!(!report.findings.iter().any(|f| f.id == "PRF_ORDER_BY_NO_TOP"));
    }
}
