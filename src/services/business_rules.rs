//! Business-rule pattern extraction: guard clauses, range checks, existence
//! checks, soft-delete/status filters, and CASE mappings, plus their
//! standard-template suggestions.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::reusability::ObjectInfo;
use crate::services::safe_sql::summarize;
use crate::utils::{re, sorted_unique};

pub const VERSION: &str = "2.3.0";

const MAX_SIGNAL_ITEMS: usize = 15;
const MAX_CONDITION_LENGTH: usize = 160;
const ACTION_WINDOW: usize = 220;

static STRING_LITERAL: Lazy<Regex> = Lazy::new(|| re(r"'(?:''|[^'])+'"));
static BLOCK_COMMENT: Lazy<Regex> = Lazy::new(|| re(r"(?s)/\*.*?\*/"));
static LINE_COMMENT: Lazy<Regex> = Lazy::new(|| re(r"(?m)--.*?$"));
static BRACKETS: Lazy<Regex> = Lazy::new(|| re(r"\[([^\]]+)\]"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| re(r"\s+"));

// Patterns with no alphabetic keyword are unaffected by the case option.
static EMPTY_COMPARE: Lazy<Regex> = Lazy::new(|| re(r"=\s*''"));
static RANGE_LITERAL: Lazy<Regex> = Lazy::new(|| re(r"@\w+\s*(<=|>=|<|>)\s*-?\d+(?:\.\d+)?"));
static RANGE_FUZZY: Lazy<Regex> = Lazy::new(|| re(r"@\w+\s*(<=|>=|<|>)\s*@"));
static NUMBER: Lazy<Regex> = Lazy::new(|| re(r"\b-?\d+(?:\.\d+)?\b"));
static MASKED_LITERAL: Lazy<Regex> = Lazy::new(|| re(r"'(?:''|[^'])*'"));
static SELECT_BODY: Lazy<Regex> = Lazy::new(|| re(r"(?is)\bSELECT\b.*"));

const SOFT_DELETE_PATTERNS: &[(&str, &str)] = &[
    (r"\bis_deleted\s*=\s*0", "is_deleted = ?"),
    (r"\bdeleted_yn\s*=\s*'\?'", "deleted_yn = ?"),
    (r"\bdel_yn\s*=\s*'\?'", "del_yn = ?"),
];
const STATUS_PATTERNS: &[(&str, &str)] = &[
    (r"\buse_yn\s*=\s*'\?'", "use_yn = ?"),
    (r"\bactive_yn\s*=\s*'\?'", "active_yn = ?"),
    (r"\bstatus\s*=\s*'\?'", "status = ?"),
];

const TEMPLATE_REGISTRY: &[(&str, &str)] = &[
    (
        "TPL_VALIDATE_REQUIRED_PARAM",
        "Null/empty guard + error signaling maps to required-parameter validation.",
    ),
    ("TPL_VALIDATE_RANGE", "Range check maps to parameter validation rules."),
    (
        "TPL_ENSURE_EXISTS",
        "Existence check with error/return signaling maps to ensure-exists behavior.",
    ),
    (
        "TPL_ENSURE_NOT_EXISTS",
        "Non-existence check with error/return signaling maps to ensure-not-exists behavior.",
    ),
    ("TPL_SOFT_DELETE_FILTER", "Soft-delete predicate maps to soft-delete filtering."),
    ("TPL_STATUS_FILTER", "Status predicate maps to status-based filtering."),
    ("TPL_CASE_TO_ENUM_MAPPING", "CASE mapping aligns with enum/flag translation."),
    ("TPL_ERROR_TO_EXCEPTION", "Error signaling maps to exception translation."),
];

/// Keyword detectors compiled per call so the `case_insensitive` option
/// genuinely toggles case-sensitive matching end to end.
struct RulePatterns {
    if_condition: Regex,
    is_null: Regex,
    len_zero: Regex,
    nullif_check: Regex,
    len_call: Regex,
    nullif_call: Regex,
    range_between: Regex,
    exists_call: Regex,
    not_exists: Regex,
    action_error: Regex,
    action_return_code: Regex,
    case_keyword: Regex,
    case_expr: Regex,
    status_expr: Regex,
}

fn case_flags(case_insensitive: bool) -> &'static str {
    if case_insensitive { "(?i)" } else { "" }
}

fn build_patterns(case_insensitive: bool) -> RulePatterns {
    let flags = case_flags(case_insensitive);
    RulePatterns {
        if_condition: re(&format!(
            r"{flags}\bIF\s+(?P<cond>.+?)(?P<term>\bBEGIN\b|\bTHROW\b|\bRAISERROR\b|\bRETURN\b|\bELSE\b)"
        )),
        is_null: re(&format!(r"{flags}\bIS\s+NULL\b")),
        len_zero: re(&format!(r"{flags}\bLEN\s*\(\s*@\w+\s*\)\s*=\s*0\b")),
        nullif_check: re(&format!(r"{flags}\bNULLIF\s*\(\s*@\w+\s*,\s*''\s*\)\s+IS\s+NULL\b")),
        len_call: re(&format!(r"{flags}\bLEN\s*\(")),
        nullif_call: re(&format!(r"{flags}\bNULLIF\s*\(")),
        range_between: re(&format!(
            r"{flags}@\w+\s+BETWEEN\s+-?\d+(?:\.\d+)?\s+AND\s+-?\d+(?:\.\d+)?"
        )),
        exists_call: re(&format!(r"{flags}\bEXISTS\s*\(")),
        not_exists: re(&format!(r"{flags}\bNOT\s+EXISTS\b")),
        action_error: re(&format!(r"{flags}\bTHROW\b|\bRAISERROR\b")),
        action_return_code: re(&format!(r"{flags}\bRETURN\s+-?\d+\b")),
        case_keyword: re(&format!(r"{flags}\bCASE\b")),
        case_expr: re(&format!(r"{flags}(?s)\bCASE\s+(?P<expr>.+?)\s+WHEN\b")),
        status_expr: re(&format!(r"{flags}\b(status|active|use_yn|del_yn)\b")),
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BusinessRule {
    pub id: String,
    pub kind: String,
    pub confidence: f64,
    pub condition: String,
    pub action: String,
    pub signals: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TemplateSuggestion {
    pub rule_id: String,
    pub template_id: String,
    pub confidence: f64,
    pub rationale: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BusinessRulesSummary {
    pub has_rules: bool,
    pub rule_count: usize,
    pub template_suggestion_count: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BusinessRulesReport {
    pub version: String,
    pub object: ObjectInfo,
    pub summary: BusinessRulesSummary,
    pub rules: Vec<BusinessRule>,
    pub template_suggestions: Vec<TemplateSuggestion>,
    pub signals: Vec<String>,
    pub errors: Vec<String>,
}

#[allow(clippy::too_many_lines)]
pub fn analyze_business_rules(
    name: &str,
    object_type: &str,
    sql: &str,
    dialect: &str,
    case_insensitive: bool,
    max_rules: usize,
    max_templates: usize,
) -> BusinessRulesReport {
    let summary = summarize(sql);
    tracing::info!(
        sql_len = summary.len,
        sql_hash = %summary.sha256_8,
        dialect = dialect,
        "analyze_business_rules"
    );

    let cleaned = preprocess(sql);
    let patterns = build_patterns(case_insensitive);
    let mut rules: Vec<BusinessRule> = Vec::new();
    let mut signals: Vec<String> = Vec::new();
    let mut counter = 0usize;

    for captures in patterns.if_condition.captures_iter(&cleaned) {
        let condition = captures["cond"].trim().to_string();
        let window_start = captures.name("term").expect("term group").start();
        let action = action_from_window(&patterns, &cleaned, window_start);
        let action_signal = action_signal(&action);
        let action_triggers = matches!(action.as_str(), "raise_error" | "return_code");

        if patterns.exists_call.is_match(&condition) {
            counter += 1;
            let not_exists = patterns.not_exists.is_match(&condition);
            let kind = if not_exists { "not_exists_check" } else { "exists_check" };
            let mut rule_signals = vec!["IF".to_string(), "EXISTS".to_string()];
            if not_exists {
                rule_signals.push("NOT".to_string());
            }
            if let Some(signal) = &action_signal {
                rule_signals.push(signal.clone());
            }
            rules.push(BusinessRule {
                id: rule_id(counter),
                kind: kind.to_string(),
                confidence: 0.8,
                condition: if not_exists {
                    "NOT EXISTS (SELECT …)".to_string()
                } else {
                    "EXISTS (SELECT …)".to_string()
                },
                action,
                signals: rule_signals.clone(),
            });
            signals.extend(rule_signals);
            continue;
        }

        if is_guard_condition(&patterns, &condition) {
            counter += 1;
            let mut guard = guard_signals(&patterns, &condition);
            if let Some(signal) = &action_signal {
                guard.push(signal.clone());
            }
            rules.push(BusinessRule {
                id: rule_id(counter),
                kind: "guard_clause".to_string(),
                confidence: if action_triggers { 0.85 } else { 0.65 },
                condition: sanitize_condition(&condition),
                action,
                signals: guard.clone(),
            });
            signals.extend(guard);
            continue;
        }

        if let Some(clarity) = range_condition(&patterns, &condition) {
            counter += 1;
            let mut range_signals = vec!["IF".to_string(), "RANGE".to_string()];
            if let Some(signal) = &action_signal {
                range_signals.push(signal.clone());
            }
            rules.push(BusinessRule {
                id: rule_id(counter),
                kind: "range_check".to_string(),
                confidence: if clarity == "clear" { 0.75 } else { 0.6 },
                condition: sanitize_condition(&condition),
                action,
                signals: range_signals.clone(),
            });
            signals.extend(range_signals);
        }
    }

    counter = detect_predicate_rules(
        &cleaned,
        counter,
        SOFT_DELETE_PATTERNS,
        "soft_delete_filter",
        case_insensitive,
        &mut rules,
        &mut signals,
    );
    counter = detect_predicate_rules(
        &cleaned,
        counter,
        STATUS_PATTERNS,
        "status_filter",
        case_insensitive,
        &mut rules,
        &mut signals,
    );
    detect_case_mappings(&cleaned, counter, &patterns, &mut rules, &mut signals);

    let mut errors: Vec<String> = Vec::new();
    let mut truncated = false;

    rules.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    if rules.len() > max_rules {
        rules.truncate(max_rules);
        truncated = true;
        errors.push("Rule list truncated to max_rules limit.".to_string());
    }

    let mut template_suggestions = map_templates(&rules);
    template_suggestions.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.rule_id.cmp(&b.rule_id))
            .then_with(|| a.template_id.cmp(&b.template_id))
    });
    if template_suggestions.len() > max_templates {
        template_suggestions.truncate(max_templates);
        truncated = true;
        errors.push("Template suggestions truncated to max_templates limit.".to_string());
    }

    let mut signal_list = sorted_unique(signals);
    signal_list.truncate(MAX_SIGNAL_ITEMS);

    BusinessRulesReport {
        version: VERSION.to_string(),
        object: ObjectInfo { name: name.to_string(), object_type: object_type.to_string() },
        summary: BusinessRulesSummary {
            has_rules: !rules.is_empty(),
            rule_count: rules.len(),
            template_suggestion_count: template_suggestions.len(),
            truncated,
        },
        rules,
        template_suggestions,
        signals: signal_list,
        errors,
    }
}

/// Literals masked to `'?'` (empty strings kept), comments blanked, brackets
/// stripped, whitespace collapsed.
fn preprocess(sql: &str) -> String {
    let masked = STRING_LITERAL.replace_all(sql, "'?'");
    let without_block = BLOCK_COMMENT.replace_all(&masked, " ");
    let without_line = LINE_COMMENT.replace_all(&without_block, " ");
    let unbracketed = BRACKETS.replace_all(&without_line, "$1");
    WHITESPACE.replace_all(unbracketed.trim(), " ").into_owned()
}

fn is_guard_condition(patterns: &RulePatterns, condition: &str) -> bool {
    patterns.is_null.is_match(condition)
        || EMPTY_COMPARE.is_match(condition)
        || patterns.len_zero.is_match(condition)
        || patterns.nullif_check.is_match(condition)
}

fn guard_signals(patterns: &RulePatterns, condition: &str) -> Vec<String> {
    let mut signals = vec!["IF".to_string()];
    if patterns.is_null.is_match(condition) {
        signals.push("IS NULL".to_string());
    }
    if patterns.len_call.is_match(condition) {
        signals.push("LEN".to_string());
    }
    if patterns.nullif_call.is_match(condition) {
        signals.push("NULLIF".to_string());
    }
    if EMPTY_COMPARE.is_match(condition) {
        signals.push("EMPTY".to_string());
    }
    signals
}

fn range_condition(patterns: &RulePatterns, condition: &str) -> Option<&'static str> {
    if RANGE_LITERAL.is_match(condition) || patterns.range_between.is_match(condition) {
        return Some("clear");
    }
    if RANGE_FUZZY.is_match(condition) {
        return Some("fuzzy");
    }
    None
}

fn action_from_window(patterns: &RulePatterns, sql: &str, start: usize) -> String {
    let mut end = (start + ACTION_WINDOW).min(sql.len());
    while !sql.is_char_boundary(end) {
        end -= 1;
    }
    let window = &sql[start..end];
    if patterns.action_error.is_match(window) {
        return "raise_error".to_string();
    }
    if patterns.action_return_code.is_match(window) {
        return "return_code".to_string();
    }
    "branch".to_string()
}

fn action_signal(action: &str) -> Option<String> {
    match action {
        "raise_error" => Some("THROW".to_string()),
        "return_code" => Some("RETURN".to_string()),
        _ => None,
    }
}

fn sanitize_condition(condition: &str) -> String {
    let masked = MASKED_LITERAL.replace_all(condition, "'?'");
    let numberless = NUMBER.replace_all(&masked, "?");
    let trimmed = SELECT_BODY.replace(&numberless, "SELECT …");
    let collapsed = WHITESPACE.replace_all(trimmed.trim(), " ").into_owned();
    if collapsed.chars().count() > MAX_CONDITION_LENGTH {
        let mut shortened: String = collapsed
            .chars()
            .take(MAX_CONDITION_LENGTH - 1)
            .collect();
        shortened.push('…');
        return shortened;
    }
    collapsed
}

fn rule_id(counter: usize) -> String {
    format!("R{counter:03}")
}

fn detect_predicate_rules(
    sql: &str,
    counter: usize,
    patterns: &[(&str, &str)],
    kind: &str,
    case_insensitive: bool,
    rules: &mut Vec<BusinessRule>,
    signals: &mut Vec<String>,
) -> usize {
    let flags = case_flags(case_insensitive);
    let mut counter = counter;
    for (pattern, condition) in patterns {
        if re(&format!("{flags}{pattern}")).is_match(sql) {
            if rules
                .iter()
                .any(|rule| rule.kind == kind && rule.condition == *condition)
            {
                continue;
            }
            counter += 1;
            let rule_signals = vec!["FILTER".to_string(), "PREDICATE".to_string()];
            rules.push(BusinessRule {
                id: rule_id(counter),
                kind: kind.to_string(),
                confidence: 0.7,
                condition: condition.to_string(),
                action: "filter".to_string(),
                signals: rule_signals.clone(),
            });
            signals.extend(rule_signals);
        }
    }
    counter
}

fn detect_case_mappings(
    sql: &str,
    counter: usize,
    patterns: &RulePatterns,
    rules: &mut Vec<BusinessRule>,
    signals: &mut Vec<String>,
) {
    let mut counter = counter;
    for hit in patterns.case_keyword.find_iter(sql) {
        let mut end = (hit.start() + 120).min(sql.len());
        while !sql.is_char_boundary(end) {
            end -= 1;
        }
        let window = &sql[hit.start()..end];
        let expr = patterns
            .case_expr
            .captures(window)
            .map(|captures| captures["expr"].trim().to_string())
            .unwrap_or_default();
        let headline = if expr.is_empty() {
            "CASE mapping".to_string()
        } else {
            format!("CASE mapping on {expr}")
        };
        let confidence = if patterns.status_expr.is_match(&expr) { 0.75 } else { 0.65 };
        counter += 1;
        let rule_signals =
            vec!["CASE".to_string(), "WHEN".to_string(), "THEN".to_string()];
        rules.push(BusinessRule {
            id: rule_id(counter),
            kind: "case_mapping".to_string(),
            confidence,
            condition: sanitize_condition(&headline),
            action: "mapping".to_string(),
            signals: rule_signals.clone(),
        });
        signals.extend(rule_signals);
    }
}

fn map_templates(rules: &[BusinessRule]) -> Vec<TemplateSuggestion> {
    let rationale = |template_id: &str| {
        TEMPLATE_REGISTRY
            .iter()
            .find(|(id, _)| *id == template_id)
            .map(|(_, rationale)| rationale.to_string())
            .unwrap_or_default()
    };

    let mut suggestions = Vec::new();
    for rule in rules {
        if let Some(template_id) = primary_template(rule) {
            suggestions.push(TemplateSuggestion {
                rule_id: rule.id.clone(),
                template_id: template_id.to_string(),
                confidence: rule.confidence.clamp(0.75, 0.9),
                rationale: rationale(template_id),
            });
        }
        if rule.action == "raise_error" {
            suggestions.push(TemplateSuggestion {
                rule_id: rule.id.clone(),
                template_id: "TPL_ERROR_TO_EXCEPTION".to_string(),
                confidence: 0.6,
                rationale: rationale("TPL_ERROR_TO_EXCEPTION"),
            });
        }
    }
    suggestions
}

fn primary_template(rule: &BusinessRule) -> Option<&'static str> {
    let action_triggers = matches!(rule.action.as_str(), "raise_error" | "return_code");
    match rule.kind.as_str() {
        "guard_clause" => Some("TPL_VALIDATE_REQUIRED_PARAM"),
        "range_check" => Some("TPL_VALIDATE_RANGE"),
        "exists_check" if action_triggers => Some("TPL_ENSURE_EXISTS"),
        "not_exists_check" if action_triggers => Some("TPL_ENSURE_NOT_EXISTS"),
        "soft_delete_filter" => Some("TPL_SOFT_DELETE_FILTER"),
        "status_filter" => Some("TPL_STATUS_FILTER"),
        "case_mapping" => Some("TPL_CASE_TO_ENUM_MAPPING"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(sql: &str) -> BusinessRulesReport {
        analyze_business_rules("dbo.usp_Test", "procedure", sql, "tsql", true, 100, 150)
    }

    #[test]
    fn test_no_rules() {
        let report = run("SELECT id FROM dbo.Users");
        assert!(!report.summary.has_rules);
        assert_eq!(report.summary.rule_count, 0);
        assert!(report.template_suggestions.is_empty());
    }

    #[test]
    fn test_guard_clause_with_throw() {
        let report = run("IF @name IS NULL THROW 50001, 'name required', 1;");
        assert_eq!(report.summary.rule_count, 1);
        let rule = &report.rules[0];
        assert_eq!(rule.kind, "guard_clause");
        assert_eq!(rule.action, "raise_error");
        assert_eq!(rule.confidence, 0.85);
        assert!(rule.signals.contains(&"IS NULL".to_string()));
        assert!(
            report
                .template_suggestions
                .iter()
                .any(|t| t.template_id == "TPL_VALIDATE_REQUIRED_PARAM")
        );
        assert!(
            report
                .template_suggestions
                .iter()
                .any(|t| t.template_id == "TPL_ERROR_TO_EXCEPTION")
        );
    }

    #[test]
    fn test_not_exists_check() {
        let report =
            run("IF NOT EXISTS (SELECT 1 FROM dbo.Users WHERE id = @id) RETURN -1;");
        let rule = &report.rules[0];
        assert_eq!(rule.kind, "not_exists_check");
        assert_eq!(rule.action, "return_code");
        assert_eq!(rule.condition, "NOT EXISTS (SELECT …)");
        assert!(
            report
                .template_suggestions
                .iter()
                .any(|t| t.template_id == "TPL_ENSURE_NOT_EXISTS")
        );
    }

    #[test]
    fn test_range_check() {
        let report = run("IF @amount > 1000 BEGIN SELECT 1 END");
        let rule = &report.rules[0];
        assert_eq!(rule.kind, "range_check");
        assert_eq!(rule.confidence, 0.75);
        // Numbers are sanitized out of the condition.
        assert!(!rule.condition.contains("1000"));
        assert!(rule.condition.contains('?'));
    }

    #[test]
    fn test_soft_delete_and_status_filters() {
        let report =
            run("SELECT * FROM dbo.T WHERE is_deleted = 0 AND use_yn = 'Y' AND status = 'OPEN'");
        let kinds: Vec<_> = report.rules.iter().map(|r| r.kind.as_str()).collect();
        assert!(kinds.contains(&"soft_delete_filter"));
        assert!(kinds.contains(&"status_filter"));
        assert!(
            report
                .template_suggestions
                .iter()
                .any(|t| t.template_id == "TPL_SOFT_DELETE_FILTER")
        );
    }

    #[test]
    fn test_case_mapping_on_status() {
        let report = run("SELECT CASE status WHEN 'A' THEN 1 ELSE 0 END FROM dbo.T");
        let rule = report
            .rules
            .iter()
            .find(|r| r.kind == "case_mapping")
            .expect("case rule");
        assert_eq!(rule.confidence, 0.75);
        assert_eq!(rule.action, "mapping");
        assert!(
            report
                .template_suggestions
                .iter()
                .any(|t| t.template_id == "TPL_CASE_TO_ENUM_MAPPING")
        );
    }

    #[test]
    fn test_condition_sanitized_no_literals() {
        let report = run("IF @code = 'SECRET_VALUE' BEGIN RETURN END");
        for rule in &report.rules {
            assert!(!rule.condition.contains("SECRET_VALUE"));
        }
    }

    #[test]
    fn test_rules_sorted_by_confidence() {
        let report = run(
            "IF @a IS NULL THROW 50001, 'x', 1; SELECT CASE kind WHEN 1 THEN 2 ELSE 3 END FROM dbo.T;",
        );
        let confidences: Vec<_> = report.rules.iter().map(|r| r.confidence).collect();
        let mut sorted = confidences.clone();
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert_eq!(confidences, sorted);
    }

    #[test]
    fn test_case_sensitive_requires_exact_keyword_case() {
        let lower = "if @name is null throw 50001, 'name required', 1;";
        let report =
            analyze_business_rules("usp", "procedure", lower, "tsql", false, 100, 150);
        assert_eq!(report.summary.rule_count, 0);

        let report =
            analyze_business_rules("usp", "procedure", lower, "tsql", true, 100, 150);
        assert_eq!(report.summary.rule_count, 1);

        let upper = "IF @name IS NULL THROW 50001, 'name required', 1;";
        let report =
            analyze_business_rules("usp", "procedure", upper, "tsql", false, 100, 150);
        assert_eq!(report.summary.rule_count, 1);
        assert_eq!(report.rules[0].kind, "guard_clause");
    }

    #[test]
    fn test_truncation_flags() {
        let many_ifs: String =
            (0..10).map(|_| "IF @x IS NULL RETURN -1; ").collect();
        let report =
            analyze_business_rules("usp", "procedure", &many_ifs, "tsql", true, 3, 150);
        assert!(report.summary.truncated);
        assert_eq!(report.summary.rule_count, 3);
        assert!(!report.errors.is_empty());
    }
}
