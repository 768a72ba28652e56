//! Error-handling surface: TRY/CATCH, THROW, RAISERROR, legacy @@ERROR,
//! return codes, and error-shaped OUTPUT parameters.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::safe_sql::{strip_comments_and_strings, summarize};
use crate::utils::{SignalList, re, unique_ordered};

static BEGIN_TRY: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bBEGIN\s+TRY\b"));
static BEGIN_CATCH: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bBEGIN\s+CATCH\b"));
static THROW: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bTHROW\b"));
static RAISERROR: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bRAISERROR\b"));
static AT_AT_ERROR: Lazy<Regex> = Lazy::new(|| re(r"(?i)@@ERROR\b"));
static PRINT: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bPRINT\b"));
static RETURN: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bRETURN\b"));
static RETURN_VALUE: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bRETURN\s+(-?\d+)\b"));
static OUTPUT_PARAM: Lazy<Regex> = Lazy::new(|| {
    re(r"(?i)@(?P<name>[A-Za-z_]\w*)\s+[A-Za-z_]\w*(?:\s*\(\s*(?:\d+|MAX)(?:\s*,\s*\d+)?\s*\))?\s+(?:OUT|OUTPUT)\b")
});

const ERROR_FUNCTIONS: &[&str] = &[
    "ERROR_NUMBER",
    "ERROR_MESSAGE",
    "ERROR_STATE",
    "ERROR_SEVERITY",
    "ERROR_LINE",
    "ERROR_PROCEDURE",
];

const SIGNAL_CAP: usize = 15;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorHandling {
    pub has_try_catch: bool,
    pub try_count: usize,
    pub catch_count: usize,
    pub uses_throw: bool,
    pub throw_count: usize,
    pub uses_raiserror: bool,
    pub raiserror_count: usize,
    pub uses_at_at_error: bool,
    pub at_at_error_count: usize,
    pub uses_error_functions: Vec<String>,
    pub uses_print: bool,
    pub print_count: usize,
    pub uses_return: bool,
    pub return_count: usize,
    pub return_values: Vec<i64>,
    pub uses_output_error_params: bool,
    pub output_error_params: Vec<String>,
    pub signals: Vec<String>,
    pub notes: Vec<String>,
}

pub fn analyze_error_handling(sql: &str) -> ErrorHandling {
    let summary = summarize(sql);
    tracing::info!(
        sql_len = summary.len,
        sql_hash = %summary.sha256_8,
        "analyze_error_handling"
    );

    let scan = strip_comments_and_strings(sql);

    let try_count = BEGIN_TRY.find_iter(&scan).count();
    let catch_count = BEGIN_CATCH.find_iter(&scan).count();
    let throw_count = THROW.find_iter(&scan).count();
    let raiserror_count = RAISERROR.find_iter(&scan).count();
    let at_at_error_count = AT_AT_ERROR.find_iter(&scan).count();
    let print_count = PRINT.find_iter(&scan).count();
    let return_count = RETURN.find_iter(&scan).count();

    let return_values: Vec<i64> = unique_ordered(
        RETURN_VALUE
            .captures_iter(&scan)
            .map(|captures| captures[1].to_string()),
    )
    .into_iter()
    .filter_map(|value| value.parse().ok())
    .collect();

    let uses_error_functions: Vec<String> = ERROR_FUNCTIONS
        .iter()
        .filter(|name| {
            re(&format!(r"(?i)\b{name}\s*\(")).is_match(&scan)
        })
        .map(|name| name.to_string())
        .collect();

    let output_error_params: Vec<String> = unique_ordered(
        OUTPUT_PARAM
            .captures_iter(&scan)
            .map(|captures| format!("@{}", &captures["name"]))
            .filter(|param| is_error_like(param)),
    );

    let has_try_catch = try_count > 0 && catch_count > 0;

    let mut signals = SignalList::new(SIGNAL_CAP);
    if has_try_catch {
        signals.push("TRY/CATCH");
    }
    if throw_count > 0 {
        signals.push("THROW");
    }
    if raiserror_count > 0 {
        signals.push("RAISERROR");
    }
    if at_at_error_count > 0 {
        signals.push("@@ERROR");
    }
    for function in &uses_error_functions {
        signals.push(function.clone());
    }
    if print_count > 0 {
        signals.push("PRINT");
    }
    if return_count > 0 {
        signals.push("RETURN");
    }
    if !output_error_params.is_empty() {
        signals.push("OUTPUT_PARAM");
    }

    ErrorHandling {
        has_try_catch,
        try_count,
        catch_count,
        uses_throw: throw_count > 0,
        throw_count,
        uses_raiserror: raiserror_count > 0,
        raiserror_count,
        uses_at_at_error: at_at_error_count > 0,
        at_at_error_count,
        uses_error_functions,
        uses_print: print_count > 0,
        print_count,
        uses_return: return_count > 0,
        return_count,
        return_values,
        uses_output_error_params: !output_error_params.is_empty(),
        output_error_params,
        signals: signals.into_vec(),
        notes: Vec::new(),
    }
}

fn is_error_like(param: &str) -> bool {
    let name = param.trim_start_matches('@').to_ascii_lowercase();
    name.starts_with("err") || name.starts_with("ret") || name.contains("error")
}
