//! Table and callable-function reference extraction.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::services::safe_sql::{strip_comments_and_strings, summarize};
use crate::services::sql_parser;
use crate::utils::{re, sorted_unique};

static TABLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\b(?:FROM|JOIN|UPDATE|INTO)\s+([A-Za-z_]\w*(?:\.[A-Za-z_]\w*)?)"));
static FUNCTION_PATTERN: Lazy<Regex> = Lazy::new(|| re(r"(?i)\b([A-Za-z_]\w*)\s*\("));

const FUNCTION_EXCLUDE: &[&str] = &[
    "SELECT", "FROM", "JOIN", "WHERE", "UPDATE", "INTO", "DELETE", "INSERT", "VALUES", "CASE",
    "WHEN", "THEN", "ELSE", "END", "AS",
];

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct References {
    pub tables: Vec<String>,
    pub functions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReferencesResult {
    pub references: References,
    pub errors: Vec<String>,
}

/// Upper-cased, ASCII-sorted, deduplicated table and function references.
/// AST results are unioned with the regex fallback; on parse failure the
/// fallback stands alone.
pub fn analyze_references(sql: &str, dialect: &str) -> ReferencesResult {
    let summary = summarize(sql);
    tracing::info!(
        sql_len = summary.len,
        sql_hash = %summary.sha256_8,
        "analyze_references"
    );

    let fallback = fallback_references(sql);
    let mut errors = Vec::new();

    let references = match sql_parser::parse_statements(sql, dialect) {
        Ok(statements) => {
            let scan = sql_parser::scan(&statements);
            References {
                tables: sorted_unique(scan.relations.into_iter().chain(fallback.tables)),
                functions: sorted_unique(scan.functions.into_iter().chain(fallback.functions)),
            }
        }
        Err(parse_error) => {
            errors.push(parse_error);
            fallback
        }
    };

    ReferencesResult { references, errors }
}

pub(crate) fn fallback_references(sql: &str) -> References {
    let cleaned = strip_comments_and_strings(sql);
    let tables = TABLE_PATTERN
        .captures_iter(&cleaned)
        .map(|captures| captures[1].to_ascii_uppercase())
        .collect::<Vec<_>>();
    let functions = FUNCTION_PATTERN
        .captures_iter(&cleaned)
        .map(|captures| captures[1].to_ascii_uppercase())
        .filter(|name| !FUNCTION_EXCLUDE.contains(&name.as_str()))
        .collect::<Vec<_>>();
    References { tables: sorted_unique(tables), functions: sorted_unique(functions) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_references_from_simple_select() {
        let result = analyze_references("SELECT id FROM dbo.Users", "tsql");
        assert_eq!(result.references.tables, vec!["DBO.USERS"]);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_references_fallback_on_procedural_body() {
        let sql = "CREATE PROCEDURE dbo.usp_Get AS SELECT a FROM dbo.Accounts WHERE dbo.fn_Active(a) = 1";
        let result = analyze_references(sql, "tsql");
        assert!(result.references.tables.contains(&"DBO.ACCOUNTS".to_string()));
        assert!(result.references.functions.iter().any(|f| f.contains("FN_ACTIVE")));
    }

    #[test]
    fn test_references_sorted_and_deduplicated() {
        let sql = "SELECT * FROM dbo.B JOIN dbo.A ON 1=1 JOIN dbo.a ON 1=1";
        let result = analyze_references(sql, "tsql");
        assert_eq!(result.references.tables, vec!["DBO.A", "DBO.B"]);
    }

    #[test]
    fn test_references_ignore_comments_and_strings() {
        let sql = "SELECT 1 -- FROM dbo.Hidden\n/* JOIN dbo.AlsoHidden */ FROM dbo.Real WHERE x = 'FROM dbo.Fake'";
        let result = analyze_references(sql, "tsql");
        assert!(result.references.tables.contains(&"DBO.REAL".to_string()));
        assert!(!result.references.tables.iter().any(|t| t.contains("HIDDEN")));
        assert!(!result.references.tables.iter().any(|t| t.contains("FAKE")));
    }

    #[test]
    fn test_keyword_calls_not_reported_as_functions() {
        let result = analyze_references("SELECT COUNT(id) FROM dbo.T WHERE (x = 1)", "tsql");
        assert!(result.references.functions.contains(&"COUNT".to_string()));
        assert!(!result.references.functions.contains(&"WHERE".to_string()));
    }
}
