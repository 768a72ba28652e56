//! SafeText - comment stripping, literal masking, and log-safe summaries.
//!
//! Raw SQL never leaves this process through logs or responses. Every log
//! record carries only the byte length and an 8-hex-char SHA-256 prefix.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use crate::utils::re;

static BLOCK_COMMENT: Lazy<Regex> = Lazy::new(|| re(r"(?s)/\*.*?\*/"));
static LINE_COMMENT: Lazy<Regex> = Lazy::new(|| re(r"(?m)--.*?$"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| re(r"\s+"));

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SqlSummary {
    pub len: usize,
    pub sha256_8: String,
}

/// Byte length plus the first 8 hex chars of the SHA-256 digest.
pub fn summarize(sql: &str) -> SqlSummary {
    let digest = Sha256::digest(sql.as_bytes());
    let mut sha256_8 = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        sha256_8.push_str(&format!("{byte:02x}"));
    }
    SqlSummary { len: sql.len(), sha256_8 }
}

/// Replace block and line comments with a single space each. An unterminated
/// block comment consumes to end of input.
pub fn strip_comments(sql: &str) -> String {
    let without_block = BLOCK_COMMENT.replace_all(sql, " ");
    let without_block = match without_block.find("/*") {
        Some(pos) => format!("{} ", &without_block[..pos]),
        None => without_block.into_owned(),
    };
    LINE_COMMENT.replace_all(&without_block, " ").into_owned()
}

/// Collapse single-quoted literals (including `N'...'` and `''` escapes)
/// down to `''`. An unterminated literal consumes to end of input. Linear
/// scan so surviving identifier positions stay aligned statement by
/// statement.
pub fn mask_strings(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    while let Some(ch) = chars.next() {
        let n_prefix = (ch == 'N' || ch == 'n') && chars.peek() == Some(&'\'');
        if ch != '\'' && !n_prefix {
            out.push(ch);
            continue;
        }
        if n_prefix {
            chars.next();
        }
        loop {
            match chars.next() {
                None => break,
                Some('\'') => {
                    if chars.peek() == Some(&'\'') {
                        chars.next();
                    } else {
                        break;
                    }
                }
                Some(_) => {}
            }
        }
        out.push_str("''");
    }
    out
}

/// Comments blanked, literals masked. The text every keyword scan runs on,
/// so detection patterns cannot fire inside comments or string content.
pub fn strip_comments_and_strings(sql: &str) -> String {
    mask_strings(&strip_comments(sql))
}

/// Single-space-normalized form of the scrubbed text.
pub fn normalized_scan_text(sql: &str) -> String {
    WHITESPACE
        .replace_all(strip_comments_and_strings(sql).trim(), " ")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_len_and_hash_prefix() {
        let summary = summarize("SELECT 1");
        assert_eq!(summary.len, 8);
        assert_eq!(summary.sha256_8.len(), 8);
        assert!(summary.sha256_8.chars().all(|c| c.is_ascii_hexdigit()));
        // Stable across calls.
        assert_eq!(summary.sha256_8, summarize("SELECT 1").sha256_8);
    }

    #[test]
    fn test_strip_comments_block_and_line() {
        let sql = "SELECT 1 /* hidden INSERT INTO t */ -- trailing UPDATE u\nFROM x";
        let cleaned = strip_comments(sql);
        assert!(!cleaned.contains("INSERT"));
        assert!(!cleaned.contains("UPDATE"));
        assert!(cleaned.contains("FROM x"));
    }

    #[test]
    fn test_mask_strings_with_escapes() {
        let sql = "SET @x = 'it''s a literal'; SET @y = N'unicode';";
        assert_eq!(mask_strings(sql), "SET @x = ''; SET @y = '';");
    }

    #[test]
    fn test_unterminated_constructs_consume_to_end() {
        assert_eq!(strip_comments("SELECT 1 /* open"), "SELECT 1  ");
        assert_eq!(mask_strings("SELECT 'closed', 'open"), "SELECT '', ''");
    }

    #[test]
    fn test_normalized_scan_text_collapses_whitespace() {
        let sql = "SELECT\t1\n  FROM    dbo.T -- comment";
        assert_eq!(normalized_scan_text(sql), "SELECT 1 FROM dbo.T");
    }
}
