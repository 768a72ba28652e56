//! Transactional structure analysis.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::safe_sql::{strip_comments_and_strings, summarize};
use crate::utils::{SignalList, re};

static BEGIN_TRAN: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bBEGIN\s+TRAN(?:SACTION)?\b"));
static COMMIT_TRAN: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bCOMMIT(?:\s+TRAN(?:SACTION)?)?\b"));
static ROLLBACK_TRAN: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bROLLBACK(?:\s+TRAN(?:SACTION)?)?\b"));
static SAVE_TRAN: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bSAVE\s+TRAN(?:SACTION)?\b"));
static BEGIN_TRY: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bBEGIN\s+TRY\b"));
static BEGIN_CATCH: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bBEGIN\s+CATCH\b"));
static XACT_ABORT: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bSET\s+XACT_ABORT\s+(ON|OFF)\b"));
static ISOLATION_LEVEL: Lazy<Regex> = Lazy::new(|| {
    re(r"(?i)\bSET\s+TRANSACTION\s+ISOLATION\s+LEVEL\s+(READ\s+UNCOMMITTED|READ\s+COMMITTED|REPEATABLE\s+READ|SNAPSHOT|SERIALIZABLE)\b")
});
static TRANCOUNT: Lazy<Regex> = Lazy::new(|| re(r"(?i)@@TRANCOUNT"));
static XACT_STATE: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bXACT_STATE\s*\(\s*\)"));
static THROW: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bTHROW\b"));
static RAISERROR: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bRAISERROR\b"));

const SIGNAL_CAP: usize = 10;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransactionSummary {
    pub uses_transaction: bool,
    pub begin_count: usize,
    pub commit_count: usize,
    pub rollback_count: usize,
    pub savepoint_count: usize,
    pub has_try_catch: bool,
    pub xact_abort: Option<String>,
    pub isolation_level: Option<String>,
    pub signals: Vec<String>,
}

/// Regex counts over scrubbed SQL. Last `SET XACT_ABORT` and last isolation
/// level win; signal order is fixed and capped.
pub fn analyze_transactions(sql: &str) -> TransactionSummary {
    let summary = summarize(sql);
    tracing::info!(
        sql_len = summary.len,
        sql_hash = %summary.sha256_8,
        "analyze_transactions"
    );

    let scan = strip_comments_and_strings(sql);

    let begin_count = BEGIN_TRAN.find_iter(&scan).count();
    let commit_count = COMMIT_TRAN.find_iter(&scan).count();
    let rollback_count = ROLLBACK_TRAN.find_iter(&scan).count();
    let savepoint_count = SAVE_TRAN.find_iter(&scan).count();
    let has_try_catch = BEGIN_TRY.is_match(&scan) && BEGIN_CATCH.is_match(&scan);

    let xact_abort = XACT_ABORT
        .captures_iter(&scan)
        .last()
        .map(|captures| captures[1].to_ascii_uppercase());
    let isolation_level = ISOLATION_LEVEL.captures_iter(&scan).last().map(|captures| {
        captures[1]
            .to_ascii_uppercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    });

    let mut signals = SignalList::new(SIGNAL_CAP);
    if begin_count > 0 {
        signals.push("BEGIN TRAN");
    }
    if commit_count > 0 {
        signals.push("COMMIT");
    }
    if rollback_count > 0 {
        signals.push("ROLLBACK");
    }
    if savepoint_count > 0 {
        signals.push("SAVE TRAN");
    }
    if has_try_catch {
        signals.push("TRY/CATCH");
    }
    if let Some(mode) = &xact_abort {
        signals.push(format!("XACT_ABORT {mode}"));
    }
    if let Some(level) = &isolation_level {
        signals.push(format!("ISOLATION LEVEL {level}"));
    }
    if TRANCOUNT.is_match(&scan) {
        signals.push("@@TRANCOUNT");
    }
    if XACT_STATE.is_match(&scan) {
        signals.push("XACT_STATE()");
    }
    if THROW.is_match(&scan) {
        signals.push("THROW");
    }
    if RAISERROR.is_match(&scan) {
        signals.push("RAISERROR");
    }

    TransactionSummary {
        uses_transaction: begin_count > 0
            || commit_count > 0
            || rollback_count > 0
            || savepoint_count > 0,
        begin_count,
        commit_count,
        rollback_count,
        savepoint_count,
        has_try_catch,
        xact_abort,
        isolation_level,
        signals: signals.into_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_transaction() {
        let result = analyze_transactions("SELECT 1");
        assert!(!result.uses_transaction);
        assert_eq!(result.begin_count, 0);
        assert!(result.signals.is_empty());
        assert!(result.xact_abort.is_none());
    }

    #[test]
    fn test_full_transactional_block() {
        let sql = "
            SET XACT_ABORT ON;
            SET TRANSACTION ISOLATION LEVEL READ COMMITTED;
            BEGIN TRY
                BEGIN TRAN;
                UPDATE dbo.T SET x = 1;
                COMMIT TRANSACTION;
            END TRY
            BEGIN CATCH
                ROLLBACK TRAN;
                THROW;
            END CATCH
        ";
        let result = analyze_transactions(sql);
        assert!(result.uses_transaction);
        assert_eq!(result.begin_count, 1);
        assert_eq!(result.commit_count, 1);
        assert_eq!(result.rollback_count, 1);
        assert!(result.has_try_catch);
        assert_eq!(result.xact_abort.as_deref(), Some("ON"));
        assert_eq!(result.isolation_level.as_deref(), Some("READ COMMITTED"));
        for signal in [
            "BEGIN TRAN",
            "COMMIT",
            "ROLLBACK",
            "TRY/CATCH",
            "XACT_ABORT ON",
            "ISOLATION LEVEL READ COMMITTED",
            "THROW",
        ] {
            assert!(result.signals.contains(&signal.to_string()), "missing {signal}");
        }
    }

    #[test]
    fn test_last_xact_abort_wins() {
        let sql = "SET XACT_ABORT ON; SET XACT_ABORT OFF;";
        assert_eq!(analyze_transactions(sql).xact_abort.as_deref(), Some("OFF"));
    }

    #[test]
    fn test_isolation_level_whitespace_canonicalized() {
        let sql = "SET TRANSACTION ISOLATION LEVEL READ\n    UNCOMMITTED;";
        assert_eq!(
            analyze_transactions(sql).isolation_level.as_deref(),
            Some("READ UNCOMMITTED")
        );
    }

    #[test]
    fn test_keywords_in_comments_do_not_count() {
        let sql = "SELECT 1 -- BEGIN TRAN\n/* COMMIT */";
        let result = analyze_transactions(sql);
        assert!(!result.uses_transaction);
    }
}
