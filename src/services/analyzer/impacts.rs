//! Migration impact detection over eleven fixed categories.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::safe_sql::{normalized_scan_text, summarize};
use crate::utils::{SignalList, re};

static SP_EXECUTESQL: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bSP_EXECUTESQL\b"));
static DYNAMIC_EXEC_VAR: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bEXEC(?:UTE)?\s*\(?\s*@\w+"));
static DYNAMIC_EXEC_LITERAL: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\bEXEC(?:UTE)?\s*(?:\(|\s)\s*N?'"));
static DYNAMIC_EXEC_CONCAT: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bEXEC(?:UTE)?\s*\(?\s*@\w+\s*\+"));

static DECLARE_CURSOR: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bDECLARE\s+\w+\s+CURSOR\b"));
static OPEN_CURSOR: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bOPEN\s+\w+\b"));
static FETCH_CURSOR: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bFETCH\s+\w+"));
static CLOSE_CURSOR: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bCLOSE\s+\w+\b"));
static DEALLOCATE_CURSOR: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bDEALLOCATE\s+\w+\b"));

static OPENQUERY: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bOPENQUERY\b"));
static OPENDATASOURCE: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bOPENDATASOURCE\b"));
static EXEC_AT: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bEXEC(?:UTE)?\b[^;]*\bAT\b"));
static FOUR_PART_NAME: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\b[A-Za-z_]\w*\.[A-Za-z_]\w*\.[A-Za-z_]\w*\.[A-Za-z_]\w*\b"));

static XP_PROC: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bxp_\w+\b"));
static SP_OA: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bsp_OA\w+\b"));
static SP_CONFIGURE: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bsp_configure\b"));

static TEMP_TABLE: Lazy<Regex> = Lazy::new(|| re(r"##?[A-Za-z_]\w*"));
static TEMP_TABLE_CREATE: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\bCREATE\s+TABLE\s+##?[A-Za-z_]\w*\b"));
static TEMP_TABLE_INSERT: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\bINSERT\s+INTO\s+##?[A-Za-z_]\w*\b"));
static TEMP_TABLE_DROP: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bDROP\s+TABLE\s+##?[A-Za-z_]\w*\b"));
static TABLE_VARIABLE: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bDECLARE\s+@\w+\s+TABLE\b"));

static MERGE: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bMERGE\b"));
static OUTPUT_CLAUSE: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bOUTPUT\b\s+(?:INSERTED|DELETED)\b"));

static SCOPE_IDENTITY: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bSCOPE_IDENTITY\s*\(\s*\)"));
static AT_AT_IDENTITY: Lazy<Regex> = Lazy::new(|| re(r"(?i)@@IDENTITY\b"));
static IDENT_CURRENT: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bIDENT_CURRENT\s*\("));

static GETDATE: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bGETDATE\s*\(\s*\)"));
static SYSDATETIME: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bSYSDATETIME\s*\(\s*\)"));
static NEWID: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bNEWID\s*\(\s*\)"));
static RAND: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bRAND\s*\(\s*\)"));

static RAISERROR: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bRAISERROR\b"));
static THROW: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bTHROW\b"));
static AT_AT_ERROR: Lazy<Regex> = Lazy::new(|| re(r"(?i)@@ERROR\b"));

const SIGNAL_CAP: usize = 10;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ImpactItem {
    pub id: String,
    pub category: String,
    pub severity: String,
    pub title: String,
    pub signals: Vec<String>,
    pub details: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MigrationImpacts {
    pub has_impact: bool,
    pub items: Vec<ImpactItem>,
}

fn item(
    id: &str,
    category: &str,
    severity: &str,
    title: &str,
    details: &str,
    signals: Vec<&str>,
) -> ImpactItem {
    let mut list = SignalList::new(SIGNAL_CAP);
    list.extend(signals.into_iter().map(str::to_string));
    ImpactItem {
        id: id.to_string(),
        category: category.to_string(),
        severity: severity.to_string(),
        title: title.to_string(),
        signals: list.into_vec(),
        details: details.to_string(),
    }
}

/// Scan the normalized text for the fixed impact catalog. Items appear in
/// catalog order; severity is fixed per category.
pub fn analyze_migration_impacts(sql: &str) -> MigrationImpacts {
    let summary = summarize(sql);
    tracing::info!(
        sql_len = summary.len,
        sql_hash = %summary.sha256_8,
        "analyze_migration_impacts"
    );

    let text = normalized_scan_text(sql);
    let mut items: Vec<ImpactItem> = Vec::new();

    let mut dynamic = Vec::new();
    if SP_EXECUTESQL.is_match(&text) {
        dynamic.push("sp_executesql");
    }
    if DYNAMIC_EXEC_VAR.is_match(&text) {
        dynamic.push("EXEC(@var)");
    }
    if DYNAMIC_EXEC_LITERAL.is_match(&text) {
        dynamic.push("EXEC('...')");
    }
    if DYNAMIC_EXEC_CONCAT.is_match(&text) {
        dynamic.push("EXEC + concat");
    }
    if !dynamic.is_empty() {
        items.push(item(
            "IMP_DYN_SQL",
            "dynamic_sql",
            "high",
            "Dynamic SQL detected",
            "Dynamic SQL often requires refactoring to safe parameterization in Java/MyBatis.",
            dynamic,
        ));
    }

    let mut cursor = Vec::new();
    if DECLARE_CURSOR.is_match(&text) {
        cursor.push("DECLARE CURSOR");
    }
    if OPEN_CURSOR.is_match(&text) {
        cursor.push("OPEN CURSOR");
    }
    if FETCH_CURSOR.is_match(&text) {
        cursor.push("FETCH CURSOR");
    }
    if CLOSE_CURSOR.is_match(&text) {
        cursor.push("CLOSE CURSOR");
    }
    if DEALLOCATE_CURSOR.is_match(&text) {
        cursor.push("DEALLOCATE CURSOR");
    }
    if !cursor.is_empty() {
        items.push(item(
            "IMP_CURSOR",
            "cursor",
            "high",
            "Cursor usage detected",
            "Cursors often require set-based rewrites when moving to Java/MyBatis.",
            cursor,
        ));
    }

    let mut linked = Vec::new();
    if OPENQUERY.is_match(&text) {
        linked.push("OPENQUERY");
    }
    if OPENDATASOURCE.is_match(&text) {
        linked.push("OPENDATASOURCE");
    }
    if EXEC_AT.is_match(&text) {
        linked.push("EXEC AT");
    }
    if FOUR_PART_NAME.is_match(&text) {
        linked.push("FOUR_PART_NAME");
    }
    if !linked.is_empty() {
        items.push(item(
            "IMP_LINKED_SERVER",
            "linked_server",
            "high",
            "Linked server usage detected",
            "Linked server or remote execution patterns may need redesign in Java/MyBatis.",
            linked,
        ));
    }

    let mut system_proc = Vec::new();
    if XP_PROC.is_match(&text) {
        system_proc.push("xp_");
    }
    if SP_OA.is_match(&text) {
        system_proc.push("sp_OA*");
    }
    if SP_CONFIGURE.is_match(&text) {
        system_proc.push("sp_configure");
    }
    if !system_proc.is_empty() {
        items.push(item(
            "IMP_SYSTEM_PROC",
            "system_proc",
            "high",
            "System procedure usage detected",
            "System-level procedures may not map directly to Java/MyBatis and require review.",
            system_proc,
        ));
    }

    let mut temp_table = Vec::new();
    if TEMP_TABLE.is_match(&text) {
        temp_table.push("TEMP_TABLE");
    }
    if TEMP_TABLE_CREATE.is_match(&text) {
        temp_table.push("CREATE TABLE #");
    }
    if TEMP_TABLE_INSERT.is_match(&text) {
        temp_table.push("INSERT INTO #");
    }
    if TEMP_TABLE_DROP.is_match(&text) {
        temp_table.push("DROP TABLE #");
    }
    if !temp_table.is_empty() {
        items.push(item(
            "IMP_TEMP_TABLE",
            "temp_table",
            "medium",
            "Temporary table usage detected",
            "Temporary tables may need alternative structures in Java/MyBatis workflows.",
            temp_table,
        ));
    }

    if TABLE_VARIABLE.is_match(&text) {
        items.push(item(
            "IMP_TABLE_VARIABLE",
            "table_variable",
            "medium",
            "Table variable usage detected",
            "Table variables may need to be replaced with typed collections in Java/MyBatis.",
            vec!["DECLARE @table"],
        ));
    }

    if MERGE.is_match(&text) {
        items.push(item(
            "IMP_MERGE",
            "merge",
            "medium",
            "MERGE statement detected",
            "MERGE statements can require careful translation to Java/MyBatis logic.",
            vec!["MERGE"],
        ));
    }

    if OUTPUT_CLAUSE.is_match(&text) {
        items.push(item(
            "IMP_OUTPUT_CLAUSE",
            "output_clause",
            "medium",
            "OUTPUT clause detected",
            "OUTPUT clauses may need manual handling in Java/MyBatis result flows.",
            vec!["OUTPUT"],
        ));
    }

    let mut identity = Vec::new();
    if SCOPE_IDENTITY.is_match(&text) {
        identity.push("SCOPE_IDENTITY()");
    }
    if AT_AT_IDENTITY.is_match(&text) {
        identity.push("@@IDENTITY");
    }
    if IDENT_CURRENT.is_match(&text) {
        identity.push("IDENT_CURRENT");
    }
    if !identity.is_empty() {
        items.push(item(
            "IMP_IDENTITY",
            "identity",
            "medium",
            "Identity retrieval detected",
            "Identity retrieval functions may need explicit key handling in Java/MyBatis.",
            identity,
        ));
    }

    let mut nondeterminism = Vec::new();
    if GETDATE.is_match(&text) {
        nondeterminism.push("GETDATE()");
    }
    if SYSDATETIME.is_match(&text) {
        nondeterminism.push("SYSDATETIME()");
    }
    if NEWID.is_match(&text) {
        nondeterminism.push("NEWID()");
    }
    if RAND.is_match(&text) {
        nondeterminism.push("RAND()");
    }
    if !nondeterminism.is_empty() {
        items.push(item(
            "IMP_NONDETERMINISM",
            "nondeterminism",
            "low",
            "Non-deterministic function usage detected",
            "Non-deterministic functions may impact repeatability in migrations.",
            nondeterminism,
        ));
    }

    let mut error_signaling = Vec::new();
    if RAISERROR.is_match(&text) {
        error_signaling.push("RAISERROR");
    }
    if THROW.is_match(&text) {
        error_signaling.push("THROW");
    }
    if AT_AT_ERROR.is_match(&text) {
        error_signaling.push("@@ERROR");
    }
    if !error_signaling.is_empty() {
        items.push(item(
            "IMP_ERROR_SIGNALING",
            "error_signaling",
            "low",
            "Error signaling detected",
            "Error signaling patterns may need aligned exception handling in Java.",
            error_signaling,
        ));
    }

    MigrationImpacts { has_impact: !items.is_empty(), items }
}

impl MigrationImpacts {
    pub fn has(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.id == id)
    }

    pub fn has_any(&self, ids: &[&str]) -> bool {
        ids.iter().any(|id| self.has(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_select_has_no_impact() {
        let impacts = analyze_migration_impacts("SELECT id FROM dbo.Users WHERE id = 1");
        assert!(!impacts.has_impact);
        assert!(impacts.items.is_empty());
    }

    #[test]
    fn test_dynamic_sql_signals() {
        let impacts =
            analyze_migration_impacts("EXEC sp_executesql @stmt; EXEC(@dyn); EXEC('SELECT 1')");
        assert!(impacts.has("IMP_DYN_SQL"));
        let item = &impacts.items[0];
        assert!(item.signals.contains(&"sp_executesql".to_string()));
        assert!(item.signals.contains(&"EXEC(@var)".to_string()));
        assert!(item.signals.contains(&"EXEC('...')".to_string()));
        assert_eq!(item.severity, "high");
    }

    #[test]
    fn test_cursor_lifecycle_signals() {
        let sql = "DECLARE c CURSOR FOR SELECT 1; OPEN c; FETCH NEXT FROM c; CLOSE c; DEALLOCATE c;";
        let impacts = analyze_migration_impacts(sql);
        assert!(impacts.has("IMP_CURSOR"));
        let cursor = impacts.items.iter().find(|i| i.id == "IMP_CURSOR").unwrap();
        assert_eq!(cursor.signals.len(), 5);
    }

    #[test]
    fn test_linked_server_four_part_name() {
        let impacts = analyze_migration_impacts("SELECT * FROM srv1.db1.dbo.T");
        assert!(impacts.has("IMP_LINKED_SERVER"));
        let linked = impacts.items.iter().find(|i| i.id == "IMP_LINKED_SERVER").unwrap();
        assert_eq!(linked.signals, vec!["FOUR_PART_NAME"]);
    }

    #[test]
    fn test_temp_objects_and_identity() {
        let sql = "CREATE TABLE #t (id INT); DECLARE @tv TABLE (id INT); SELECT SCOPE_IDENTITY();";
        let impacts = analyze_migration_impacts(sql);
        assert!(impacts.has("IMP_TEMP_TABLE"));
        assert!(impacts.has("IMP_TABLE_VARIABLE"));
        assert!(impacts.has("IMP_IDENTITY"));
    }

    #[test]
    fn test_error_signaling_low_severity() {
        let impacts = analyze_migration_impacts("IF @@ERROR <> 0 RAISERROR('x', 16, 1)");
        let signaling = impacts.items.iter().find(|i| i.id == "IMP_ERROR_SIGNALING").unwrap();
        assert_eq!(signaling.severity, "low");
        assert!(signaling.signals.contains(&"RAISERROR".to_string()));
        assert!(signaling.signals.contains(&"@@ERROR".to_string()));
    }

    #[test]
    fn test_impacts_ignore_string_content() {
        let impacts = analyze_migration_impacts("SELECT 'MERGE OPENQUERY xp_cmdshell'");
        assert!(!impacts.has_impact);
    }
}
