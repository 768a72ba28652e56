//! Data-change footprint: write operation counts and target tables.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::safe_sql::{strip_comments_and_strings, summarize};
use crate::services::sql_parser::{self, AstWriteKind};
use crate::utils::{SignalList, re};

const TABLE_NAME: &str =
    r"(?:\[[^\]]+\]|[A-Za-z_][\w$#]*)(?:\s*\.\s*(?:\[[^\]]+\]|[A-Za-z_][\w$#]*)){0,2}";

static INSERT: Lazy<Regex> =
    Lazy::new(|| re(&format!(r"(?i)\bINSERT\s+INTO\s+(?P<table>{TABLE_NAME})")));
static UPDATE: Lazy<Regex> = Lazy::new(|| re(&format!(r"(?i)\bUPDATE\s+(?P<table>{TABLE_NAME})")));
static DELETE: Lazy<Regex> =
    Lazy::new(|| re(&format!(r"(?i)\bDELETE\s+FROM\s+(?P<table>{TABLE_NAME})")));
static DELETE_ALIAS: Lazy<Regex> =
    Lazy::new(|| re(&format!(r"(?i)\bDELETE\s+\w+\s+FROM\s+(?P<table>{TABLE_NAME})")));
static MERGE_INTO: Lazy<Regex> =
    Lazy::new(|| re(&format!(r"(?i)\bMERGE\s+INTO\s+(?P<table>{TABLE_NAME})")));
static TRUNCATE: Lazy<Regex> =
    Lazy::new(|| re(&format!(r"(?i)\bTRUNCATE\s+TABLE\s+(?P<table>{TABLE_NAME})")));
static SELECT_INTO: Lazy<Regex> =
    Lazy::new(|| re(&format!(r"(?i)\bSELECT\b[\s\S]*?\bINTO\s+(?P<table>{TABLE_NAME})")));
static MERGE_KEYWORD: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bMERGE\b"));
static OUTPUT: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bOUTPUT\b"));
static INSERTED: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bINSERTED\b"));
static DELETED: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bDELETED\b"));

const SIGNAL_CAP: usize = 15;
const OP_ORDER: [&str; 6] = ["insert", "update", "delete", "merge", "truncate", "select_into"];

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct OperationStats {
    pub count: usize,
    pub tables: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct Operations {
    pub insert: OperationStats,
    pub update: OperationStats,
    pub delete: OperationStats,
    pub merge: OperationStats,
    pub truncate: OperationStats,
    pub select_into: OperationStats,
}

impl Operations {
    pub fn get(&self, op: &str) -> &OperationStats {
        match op {
            "insert" => &self.insert,
            "update" => &self.update,
            "delete" => &self.delete,
            "merge" => &self.merge,
            "truncate" => &self.truncate,
            _ => &self.select_into,
        }
    }

    fn get_mut(&mut self, op: &str) -> &mut OperationStats {
        match op {
            "insert" => &mut self.insert,
            "update" => &mut self.update,
            "delete" => &mut self.delete,
            "merge" => &mut self.merge,
            "truncate" => &mut self.truncate,
            _ => &mut self.select_into,
        }
    }

    /// Ops with at least one hit, in the fixed insert/update/delete/merge/
    /// truncate/select_into order.
    pub fn write_ops(&self) -> Vec<String> {
        OP_ORDER
            .iter()
            .filter(|op| self.get(op).count > 0)
            .map(|op| op.to_string())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TableOperation {
    pub table: String,
    pub ops: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DataChanges {
    pub has_writes: bool,
    pub operations: Operations,
    pub table_operations: Vec<TableOperation>,
    pub signals: Vec<String>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DataChangesResult {
    pub data_changes: DataChanges,
    pub errors: Vec<String>,
}

#[derive(Default)]
struct OpAccumulator {
    count: usize,
    tables: BTreeSet<String>,
    unknown: bool,
}

/// AST-preferred write detection with regex fallback per operation.
pub fn analyze_data_changes(sql: &str, dialect: &str) -> DataChangesResult {
    let summary = summarize(sql);
    tracing::info!(
        sql_len = summary.len,
        sql_hash = %summary.sha256_8,
        "analyze_data_changes"
    );

    let mut errors = Vec::new();
    let mut ops: BTreeMap<&str, OpAccumulator> = OP_ORDER
        .iter()
        .map(|op| (*op, OpAccumulator::default()))
        .collect();

    let mut parse_failed = false;
    match sql_parser::parse_statements(sql, dialect) {
        Ok(statements) => {
            for (kind, table) in sql_parser::scan(&statements).writes {
                let op = match kind {
                    AstWriteKind::Insert => "insert",
                    AstWriteKind::Update => "update",
                    AstWriteKind::Delete => "delete",
                    AstWriteKind::Merge => "merge",
                    AstWriteKind::Truncate => "truncate",
                    AstWriteKind::SelectInto => "select_into",
                };
                add_hit(ops.get_mut(op).expect("known op"), table.as_deref());
            }
        }
        Err(parse_error) => {
            errors.push(parse_error);
            parse_failed = true;
        }
    }

    let scan = strip_comments_and_strings(sql);
    let fallback = fallback_data_changes(&scan);
    for op in OP_ORDER {
        let current = ops.get_mut(op).expect("known op");
        if parse_failed || current.count == 0 {
            let replacement = fallback.get(op).expect("known op");
            current.count = replacement.count;
            current.tables = replacement.tables.clone();
            current.unknown = replacement.unknown;
        }
    }

    let mut operations = Operations::default();
    let mut notes = Vec::new();
    for op in OP_ORDER {
        let accumulator = ops.get(op).expect("known op");
        let stats = operations.get_mut(op);
        stats.count = accumulator.count;
        stats.tables = accumulator.tables.iter().cloned().collect();
        if accumulator.count > 0 && accumulator.tables.is_empty() && accumulator.unknown {
            notes.push(format!(
                "{} detected but target table uncertain.",
                op.to_ascii_uppercase()
            ));
        }
    }

    let mut per_table: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for op in OP_ORDER {
        for table in &operations.get(op).tables {
            per_table
                .entry(table.clone())
                .or_default()
                .insert(op.to_string());
        }
    }
    let table_operations = per_table
        .into_iter()
        .map(|(table, ops)| TableOperation { table, ops: ops.into_iter().collect() })
        .collect();

    let mut signals = SignalList::new(SIGNAL_CAP);
    for (op, signal) in [
        ("insert", "INSERT"),
        ("update", "UPDATE"),
        ("delete", "DELETE"),
        ("merge", "MERGE"),
        ("truncate", "TRUNCATE"),
        ("select_into", "SELECT INTO"),
    ] {
        if operations.get(op).count > 0 {
            signals.push(signal);
        }
    }
    if OUTPUT.is_match(&scan) {
        signals.push("OUTPUT");
    }
    if INSERTED.is_match(&scan) {
        signals.push("INSERTED");
    }
    if DELETED.is_match(&scan) {
        signals.push("DELETED");
    }

    let has_writes = OP_ORDER.iter().any(|op| operations.get(op).count > 0);

    DataChangesResult {
        data_changes: DataChanges {
            has_writes,
            operations,
            table_operations,
            signals: signals.into_vec(),
            notes,
        },
        errors,
    }
}

fn add_hit(accumulator: &mut OpAccumulator, table: Option<&str>) {
    accumulator.count += 1;
    match table.and_then(normalize_table_name) {
        Some(table) => {
            accumulator.tables.insert(table);
        }
        None => accumulator.unknown = true,
    }
}

fn fallback_data_changes(scan: &str) -> BTreeMap<&'static str, OpAccumulator> {
    let mut ops: BTreeMap<&str, OpAccumulator> = OP_ORDER
        .iter()
        .map(|op| (*op, OpAccumulator::default()))
        .collect();

    let merge_context = |start: usize| {
        let statement_start = scan[..start].rfind(';').unwrap_or(0);
        MERGE_KEYWORD.is_match(&scan[statement_start..start])
    };

    for captures in INSERT.captures_iter(scan) {
        add_hit(ops.get_mut("insert").expect("known op"), Some(&captures["table"]));
    }
    for captures in UPDATE.captures_iter(scan) {
        let hit = captures.get(0).expect("full match");
        if merge_context(hit.start()) {
            continue;
        }
        add_hit(ops.get_mut("update").expect("known op"), Some(&captures["table"]));
    }
    for pattern in [&DELETE, &DELETE_ALIAS] {
        for captures in pattern.captures_iter(scan) {
            let hit = captures.get(0).expect("full match");
            if merge_context(hit.start()) {
                continue;
            }
            add_hit(ops.get_mut("delete").expect("known op"), Some(&captures["table"]));
        }
    }
    for captures in MERGE_INTO.captures_iter(scan) {
        add_hit(ops.get_mut("merge").expect("known op"), Some(&captures["table"]));
    }
    for captures in TRUNCATE.captures_iter(scan) {
        add_hit(ops.get_mut("truncate").expect("known op"), Some(&captures["table"]));
    }
    for captures in SELECT_INTO.captures_iter(scan) {
        add_hit(ops.get_mut("select_into").expect("known op"), Some(&captures["table"]));
    }

    ops
}

fn normalize_table_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches(';').trim_matches(|c| c == '(' || c == ')');
    let parts = crate::utils::split_name(trimmed, false);
    if parts.is_empty() {
        return None;
    }
    Some(
        parts
            .iter()
            .map(|part| part.to_ascii_uppercase())
            .collect::<Vec<_>>()
            .join("."),
    )
}
