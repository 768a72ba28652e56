//! External dependency inventory: linked servers, cross-database references,
//! remote execution, OPENQUERY/OPENDATASOURCE, CLR, xp_cmdshell.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::reusability::ObjectInfo;
use crate::services::safe_sql::{mask_strings, strip_comments, summarize};
use crate::utils::{clean_identifier, re, sorted_unique};

pub const VERSION: &str = "2.2.0";

const IDENT: &str = r"(?:\[[^\]]+\]|[A-Za-z_][\w$#]*)";
const SIGNAL_LIMIT: usize = 15;
const EXCLUDED_DB_NAMES: &[&str] = &["dbo", "sys", "information_schema"];

/// Detection patterns compiled per call so the `case_insensitive` option
/// controls keyword matching, not just identifier folding.
struct DetectionPatterns {
    openquery: Regex,
    opendatasource: Regex,
    exec_at: Regex,
    four_part: Regex,
    three_part: Regex,
    xp_cmdshell: Regex,
}

fn case_flags(case_insensitive: bool) -> &'static str {
    if case_insensitive { "(?i)" } else { "" }
}

fn build_patterns(case_insensitive: bool) -> DetectionPatterns {
    let flags = case_flags(case_insensitive);
    DetectionPatterns {
        openquery: re(&format!(r"{flags}\bOPENQUERY\s*\(\s*(?P<server>{IDENT})\s*,")),
        opendatasource: re(&format!(r"{flags}\bOPENDATASOURCE\s*\(")),
        exec_at: re(&format!(r"{flags}\bEXEC(?:UTE)?\b[^;]*?\bAT\b\s*(?P<server>{IDENT})")),
        four_part: re(&format!(
            r"{flags}\b(?P<server>{IDENT})\s*\.\s*(?P<database>{IDENT})\s*\.\s*(?P<schema>{IDENT})\s*\.\s*(?P<object>{IDENT})\b"
        )),
        three_part: re(&format!(
            r"{flags}\b(?P<database>{IDENT})\s*\.\s*(?P<schema>{IDENT})\s*\.\s*(?P<object>{IDENT})\b"
        )),
        xp_cmdshell: re(&format!(r"{flags}\bxp_cmdshell\b")),
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LinkedServerDep {
    pub name: String,
    pub signals: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CrossDatabaseDep {
    pub database: String,
    pub schema: String,
    pub object: String,
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TargetDep {
    pub target: String,
    pub kind: String,
    pub signals: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OtherDep {
    pub id: String,
    pub kind: String,
    pub signals: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExternalDepsSummary {
    pub has_external_deps: bool,
    pub linked_server_count: usize,
    pub cross_db_count: usize,
    pub remote_exec_count: usize,
    pub openquery_count: usize,
    pub opendatasource_count: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExternalDependencies {
    pub linked_servers: Vec<LinkedServerDep>,
    pub cross_database: Vec<CrossDatabaseDep>,
    pub remote_exec: Vec<TargetDep>,
    pub openquery: Vec<TargetDep>,
    pub opendatasource: Vec<TargetDep>,
    pub others: Vec<OtherDep>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExternalDepsReport {
    pub version: String,
    pub object: ObjectInfo,
    pub summary: ExternalDepsSummary,
    pub external_dependencies: ExternalDependencies,
    pub signals: Vec<String>,
    pub errors: Vec<String>,
}

#[allow(clippy::too_many_lines)]
pub fn analyze_external_dependencies(
    name: &str,
    object_type: &str,
    sql: &str,
    case_insensitive: bool,
    max_items: usize,
) -> ExternalDepsReport {
    let summary = summarize(sql);
    tracing::info!(
        sql_len = summary.len,
        sql_hash = %summary.sha256_8,
        "analyze_external_dependencies"
    );

    let mut errors: Vec<String> = Vec::new();
    let mut signals: BTreeSet<String> = BTreeSet::new();

    let comment_stripped = strip_comments(sql);
    // CLR probing inspects sp_configure string arguments, so it runs before
    // literal masking.
    let clr_signals = detect_clr_signals(&comment_stripped, case_insensitive);
    let cleaned = mask_strings(&comment_stripped);
    let patterns = build_patterns(case_insensitive);

    let mut linked_servers: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut remote_exec: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut openquery: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut opendatasource: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut others: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut cross_database: BTreeSet<(String, String, String, String)> = BTreeSet::new();

    for captures in patterns.openquery.captures_iter(&cleaned) {
        let server = clean_identifier(&captures["server"]).to_string();
        openquery
            .entry(server.clone())
            .or_default()
            .insert("OPENQUERY".to_string());
        linked_servers
            .entry(server)
            .or_default()
            .insert("OPENQUERY".to_string());
        signals.insert("OPENQUERY".to_string());
    }

    if patterns.opendatasource.is_match(&cleaned) {
        opendatasource
            .entry("OPENDATASOURCE".to_string())
            .or_default()
            .insert("OPENDATASOURCE".to_string());
        signals.insert("OPENDATASOURCE".to_string());
    }

    for captures in patterns.exec_at.captures_iter(&cleaned) {
        let server = clean_identifier(&captures["server"]).to_string();
        remote_exec
            .entry(server.clone())
            .or_default()
            .insert("EXEC AT".to_string());
        linked_servers
            .entry(server)
            .or_default()
            .insert("EXEC AT".to_string());
        signals.insert("EXEC AT".to_string());
    }

    let mut four_part_spans: Vec<(usize, usize)> = Vec::new();
    for captures in patterns.four_part.captures_iter(&cleaned) {
        let hit = captures.get(0).expect("full match");
        four_part_spans.push((hit.start(), hit.end()));
        let server = clean_identifier(&captures["server"]).to_string();
        linked_servers
            .entry(server)
            .or_default()
            .insert("four_part_name".to_string());
        signals.insert("four_part_name".to_string());
    }

    for captures in patterns.three_part.captures_iter(&cleaned) {
        let hit = captures.get(0).expect("full match");
        if span_within((hit.start(), hit.end()), &four_part_spans) {
            continue;
        }
        let database = clean_identifier(&captures["database"]).to_string();
        if EXCLUDED_DB_NAMES.contains(&database.to_ascii_lowercase().as_str()) {
            continue;
        }
        let schema = clean_identifier(&captures["schema"]).to_string();
        let object = clean_identifier(&captures["object"]).to_string();
        cross_database.insert((database, schema, object, "three_part_name".to_string()));
        signals.insert("three_part_name".to_string());
    }

    if !clr_signals.is_empty() {
        others.insert("EXT_CLR".to_string(), clr_signals.into_iter().collect());
        signals.insert("CLR".to_string());
    }

    if patterns.xp_cmdshell.is_match(&cleaned) {
        others.insert(
            "EXT_XP_CMDSHELL".to_string(),
            ["XP_CMDSHELL".to_string()].into_iter().collect(),
        );
        signals.insert("XP_CMDSHELL".to_string());
    }

    let mut linked_servers_list: Vec<LinkedServerDep> = linked_servers
        .into_iter()
        .map(|(name, signals)| LinkedServerDep {
            name,
            signals: signals.into_iter().collect(),
        })
        .collect();
    linked_servers_list.sort_by_key(|item| item.name.to_ascii_lowercase());

    let mut cross_database_list: Vec<CrossDatabaseDep> = cross_database
        .into_iter()
        .map(|(database, schema, object, kind)| CrossDatabaseDep { database, schema, object, kind })
        .collect();
    cross_database_list.sort_by_key(|item| {
        (
            item.database.to_ascii_lowercase(),
            item.schema.to_ascii_lowercase(),
            item.object.to_ascii_lowercase(),
        )
    });

    let remote_exec_list = build_target_list(remote_exec, "exec_at");
    let openquery_list = build_target_list(openquery, "openquery");
    let opendatasource_list = build_target_list(opendatasource, "opendatasource");

    let mut others_list: Vec<OtherDep> = others
        .into_iter()
        .map(|(id, signals)| OtherDep {
            kind: if id == "EXT_XP_CMDSHELL" { "xp_cmdshell".to_string() } else { "clr".to_string() },
            id,
            signals: signals.into_iter().collect(),
        })
        .collect();
    others_list.sort_by_key(|item| item.id.to_ascii_lowercase());

    let linked_servers_list =
        apply_limit(linked_servers_list, max_items, &mut errors, "linked_servers");
    let cross_database_list =
        apply_limit(cross_database_list, max_items, &mut errors, "cross_database");
    let remote_exec_list = apply_limit(remote_exec_list, max_items, &mut errors, "remote_exec");
    let openquery_list = apply_limit(openquery_list, max_items, &mut errors, "openquery");
    let opendatasource_list =
        apply_limit(opendatasource_list, max_items, &mut errors, "opendatasource");
    let others_list = apply_limit(others_list, max_items, &mut errors, "others");

    let summary = ExternalDepsSummary {
        has_external_deps: !(linked_servers_list.is_empty()
            && cross_database_list.is_empty()
            && remote_exec_list.is_empty()
            && openquery_list.is_empty()
            && opendatasource_list.is_empty()
            && others_list.is_empty()),
        linked_server_count: linked_servers_list.len(),
        cross_db_count: cross_database_list.len(),
        remote_exec_count: remote_exec_list.len(),
        openquery_count: openquery_list.len(),
        opendatasource_count: opendatasource_list.len(),
    };

    let mut signal_list = sorted_unique(signals.into_iter());
    signal_list.truncate(SIGNAL_LIMIT);

    ExternalDepsReport {
        version: VERSION.to_string(),
        object: ObjectInfo { name: name.to_string(), object_type: object_type.to_string() },
        summary,
        external_dependencies: ExternalDependencies {
            linked_servers: linked_servers_list,
            cross_database: cross_database_list,
            remote_exec: remote_exec_list,
            openquery: openquery_list,
            opendatasource: opendatasource_list,
            others: others_list,
        },
        signals: signal_list,
        errors,
    }
}

fn detect_clr_signals(sql: &str, case_insensitive: bool) -> Vec<String> {
    let flags = case_flags(case_insensitive);
    let mut signals: BTreeSet<String> = BTreeSet::new();
    if re(&format!(r"{flags}\bCREATE\s+ASSEMBLY\b")).is_match(sql) {
        signals.insert("CLR".to_string());
        signals.insert("CREATE ASSEMBLY".to_string());
    }
    if re(&format!(r"{flags}\bEXTERNAL_ACCESS\b")).is_match(sql) {
        signals.insert("CLR".to_string());
        signals.insert("EXTERNAL_ACCESS".to_string());
    }
    if re(&format!(r"{flags}\bUNSAFE\b")).is_match(sql) {
        signals.insert("CLR".to_string());
        signals.insert("UNSAFE".to_string());
    }
    if re(&format!(r"{flags}\bsp_configure\b\s*N?'[^']*clr\s+enabled[^']*'")).is_match(sql) {
        signals.insert("CLR".to_string());
        signals.insert("CLR_ENABLED".to_string());
    }
    signals.into_iter().collect()
}

fn build_target_list(targets: BTreeMap<String, BTreeSet<String>>, kind: &str) -> Vec<TargetDep> {
    let mut items: Vec<TargetDep> = targets
        .into_iter()
        .map(|(target, signals)| TargetDep {
            target,
            kind: kind.to_string(),
            signals: signals.into_iter().collect(),
        })
        .collect();
    items.sort_by_key(|item| item.target.to_ascii_lowercase());
    items
}

fn span_within(span: (usize, usize), spans: &[(usize, usize)]) -> bool {
    spans
        .iter()
        .any(|(start, end)| span.0 >= *start && span.1 <= *end)
}

fn apply_limit<T>(items: Vec<T>, max_items: usize, errors: &mut Vec<String>, label: &str) -> Vec<T> {
    if items.len() <= max_items {
        return items;
    }
    errors.push(format!("max_items_exceeded: {label} truncated to {max_items}"));
    let mut items = items;
    items.truncate(max_items);
    items
}
