//! Database dependency scoring: linked servers, cross-database references,
//! remote execution, system objects, CLR, and tempdb pressure.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::analyzer::analyze_references;
use crate::services::reusability::{ObjectInfo, Recommendation};
use crate::services::safe_sql::{mask_strings, strip_comments, summarize};
use crate::utils::{re, sorted_unique};

pub const VERSION: &str = "4.2.0";

const EXCLUDED_DB_TOKENS: &[&str] = &["dbo", "sys", "information_schema"];

const IDENT: &str = r"[A-Za-z_][\w$#]*";

static FOUR_PART: Lazy<Regex> =
    Lazy::new(|| re(&format!(r"(?i)\b({IDENT})\.({IDENT})\.({IDENT})\.({IDENT})\b")));
static THREE_PART: Lazy<Regex> =
    Lazy::new(|| re(&format!(r"(?i)\b({IDENT})\.({IDENT})\.({IDENT})\b")));
static OPENQUERY: Lazy<Regex> = Lazy::new(|| re(&format!(r"(?i)\bOPENQUERY\s*\(\s*({IDENT})\s*,")));
static OPENDATASOURCE: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bOPENDATASOURCE\b"));
static EXEC_AT: Lazy<Regex> =
    Lazy::new(|| re(&format!(r"(?i)\bEXEC(?:UTE)?\b[^;]*?\bAT\s+({IDENT})")));
static XP_CMDSHELL: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bxp_cmdshell\b"));
static XP_OTHER: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bxp_[A-Za-z_][\w$#]*\b"));
static SP_OA: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bsp_OA\w+\b"));
static CLR: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\bCREATE\s+ASSEMBLY\b|\bEXTERNAL_ACCESS\b|\bUNSAFE\b|\bCLR\s+ENABLED\b"));
static TEMP_TABLE: Lazy<Regex> = Lazy::new(|| re(r"\B##?[A-Za-z_][\w$#]*\b"));
static TEMP_TABLE_CREATE: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\bCREATE\s+TABLE\s+##?[A-Za-z_][\w$#]*\b"));
static TEMP_TABLE_INSERT: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\bINSERT\s+INTO\s+##?[A-Za-z_][\w$#]*\b"));
static TABLE_VARIABLE: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bDECLARE\s+@\w+\s+TABLE\b"));
static BRACKETS: Lazy<Regex> = Lazy::new(|| re(r"\[([^\]]+)\]"));
static DOT_SPACING: Lazy<Regex> = Lazy::new(|| re(r"\s*\.\s*"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| re(r"\s+"));

const REASONS: &[(&str, &str)] = &[
    (
        "RSN_LINKED_SERVER",
        "Linked server usage increases environment coupling and deployment complexity.",
    ),
    ("RSN_CROSS_DB", "Cross-database references increase coupling across database boundaries."),
    ("RSN_REMOTE_EXEC", "Remote execution adds operational complexity and harder testing scenarios."),
    (
        "RSN_OPENQUERY",
        "OPENQUERY usage introduces linked server dependency and remote execution risks.",
    ),
    ("RSN_OPENDATASOURCE", "OPENDATASOURCE usage introduces ad-hoc external data source coupling."),
    ("RSN_XP_CMDSHELL", "xp_cmdshell usage adds operational and security risks."),
    ("RSN_SYSTEM_PROC", "System procedure usage increases dependency on SQL Server-specific features."),
    ("RSN_CLR", "CLR/external access features add deployment and security complexity."),
    ("RSN_TEMPDB", "Tempdb usage increases operational coupling and resource pressure."),
];

const RECOMMENDATION_MAP: &[(&str, &str, &str)] = &[
    (
        "RSN_LINKED_SERVER",
        "REC_REMOVE_LINKED_SERVER",
        "Replace linked server calls with application-side integration or dedicated services.",
    ),
    (
        "RSN_CROSS_DB",
        "REC_ISOLATE_EXTERNAL_DEPS",
        "Isolate cross-database logic behind a dedicated integration layer.",
    ),
    (
        "RSN_REMOTE_EXEC",
        "REC_ISOLATE_EXTERNAL_DEPS",
        "Isolate remote execution logic behind a dedicated integration layer.",
    ),
    (
        "RSN_OPENQUERY",
        "REC_REPLACE_OPENQUERY",
        "Replace OPENQUERY with managed integration or service calls when possible.",
    ),
    (
        "RSN_OPENDATASOURCE",
        "REC_ISOLATE_EXTERNAL_DEPS",
        "Avoid OPENDATASOURCE by centralizing external access in a controlled integration layer.",
    ),
    (
        "RSN_XP_CMDSHELL",
        "REC_REMOVE_XP_CMDSHELL",
        "Remove xp_cmdshell usage and replace with application-side orchestration.",
    ),
    (
        "RSN_SYSTEM_PROC",
        "REC_ISOLATE_EXTERNAL_DEPS",
        "Review system procedure usage and migrate to portable alternatives.",
    ),
    (
        "RSN_CLR",
        "REC_ISOLATE_EXTERNAL_DEPS",
        "Replace CLR/external access with application-side integrations.",
    ),
    (
        "RSN_TEMPDB",
        "REC_AVOID_TEMPDB_HOTSPOTS",
        "Limit tempdb usage by reducing temp tables or batching operations.",
    ),
];

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DependencySummary {
    pub dependency_score: i64,
    pub dependency_level: String,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DependencyMetrics {
    pub table_count: usize,
    pub function_call_count: usize,
    pub cross_database_count: usize,
    pub linked_server_count: usize,
    pub remote_exec_count: usize,
    pub openquery_count: usize,
    pub opendatasource_count: usize,
    pub system_proc_count: usize,
    pub xp_cmdshell_count: usize,
    pub clr_signal_count: usize,
    pub tempdb_pressure_signals: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LinkedServer {
    pub name: String,
    pub signals: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CrossDatabaseRef {
    pub database: String,
    pub schema: String,
    pub object: String,
    pub kind: String,
    pub signals: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RemoteExec {
    pub target: String,
    pub kind: String,
    pub signals: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TaggedSignals {
    pub id: String,
    pub signals: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DependencyInventory {
    pub cross_database: Vec<CrossDatabaseRef>,
    pub linked_servers: Vec<LinkedServer>,
    pub remote_exec: Vec<RemoteExec>,
    pub external_access: Vec<TaggedSignals>,
    pub system_objects: Vec<TaggedSignals>,
    pub tempdb_signals: Vec<TaggedSignals>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DependencyReason {
    pub id: String,
    pub weight: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DbDependencyReport {
    pub version: String,
    pub object: ObjectInfo,
    pub summary: DependencySummary,
    pub metrics: DependencyMetrics,
    pub dependencies: DependencyInventory,
    pub reasons: Vec<DependencyReason>,
    pub recommendations: Vec<Recommendation>,
    pub errors: Vec<String>,
}

#[allow(clippy::too_many_lines)]
pub fn analyze_db_dependency(
    name: &str,
    object_type: &str,
    sql: &str,
    dialect: &str,
    case_insensitive: bool,
    max_items: usize,
) -> DbDependencyReport {
    let summary = summarize(sql);
    tracing::info!(
        sql_len = summary.len,
        sql_hash = %summary.sha256_8,
        "analyze_db_dependency"
    );

    let stripped = strip_comments(sql);
    let masked = mask_strings(&stripped);
    let scan = WHITESPACE
        .replace_all(
            DOT_SPACING
                .replace_all(&BRACKETS.replace_all(&masked, "$1"), ".")
                .trim(),
            " ",
        )
        .into_owned();

    let fold = |value: &str| {
        if case_insensitive { value.to_ascii_lowercase() } else { value.to_string() }
    };

    let mut linked_servers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let add_linked = |servers: &mut BTreeMap<String, Vec<String>>, name: String, signal: &str| {
        let signals = servers.entry(name).or_default();
        if !signals.contains(&signal.to_string()) {
            signals.push(signal.to_string());
            signals.sort();
        }
    };

    let mut four_part_spans: Vec<(usize, usize)> = Vec::new();
    for captures in FOUR_PART.captures_iter(&scan) {
        let hit = captures.get(0).expect("full match");
        four_part_spans.push((hit.start(), hit.end()));
        add_linked(&mut linked_servers, fold(&captures[1]), "FOUR_PART");
    }

    let mut cross_database: BTreeMap<(String, String, String, String), CrossDatabaseRef> =
        BTreeMap::new();
    for captures in THREE_PART.captures_iter(&scan) {
        let hit = captures.get(0).expect("full match");
        if overlaps_any((hit.start(), hit.end()), &four_part_spans) {
            continue;
        }
        let db_token = captures[1].to_ascii_lowercase();
        if EXCLUDED_DB_TOKENS.contains(&db_token.as_str()) {
            continue;
        }
        let key = (
            fold(&captures[1]),
            fold(&captures[2]),
            fold(&captures[3]),
            "three_part_name".to_string(),
        );
        cross_database.entry(key.clone()).or_insert_with(|| CrossDatabaseRef {
            database: key.0.clone(),
            schema: key.1.clone(),
            object: key.2.clone(),
            kind: "three_part_name".to_string(),
            signals: vec!["THREE_PART".to_string()],
        });
    }

    let mut openquery_count = 0usize;
    for captures in OPENQUERY.captures_iter(&scan) {
        openquery_count += 1;
        add_linked(&mut linked_servers, fold(&captures[1]), "OPENQUERY");
    }

    let opendatasource_count = OPENDATASOURCE.find_iter(&scan).count();

    let mut remote_exec: BTreeMap<(String, String), RemoteExec> = BTreeMap::new();
    let mut remote_exec_count = 0usize;
    for captures in EXEC_AT.captures_iter(&scan) {
        remote_exec_count += 1;
        let server = fold(&captures[1]);
        add_linked(&mut linked_servers, server.clone(), "EXEC AT");
        remote_exec
            .entry((server.clone(), "exec_at".to_string()))
            .or_insert_with(|| RemoteExec {
                target: server,
                kind: "exec_at".to_string(),
                signals: vec!["EXEC AT".to_string()],
            });
    }

    let mut system_objects: BTreeMap<String, TaggedSignals> = BTreeMap::new();
    let xp_cmdshell_count = XP_CMDSHELL.find_iter(&scan).count();
    if xp_cmdshell_count > 0 {
        system_objects.insert(
            "SYS_XP_CMDSHELL".to_string(),
            TaggedSignals {
                id: "SYS_XP_CMDSHELL".to_string(),
                signals: vec!["xp_cmdshell".to_string()],
            },
        );
    }

    let mut system_proc_count = 0usize;
    let xp_other: Vec<&str> = XP_OTHER
        .find_iter(&scan)
        .map(|hit| hit.as_str())
        .filter(|hit| !hit.eq_ignore_ascii_case("xp_cmdshell"))
        .collect();
    if !xp_other.is_empty() {
        system_proc_count += xp_other.len();
        system_objects.insert(
            "SYS_XP_OTHER".to_string(),
            TaggedSignals { id: "SYS_XP_OTHER".to_string(), signals: vec!["xp_*".to_string()] },
        );
    }
    let sp_oa_count = SP_OA.find_iter(&scan).count();
    if sp_oa_count > 0 {
        system_proc_count += sp_oa_count;
        system_objects.insert(
            "SYS_OA_AUTOMATION".to_string(),
            TaggedSignals {
                id: "SYS_OA_AUTOMATION".to_string(),
                signals: vec!["sp_OA*".to_string()],
            },
        );
    }

    let mut external_access: BTreeMap<String, TaggedSignals> = BTreeMap::new();
    let clr_matches: Vec<String> = CLR
        .find_iter(&scan)
        .map(|hit| hit.as_str().to_string())
        .collect();
    let clr_signal_count = clr_matches.len();
    if clr_signal_count > 0 {
        let signals = sorted_unique(clr_matches.into_iter().map(|hit| {
            if hit.to_ascii_uppercase().contains("CREATE") {
                "CLR".to_string()
            } else {
                hit.trim().to_ascii_uppercase().replace(' ', "_")
            }
        }));
        external_access.insert(
            "EXT_CLR".to_string(),
            TaggedSignals { id: "EXT_CLR".to_string(), signals },
        );
    }

    let mut tempdb_signals: BTreeMap<String, TaggedSignals> = BTreeMap::new();
    let mut tempdb_pressure_signals = 0usize;
    let mut temp_table_signals = Vec::new();
    if TEMP_TABLE.is_match(&scan) {
        temp_table_signals.push("#temp".to_string());
    }
    if TEMP_TABLE_CREATE.is_match(&scan) {
        temp_table_signals.push("CREATE TABLE #".to_string());
    }
    if TEMP_TABLE_INSERT.is_match(&scan) {
        temp_table_signals.push("INSERT INTO #".to_string());
    }
    let temp_table_present = !temp_table_signals.is_empty();
    if temp_table_present {
        tempdb_pressure_signals += 1;
        tempdb_signals.insert(
            "TEMP_TABLE".to_string(),
            TaggedSignals {
                id: "TEMP_TABLE".to_string(),
                signals: sorted_unique(temp_table_signals),
            },
        );
    }
    let table_variable_present = TABLE_VARIABLE.is_match(&scan);
    if table_variable_present {
        tempdb_pressure_signals += 1;
        tempdb_signals.insert(
            "TABLE_VARIABLE".to_string(),
            TaggedSignals {
                id: "TABLE_VARIABLE".to_string(),
                signals: vec!["TABLE_VARIABLE".to_string()],
            },
        );
    }

    let references = analyze_references(sql, dialect);
    let table_count = references.references.tables.len();
    let function_call_count = references.references.functions.len();

    let linked_server_count = linked_servers.len();
    let cross_database_count = cross_database
        .values()
        .map(|item| fold(&item.database))
        .collect::<std::collections::BTreeSet<_>>()
        .len();

    let linked_server_points = score_linked_servers(linked_server_count);
    let cross_db_points = score_cross_db(cross_database_count);
    let remote_exec_points = if remote_exec_count > 0 { 25 } else { 0 };
    let openquery_points = if openquery_count > 0 { 15 } else { 0 };
    let opendatasource_points = if opendatasource_count > 0 { 15 } else { 0 };
    let open_source_points = (openquery_points + opendatasource_points).min(25);
    let xp_cmdshell_points = if xp_cmdshell_count > 0 { 40 } else { 0 };
    let system_proc_points = score_system_proc(system_proc_count);
    let clr_points = if clr_signal_count > 0 { 20 } else { 0 };
    let tempdb_points = score_tempdb(temp_table_present, table_variable_present);
    let table_scale_points = if table_count > 10 { 5 } else { 0 };

    let dependency_score = (linked_server_points
        + cross_db_points
        + remote_exec_points
        + open_source_points
        + xp_cmdshell_points
        + system_proc_points
        + clr_points
        + tempdb_points
        + table_scale_points)
        .min(100);

    let mut reasons: Vec<DependencyReason> = Vec::new();
    for (id, points) in [
        ("RSN_LINKED_SERVER", linked_server_points),
        ("RSN_CROSS_DB", cross_db_points),
        ("RSN_REMOTE_EXEC", remote_exec_points),
        ("RSN_OPENQUERY", openquery_points),
        ("RSN_OPENDATASOURCE", opendatasource_points),
        ("RSN_XP_CMDSHELL", xp_cmdshell_points),
        ("RSN_SYSTEM_PROC", system_proc_points),
        ("RSN_CLR", clr_points),
        ("RSN_TEMPDB", tempdb_points),
    ] {
        if points > 0 {
            let message = REASONS
                .iter()
                .find(|(reason_id, _)| *reason_id == id)
                .map(|(_, message)| *message)
                .unwrap_or_default();
            reasons.push(DependencyReason {
                id: id.to_string(),
                weight: points,
                message: message.to_string(),
            });
        }
    }
    reasons.sort_by(|a, b| {
        b.weight
            .abs()
            .cmp(&a.weight.abs())
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut recommendations: Vec<Recommendation> = Vec::new();
    for reason in &reasons {
        if let Some((_, rec_id, message)) = RECOMMENDATION_MAP
            .iter()
            .find(|(reason_id, _, _)| *reason_id == reason.id)
            && !recommendations.iter().any(|existing| existing.id == *rec_id)
        {
            recommendations.push(Recommendation {
                id: rec_id.to_string(),
                message: message.to_string(),
            });
        }
    }
    recommendations.sort_by(|a, b| a.id.cmp(&b.id));

    let dependencies = DependencyInventory {
        cross_database: cross_database.into_values().collect(),
        linked_servers: linked_servers
            .into_iter()
            .map(|(name, signals)| LinkedServer { name, signals })
            .collect(),
        remote_exec: remote_exec.into_values().collect(),
        external_access: external_access.into_values().collect(),
        system_objects: system_objects.into_values().collect(),
        tempdb_signals: tempdb_signals.into_values().collect(),
    };

    let (dependencies, truncated) = truncate_dependencies(dependencies, max_items);

    let mut errors = Vec::new();
    if truncated {
        errors.push(format!("dependency_items_truncated: max_items={max_items}"));
    }

    DbDependencyReport {
        version: VERSION.to_string(),
        object: ObjectInfo { name: name.to_string(), object_type: object_type.to_string() },
        summary: DependencySummary {
            dependency_score,
            dependency_level: score_level(dependency_score),
            truncated,
        },
        metrics: DependencyMetrics {
            table_count,
            function_call_count,
            cross_database_count,
            linked_server_count,
            remote_exec_count,
            openquery_count,
            opendatasource_count,
            system_proc_count,
            xp_cmdshell_count,
            clr_signal_count,
            tempdb_pressure_signals,
        },
        dependencies,
        reasons,
        recommendations,
        errors,
    }
}

fn overlaps_any(span: (usize, usize), spans: &[(usize, usize)]) -> bool {
    spans
        .iter()
        .any(|(start, end)| span.0 < *end && span.1 > *start)
}

fn score_linked_servers(count: usize) -> i64 {
    if count == 0 {
        return 0;
    }
    (35 + (count as i64 - 1) * 10).min(55)
}

fn score_cross_db(count: usize) -> i64 {
    if count == 0 {
        return 0;
    }
    (10 + (count as i64 - 1).max(0) * 2).min(20)
}

fn score_system_proc(count: usize) -> i64 {
    if count == 0 {
        return 0;
    }
    (10 * (count as i64).min(2)).min(20)
}

fn score_tempdb(temp_table: bool, table_variable: bool) -> i64 {
    let mut points = 0;
    if temp_table {
        points += 6;
    }
    if table_variable {
        points += 3;
    }
    points.min(10)
}

fn score_level(score: i64) -> String {
    if score >= 70 {
        "critical".to_string()
    } else if score >= 45 {
        "high".to_string()
    } else if score >= 20 {
        "medium".to_string()
    } else {
        "low".to_string()
    }
}

fn truncate_dependencies(
    dependencies: DependencyInventory,
    max_items: usize,
) -> (DependencyInventory, bool) {
    if max_items == 0 {
        return (
            DependencyInventory {
                cross_database: Vec::new(),
                linked_servers: Vec::new(),
                remote_exec: Vec::new(),
                external_access: Vec::new(),
                system_objects: Vec::new(),
                tempdb_signals: Vec::new(),
            },
            true,
        );
    }

    let mut remaining = max_items;
    let mut truncated = false;
    let mut take = |len: usize| {
        let kept = len.min(remaining);
        if kept < len {
            truncated = true;
        }
        remaining -= kept;
        kept
    };

    let mut dependencies = dependencies;
    let kept = take(dependencies.cross_database.len());
    dependencies.cross_database.truncate(kept);
    let kept = take(dependencies.linked_servers.len());
    dependencies.linked_servers.truncate(kept);
    let kept = take(dependencies.remote_exec.len());
    dependencies.remote_exec.truncate(kept);
    let kept = take(dependencies.external_access.len());
    dependencies.external_access.truncate(kept);
    let kept = take(dependencies.system_objects.len());
    dependencies.system_objects.truncate(kept);
    let kept = take(dependencies.tempdb_signals.len());
    dependencies.tempdb_signals.truncate(kept);

    (dependencies, truncated)
}
