//! Call graph construction over a corpus of SQL objects.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use once_cell::sync::Lazy;
use petgraph::algo::is_cyclic_directed;
use petgraph::graphmap::DiGraphMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::services::callers::SqlObject;
use crate::services::safe_sql::{strip_comments_and_strings, summarize};
use crate::utils::{normalize_full_name, re, split_schema_and_base};

pub const VERSION: &str = "2.4.0";

const SIGNAL_LIMIT: usize = 10;

const QUALIFIED_NAME: &str =
    r"(?:\[[^\]]+\]|[A-Za-z_][\w$#]*)(?:\s*\.\s*(?:\[[^\]]+\]|[A-Za-z_][\w$#]*))*";

static WHITESPACE: Lazy<Regex> = Lazy::new(|| re(r"\s+"));

/// Call-site patterns compiled per call so `case_insensitive` governs the
/// EXEC / CREATE FUNCTION keyword matches themselves.
struct CallPatterns {
    exec_call: Regex,
    function_call: Regex,
    function_definition: Regex,
}

fn build_patterns(case_insensitive: bool) -> CallPatterns {
    let flags = if case_insensitive { "(?i)" } else { "" };
    CallPatterns {
        exec_call: re(&format!(
            r"{flags}\b(?P<kind>EXEC(?:UTE)?)\s+(?P<name>{QUALIFIED_NAME})"
        )),
        function_call: re(&format!(r"{flags}\b(?P<name>{QUALIFIED_NAME})\s*\(")),
        function_definition: re(&format!(
            r"{flags}\b(?:CREATE|ALTER)\s+FUNCTION\s+(?P<name>{QUALIFIED_NAME})\s*\("
        )),
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(default)]
pub struct CallGraphOptions {
    pub case_insensitive: bool,
    pub schema_sensitive: bool,
    pub include_functions: bool,
    pub include_procedures: bool,
    pub ignore_dynamic_exec: bool,
    pub max_nodes: usize,
    pub max_edges: usize,
}

impl Default for CallGraphOptions {
    fn default() -> Self {
        Self {
            case_insensitive: true,
            schema_sensitive: false,
            include_functions: true,
            include_procedures: true,
            ignore_dynamic_exec: true,
            max_nodes: 500,
            max_edges: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CallGraphNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CallEdge {
    #[serde(rename = "from")]
    pub from_id: String,
    pub to: String,
    pub kind: String,
    pub count: usize,
    pub signals: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GraphError {
    pub id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CallGraphSummary {
    pub object_count: usize,
    pub node_count: usize,
    pub edge_count: usize,
    pub has_cycles: bool,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CallGraph {
    pub nodes: Vec<CallGraphNode>,
    pub edges: Vec<CallEdge>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Topology {
    pub roots: Vec<String>,
    pub leaves: Vec<String>,
    pub in_degree: BTreeMap<String, usize>,
    pub out_degree: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CallGraphReport {
    pub version: String,
    pub summary: CallGraphSummary,
    pub graph: CallGraph,
    pub topology: Topology,
    pub errors: Vec<GraphError>,
}

#[allow(clippy::too_many_lines)]
pub fn build_call_graph(objects: &[SqlObject], options: CallGraphOptions) -> CallGraphReport {
    let mut errors: Vec<GraphError> = Vec::new();
    tracing::info!(
        objects = objects.len(),
        include_functions = options.include_functions,
        include_procedures = options.include_procedures,
        "build_call_graph"
    );

    let filtered: Vec<&SqlObject> = objects
        .iter()
        .filter(|object| include_object(object, options))
        .collect();

    let mut nodes: Vec<CallGraphNode> = Vec::new();
    let mut node_ids: HashSet<String> = HashSet::new();
    let mut base_name_index: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut node_types: BTreeMap<String, String> = BTreeMap::new();

    for object in &filtered {
        let id = normalize_full_name(&object.name, options.case_insensitive);
        if id.is_empty() || node_ids.contains(&id) {
            continue;
        }
        node_ids.insert(id.clone());
        node_types.insert(id.clone(), object.object_type.to_ascii_lowercase());
        let (_, base) = split_schema_and_base(&id, false);
        base_name_index.entry(base).or_default().push(id.clone());
        nodes.push(CallGraphNode {
            id,
            name: object.name.clone(),
            object_type: object.object_type.clone(),
        });
    }

    let patterns = build_patterns(options.case_insensitive);
    let mut edge_stats: BTreeMap<(String, String, String), (usize, Vec<String>)> = BTreeMap::new();
    let mut ambiguous: HashSet<(String, String)> = HashSet::new();

    for object in &filtered {
        let caller_id = normalize_full_name(&object.name, options.case_insensitive);
        if !node_ids.contains(&caller_id) {
            continue;
        }

        let object_summary = summarize(&object.sql);
        tracing::info!(
            object = %object.name,
            sql_len = object_summary.len,
            sql_hash = %object_summary.sha256_8,
            "build_call_graph object"
        );

        let cleaned = WHITESPACE
            .replace_all(strip_comments_and_strings(&object.sql).trim(), " ")
            .into_owned();

        for captures in patterns.exec_call.captures_iter(&cleaned) {
            let name = &captures["name"];
            if options.ignore_dynamic_exec
                && normalize_full_name(name, options.case_insensitive).ends_with("sp_executesql")
            {
                continue;
            }
            let kind = captures["kind"].to_ascii_lowercase();
            let signal = if kind == "execute" { "EXECUTE" } else { "EXEC" };
            if let Some(target) = resolve_target(
                name,
                &base_name_index,
                &node_types,
                options,
                "procedure",
                &mut ambiguous,
                &object.name,
                &mut errors,
            ) {
                record_edge(&mut edge_stats, &caller_id, &target, &kind, signal);
            }
        }

        let definition_spans: HashSet<(usize, usize)> = patterns
            .function_definition
            .captures_iter(&cleaned)
            .filter_map(|captures| captures.name("name"))
            .map(|name| (name.start(), name.end()))
            .collect();
        for captures in patterns.function_call.captures_iter(&cleaned) {
            let name = captures.name("name").expect("name group");
            if definition_spans.contains(&(name.start(), name.end())) {
                continue;
            }
            if let Some(target) = resolve_target(
                name.as_str(),
                &base_name_index,
                &node_types,
                options,
                "function",
                &mut ambiguous,
                &object.name,
                &mut errors,
            ) {
                record_edge(&mut edge_stats, &caller_id, &target, "function_call", "FUNCTION");
            }
        }
    }

    nodes.sort_by(|a, b| a.id.cmp(&b.id));

    let mut truncated = false;
    if nodes.len() > options.max_nodes {
        nodes.truncate(options.max_nodes);
        truncated = true;
        errors.push(GraphError {
            id: "NODE_LIMIT_EXCEEDED".to_string(),
            message: format!("Node limit exceeded. max_nodes={}.", options.max_nodes),
            object: None,
        });
    }
    let kept_ids: BTreeSet<&str> = nodes.iter().map(|node| node.id.as_str()).collect();

    let mut edges: Vec<CallEdge> = edge_stats
        .into_iter()
        .filter(|((from, to, _), _)| {
            kept_ids.contains(from.as_str()) && kept_ids.contains(to.as_str())
        })
        .map(|((from_id, to, kind), (count, signals))| CallEdge {
            from_id,
            to,
            kind,
            count,
            signals,
        })
        .collect();
    edges.sort_by(|a, b| {
        a.from_id
            .cmp(&b.from_id)
            .then_with(|| a.to.cmp(&b.to))
            .then_with(|| a.kind.cmp(&b.kind))
    });
    if edges.len() > options.max_edges {
        edges.truncate(options.max_edges);
        truncated = true;
        errors.push(GraphError {
            id: "EDGE_LIMIT_EXCEEDED".to_string(),
            message: format!("Edge limit exceeded. max_edges={}.", options.max_edges),
            object: None,
        });
    }

    let topology = build_topology(&nodes, &edges);
    let has_cycles = detect_cycles(&edges);

    CallGraphReport {
        version: VERSION.to_string(),
        summary: CallGraphSummary {
            object_count: objects.len(),
            node_count: nodes.len(),
            edge_count: edges.len(),
            has_cycles,
            truncated,
        },
        graph: CallGraph { nodes, edges },
        topology,
        errors,
    }
}

fn include_object(object: &SqlObject, options: CallGraphOptions) -> bool {
    match object.object_type.to_ascii_lowercase().as_str() {
        "procedure" => options.include_procedures,
        "function" => options.include_functions,
        _ => options.include_procedures || options.include_functions,
    }
}

#[allow(clippy::too_many_arguments)]
fn resolve_target(
    name: &str,
    base_name_index: &BTreeMap<String, Vec<String>>,
    node_types: &BTreeMap<String, String>,
    options: CallGraphOptions,
    object_type: &str,
    ambiguous: &mut HashSet<(String, String)>,
    caller_name: &str,
    errors: &mut Vec<GraphError>,
) -> Option<String> {
    let normalized = normalize_full_name(name, options.case_insensitive);
    let (schema, base) = split_schema_and_base(&normalized, false);

    let is_target_type =
        |id: &str| node_types.get(id).is_some_and(|kind| kind.as_str() == object_type);

    if options.schema_sensitive {
        schema.as_ref()?;
        if is_target_type(&normalized) {
            return Some(normalized);
        }
        return None;
    }

    if schema.is_some() && is_target_type(&normalized) {
        return Some(normalized);
    }

    let candidates: Vec<&String> = base_name_index
        .get(&base)
        .map(|ids| ids.iter().filter(|id| is_target_type(id)).collect())
        .unwrap_or_default();
    match candidates.len() {
        0 => None,
        1 => Some(candidates[0].clone()),
        _ => {
            let key = (caller_name.to_string(), base.clone());
            if ambiguous.insert(key) {
                errors.push(GraphError {
                    id: "AMBIGUOUS_TARGET".to_string(),
                    message: format!("Call to {base} is ambiguous across schemas."),
                    object: Some(caller_name.to_string()),
                });
            }
            None
        }
    }
}

fn record_edge(
    edge_stats: &mut BTreeMap<(String, String, String), (usize, Vec<String>)>,
    from_id: &str,
    to: &str,
    kind: &str,
    signal: &str,
) {
    let entry = edge_stats
        .entry((from_id.to_string(), to.to_string(), kind.to_string()))
        .or_insert_with(|| (0, Vec::new()));
    entry.0 += 1;
    if !entry.1.contains(&signal.to_string()) && entry.1.len() < SIGNAL_LIMIT {
        entry.1.push(signal.to_string());
    }
}

fn build_topology(nodes: &[CallGraphNode], edges: &[CallEdge]) -> Topology {
    let mut in_degree: BTreeMap<String, usize> =
        nodes.iter().map(|node| (node.id.clone(), 0)).collect();
    let mut out_degree = in_degree.clone();

    for edge in edges {
        if let Some(degree) = out_degree.get_mut(&edge.from_id) {
            *degree += 1;
        }
        if let Some(degree) = in_degree.get_mut(&edge.to) {
            *degree += 1;
        }
    }

    let roots = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| id.clone())
        .collect();
    let leaves = out_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| id.clone())
        .collect();

    Topology { roots, leaves, in_degree, out_degree }
}

fn detect_cycles(edges: &[CallEdge]) -> bool {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for edge in edges {
        graph.add_edge(edge.from_id.as_str(), edge.to.as_str(), ());
    }
    is_cyclic_directed(&graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(name: &str, object_type: &str, sql: &str) -> SqlObject {
        SqlObject {
            name: name.to_string(),
            object_type: object_type.to_string(),
            sql: sql.to_string(),
        }
    }

    #[test]
    fn test_exec_and_function_edges() {
        let objects = vec![
            object("dbo.usp_A", "procedure", "CREATE PROCEDURE dbo.usp_A AS EXEC dbo.usp_B"),
            object("dbo.usp_B", "procedure", "CREATE PROCEDURE dbo.usp_B AS SELECT dbo.fn_C(1)"),
            object("dbo.fn_C", "function", "CREATE FUNCTION dbo.fn_C(@x INT) RETURNS INT AS BEGIN RETURN @x END"),
        ];
        let report = build_call_graph(&objects, CallGraphOptions::default());
        assert_eq!(report.summary.node_count, 3);
        assert_eq!(report.summary.edge_count, 2);
        let ids: Vec<_> = report.graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["dbo.fn_c", "dbo.usp_a", "dbo.usp_b"]);
        let edge_keys: Vec<_> = report
            .graph
            .edges
            .iter()
            .map(|e| (e.from_id.as_str(), e.to.as_str(), e.kind.as_str()))
            .collect();
        assert_eq!(
            edge_keys,
            vec![
                ("dbo.usp_a", "dbo.usp_b", "exec"),
                ("dbo.usp_b", "dbo.fn_c", "function_call"),
            ]
        );
        assert!(!report.summary.has_cycles);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_ambiguous_base_name_drops_edge() {
        let objects = vec![
            object("dbo.usp_A", "procedure", "EXEC usp_X"),
            object("dbo.usp_X", "procedure", "SELECT 1"),
            object("audit.usp_X", "procedure", "SELECT 2"),
        ];
        let report = build_call_graph(&objects, CallGraphOptions::default());
        assert_eq!(report.summary.edge_count, 0);
        let ambiguity = report
            .errors
            .iter()
            .find(|e| e.id == "AMBIGUOUS_TARGET")
            .expect("ambiguity error");
        assert_eq!(ambiguity.object.as_deref(), Some("dbo.usp_A"));
        assert!(ambiguity.message.contains("usp_x"));
        // One error per (caller, base) pair even with repeated calls.
        assert_eq!(
            report
                .errors
                .iter()
                .filter(|e| e.id == "AMBIGUOUS_TARGET")
                .count(),
            1
        );
    }

    #[test]
    fn test_edge_dedup_increments_count() {
        let objects = vec![
            object("dbo.usp_A", "procedure", "EXEC dbo.usp_B; EXECUTE dbo.usp_B;"),
            object("dbo.usp_B", "procedure", "SELECT 1"),
        ];
        let report = build_call_graph(&objects, CallGraphOptions::default());
        assert_eq!(report.summary.edge_count, 1);
        let edge = &report.graph.edges[0];
        assert_eq!(edge.count, 2);
        assert_eq!(edge.signals, vec!["EXEC", "EXECUTE"]);
    }

    #[test]
    fn test_cycle_detection() {
        let objects = vec![
            object("dbo.usp_A", "procedure", "EXEC dbo.usp_B"),
            object("dbo.usp_B", "procedure", "EXEC dbo.usp_A"),
        ];
        let report = build_call_graph(&objects, CallGraphOptions::default());
        assert!(report.summary.has_cycles);
    }

    #[test]
    fn test_sp_executesql_ignored() {
        let objects = vec![
            object("dbo.usp_A", "procedure", "EXEC sp_executesql @stmt"),
            object("dbo.sp_executesql", "procedure", "SELECT 1"),
        ];
        let report = build_call_graph(&objects, CallGraphOptions::default());
        assert_eq!(report.summary.edge_count, 0);
    }

    #[test]
    fn test_function_definition_span_not_an_edge() {
        let objects = vec![object(
            "dbo.fn_C",
            "function",
            "CREATE FUNCTION dbo.fn_C(@x INT) RETURNS INT AS BEGIN RETURN @x END",
        )];
        let report = build_call_graph(&objects, CallGraphOptions::default());
        assert_eq!(report.summary.edge_count, 0);
    }

    #[test]
    fn test_topology_roots_and_leaves() {
        let objects = vec![
            object("dbo.usp_A", "procedure", "EXEC dbo.usp_B"),
            object("dbo.usp_B", "procedure", "SELECT 1"),
        ];
        let report = build_call_graph(&objects, CallGraphOptions::default());
        assert_eq!(report.topology.roots, vec!["dbo.usp_a"]);
        assert_eq!(report.topology.leaves, vec!["dbo.usp_b"]);
        assert_eq!(report.topology.in_degree["dbo.usp_b"], 1);
        assert_eq!(report.topology.out_degree["dbo.usp_a"], 1);
    }

    #[test]
    fn test_case_sensitive_exec_keyword() {
        let options = CallGraphOptions { case_insensitive: false, ..CallGraphOptions::default() };
        let objects = vec![
            object("dbo.usp_A", "procedure", "exec dbo.usp_B"),
            object("dbo.usp_B", "procedure", "SELECT 1"),
        ];
        let report = build_call_graph(&objects, options);
        assert_eq!(report.summary.edge_count, 0);

        let objects = vec![
            object("dbo.usp_A", "procedure", "EXEC dbo.usp_B"),
            object("dbo.usp_B", "procedure", "SELECT 1"),
        ];
        let report = build_call_graph(&objects, options);
        assert_eq!(report.summary.edge_count, 1);
    }

    #[test]
    fn test_node_limit_truncates() {
        let objects: Vec<SqlObject> = (0..6)
            .map(|index| object(&format!("dbo.usp_{index}"), "procedure", "SELECT 1"))
            .collect();
        let options = CallGraphOptions { max_nodes: 4, ..CallGraphOptions::default() };
        let report = build_call_graph(&objects, options);
        assert_eq!(report.summary.node_count, 4);
        assert!(report.summary.truncated);
        assert!(report.errors.iter().any(|e| e.id == "NODE_LIMIT_EXCEEDED"));
    }

    #[test]
    fn test_filters_exclude_functions() {
        let objects = vec![
            object("dbo.usp_A", "procedure", "SELECT dbo.fn_C(1)"),
            object("dbo.fn_C", "function", "SELECT 1"),
        ];
        let options = CallGraphOptions { include_functions: false, ..CallGraphOptions::default() };
        let report = build_call_graph(&objects, options);
        assert_eq!(report.summary.node_count, 1);
        assert_eq!(report.summary.edge_count, 0);
    }
}
