//! Control flow summary and synthesized graph.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::safe_sql::{strip_comments_and_strings, summarize};
use crate::services::sql_parser;
use crate::utils::{SignalList, re};

static CONTROL_TOKEN: Lazy<Regex> = Lazy::new(|| {
    re(r"(?i)(?P<begin_try>\bBEGIN\s+TRY\b)|(?P<begin_catch>\bBEGIN\s+CATCH\b)|(?P<if>\bIF\b)|(?P<while>\bWHILE\b)|(?P<return>\bRETURN\b)|(?P<goto>\bGOTO\b)")
});
static LABEL: Lazy<Regex> = Lazy::new(|| re(r"(?im)^[ \t]*[A-Za-z_]\w*\s*:\s*$"));
static NESTING_TOKEN: Lazy<Regex> = Lazy::new(|| {
    re(r"(?i)(?P<begin_try>\bBEGIN\s+TRY\b)|(?P<begin_catch>\bBEGIN\s+CATCH\b)|(?P<end_try>\bEND\s+TRY\b)|(?P<end_catch>\bEND\s+CATCH\b)|(?P<begin>\bBEGIN\b)|(?P<end>\bEND\b)|(?P<if>\bIF\b)|(?P<while>\bWHILE\b)")
});

const NODE_LIMIT: usize = 200;
const EDGE_LIMIT: usize = 400;
const SIGNAL_CAP: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    If,
    While,
    Try,
    Catch,
    Return,
    Goto,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ControlFlowSummary {
    pub has_branching: bool,
    pub has_loops: bool,
    pub has_try_catch: bool,
    pub has_goto: bool,
    pub has_return: bool,
    pub branch_count: usize,
    pub loop_count: usize,
    pub return_count: usize,
    pub goto_count: usize,
    pub max_nesting_depth: usize,
    pub cyclomatic_complexity: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GraphEdge {
    #[serde(rename = "from")]
    pub from_id: String,
    pub to: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ControlFlow {
    pub summary: ControlFlowSummary,
    pub graph: Graph,
    pub signals: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ControlFlowResult {
    pub control_flow: ControlFlow,
    pub errors: Vec<String>,
}

/// Token-scan summary plus a synthesized start -> tokens -> end graph.
pub fn analyze_control_flow(sql: &str, dialect: &str) -> ControlFlowResult {
    let summary = summarize(sql);
    tracing::info!(
        sql_len = summary.len,
        sql_hash = %summary.sha256_8,
        "analyze_control_flow"
    );

    let mut errors = Vec::new();
    if let Err(parse_error) = sql_parser::parse_statements(sql, dialect) {
        errors.push(parse_error);
    }

    let scan = strip_comments_and_strings(sql);
    let tokens = scan_tokens(&scan);
    let label_count = LABEL.find_iter(&scan).count();

    let branch_count = tokens.iter().filter(|t| **t == Token::If).count();
    let loop_count = tokens.iter().filter(|t| **t == Token::While).count();
    let try_count = tokens.iter().filter(|t| **t == Token::Try).count();
    let catch_count = tokens.iter().filter(|t| **t == Token::Catch).count();
    let return_count = tokens.iter().filter(|t| **t == Token::Return).count();
    let goto_count = tokens.iter().filter(|t| **t == Token::Goto).count();

    let has_try_catch = try_count > 0 || catch_count > 0;
    let cyclomatic_complexity = 1
        + branch_count
        + loop_count
        + usize::from(has_try_catch)
        + usize::from(goto_count > 0);

    let mut signals = SignalList::new(SIGNAL_CAP);
    for token in &tokens {
        match token {
            Token::If => signals.push("IF"),
            Token::While => signals.push("WHILE"),
            Token::Try | Token::Catch => signals.push("TRY/CATCH"),
            Token::Return => signals.push("RETURN"),
            Token::Goto => signals.push("GOTO"),
        }
    }
    if label_count > 0 {
        signals.push("LABEL");
    }

    let (graph, graph_errors) = build_graph(&tokens);
    errors.extend(graph_errors);

    ControlFlowResult {
        control_flow: ControlFlow {
            summary: ControlFlowSummary {
                has_branching: branch_count > 0,
                has_loops: loop_count > 0,
                has_try_catch,
                has_goto: goto_count > 0,
                has_return: return_count > 0,
                branch_count,
                loop_count,
                return_count,
                goto_count,
                max_nesting_depth: estimate_nesting_depth(&scan),
                cyclomatic_complexity,
            },
            graph,
            signals: signals.into_vec(),
        },
        errors,
    }
}

fn scan_tokens(sql: &str) -> Vec<Token> {
    CONTROL_TOKEN
        .captures_iter(sql)
        .filter_map(|captures| {
            if captures.name("begin_try").is_some() {
                Some(Token::Try)
            } else if captures.name("begin_catch").is_some() {
                Some(Token::Catch)
            } else if captures.name("if").is_some() {
                Some(Token::If)
            } else if captures.name("while").is_some() {
                Some(Token::While)
            } else if captures.name("return").is_some() {
                Some(Token::Return)
            } else if captures.name("goto").is_some() {
                Some(Token::Goto)
            } else {
                None
            }
        })
        .collect()
}

fn estimate_nesting_depth(sql: &str) -> usize {
    let mut depth: usize = 0;
    let mut max_depth: usize = 0;
    for captures in NESTING_TOKEN.captures_iter(sql) {
        let increases = captures.name("begin_try").is_some()
            || captures.name("begin_catch").is_some()
            || captures.name("begin").is_some()
            || captures.name("if").is_some()
            || captures.name("while").is_some();
        let decreases = captures.name("end_try").is_some()
            || captures.name("end_catch").is_some()
            || captures.name("end").is_some();
        if increases {
            depth += 1;
            max_depth = max_depth.max(depth);
        } else if decreases {
            depth = depth.saturating_sub(1);
        }
    }
    max_depth
}

fn build_graph(tokens: &[Token]) -> (Graph, Vec<String>) {
    let mut errors = Vec::new();
    let mut nodes = vec![GraphNode {
        id: "n0".to_string(),
        node_type: "start".to_string(),
        label: "START".to_string(),
    }];

    for (index, token) in tokens.iter().enumerate() {
        let (node_type, label) = match token {
            Token::If => ("if", "IF"),
            Token::While => ("while", "WHILE"),
            Token::Try => ("try", "TRY"),
            Token::Catch => ("catch", "CATCH"),
            Token::Return => ("return", "RETURN"),
            Token::Goto => ("goto", "GOTO"),
        };
        nodes.push(GraphNode {
            id: format!("n{}", index + 1),
            node_type: node_type.to_string(),
            label: label.to_string(),
        });
    }

    nodes.push(GraphNode {
        id: format!("n{}", nodes.len()),
        node_type: "end".to_string(),
        label: "END".to_string(),
    });

    if nodes.len() > NODE_LIMIT {
        errors.push("control_flow_graph_truncated: node_limit_exceeded".to_string());
        nodes.truncate(NODE_LIMIT - 1);
        nodes.push(GraphNode {
            id: format!("n{}", nodes.len()),
            node_type: "end".to_string(),
            label: "END".to_string(),
        });
    }

    let end_id = nodes[nodes.len() - 1].id.clone();
    let mut edges = Vec::new();
    for index in 0..nodes.len() - 1 {
        let current = &nodes[index];
        let next = &nodes[index + 1];
        match current.node_type.as_str() {
            "if" => {
                edges.push(edge(&current.id, &next.id, "true"));
                edges.push(edge(&current.id, &next.id, "false"));
            }
            "while" => {
                edges.push(edge(&current.id, &current.id, "loop"));
                edges.push(edge(&current.id, &next.id, "exit"));
            }
            "try" => {
                if next.node_type == "catch" {
                    edges.push(edge(&current.id, &next.id, "on_error"));
                    if let Some(follow) = nodes.get(index + 2) {
                        edges.push(edge(&current.id, &follow.id, "next"));
                    }
                } else {
                    edges.push(edge(&current.id, &next.id, "next"));
                }
            }
            "return" => edges.push(edge(&current.id, &end_id, "return")),
            "goto" => edges.push(edge(&current.id, &end_id, "goto")),
            _ => edges.push(edge(&current.id, &next.id, "next")),
        }
    }

    if edges.len() > EDGE_LIMIT {
        errors.push("control_flow_graph_truncated: edge_limit_exceeded".to_string());
        edges.truncate(EDGE_LIMIT);
    }

    (Graph { nodes, edges }, errors)
}

fn edge(from_id: &str, to: &str, label: &str) -> GraphEdge {
    GraphEdge { from_id: from_id.to_string(), to: to.to_string(), label: label.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_line_sql() {
        let result = analyze_control_flow("SELECT 1", "tsql");
        let summary = &result.control_flow.summary;
        assert_eq!(summary.cyclomatic_complexity, 1);
        assert!(!summary.has_branching);
        assert_eq!(result.control_flow.graph.nodes.len(), 2);
        assert_eq!(result.control_flow.graph.edges.len(), 1);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_branch_and_loop_complexity() {
        let sql = "IF @x = 1 SELECT 1; WHILE @y < 10 SET @y = @y + 1; IF @z = 2 SELECT 2;";
        let summary = analyze_control_flow(sql, "tsql").control_flow.summary;
        assert_eq!(summary.branch_count, 2);
        assert_eq!(summary.loop_count, 1);
        // 1 + 2 ifs + 1 while
        assert_eq!(summary.cyclomatic_complexity, 4);
    }

    #[test]
    fn test_try_catch_counts_once() {
        let sql = "BEGIN TRY SELECT 1 END TRY BEGIN CATCH SELECT 2 END CATCH";
        let summary = analyze_control_flow(sql, "tsql").control_flow.summary;
        assert!(summary.has_try_catch);
        assert_eq!(summary.cyclomatic_complexity, 2);
    }

    #[test]
    fn test_if_edges_true_false() {
        let result = analyze_control_flow("IF @x = 1 RETURN", "tsql");
        let graph = &result.control_flow.graph;
        // start, if, return, end
        assert_eq!(graph.nodes.len(), 4);
        let labels: Vec<_> = graph.edges.iter().map(|e| e.label.as_str()).collect();
        assert!(labels.contains(&"true"));
        assert!(labels.contains(&"false"));
        assert!(labels.contains(&"return"));
    }

    #[test]
    fn test_while_self_loop() {
        let result = analyze_control_flow("WHILE @x < 5 SET @x = @x + 1", "tsql");
        let graph = &result.control_flow.graph;
        let loop_edge = graph.edges.iter().find(|e| e.label == "loop").unwrap();
        assert_eq!(loop_edge.from_id, loop_edge.to);
    }

    #[test]
    fn test_nesting_depth() {
        let sql = "BEGIN IF @a = 1 BEGIN WHILE @b < 2 BEGIN SET @b = @b + 1 END END END";
        let summary = analyze_control_flow(sql, "tsql").control_flow.summary;
        assert!(summary.max_nesting_depth >= 4);
    }

    #[test]
    fn test_node_cap_truncates_with_error() {
        let sql = "IF @x = 1 SELECT 1;\n".repeat(300);
        let result = analyze_control_flow(&sql, "tsql");
        assert!(result.control_flow.graph.nodes.len() <= NODE_LIMIT);
        assert!(
            result
                .errors
                .iter()
                .any(|e| e.contains("node_limit_exceeded"))
        );
    }

    #[test]
    fn test_tokens_in_comments_ignored() {
        let sql = "SELECT 1 -- IF WHILE GOTO\n/* RETURN */";
        let summary = analyze_control_flow(sql, "tsql").control_flow.summary;
        assert_eq!(summary.cyclomatic_complexity, 1);
    }
}
