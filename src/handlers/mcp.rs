//! Streamable HTTP JSON-RPC adapter over the same analyzer surface.
//!
//! Implements initialize / tools/list / tools/call / ping. Notifications
//! (no id) return 202, GET returns 405, and an unsupported
//! MCP-Protocol-Version header is rejected with 400.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

use crate::AppState;
use crate::handlers::analyze::{AnalyzeRequest, run_analysis};

pub const PROTOCOL_VERSION: &str = "2025-11-25";
pub const SERVER_NAME: &str = "mssql-migration-mcp-server";
pub const SERVER_VERSION: &str = "0.1.0";

const TOOL_ANALYZE: &str = "tsql.analyze";

fn jsonrpc_result(id: &Value, result: Value) -> Response {
    (StatusCode::OK, Json(json!({ "jsonrpc": "2.0", "id": id, "result": result }))).into_response()
}

fn jsonrpc_error(id: &Value, code: i64, message: &str) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": code, "message": message }
        })),
    )
        .into_response()
}

fn handle_initialize() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": SERVER_VERSION,
            "description": "MSSQL SP/FN analysis + migration guidance MCP server",
        },
        "instructions": "Call tools/list then tools/call for SQL analysis outputs.",
    })
}

fn handle_tools_list() -> Value {
    json!({
        "tools": [
            {
                "name": TOOL_ANALYZE,
                "description": "Analyze a T-SQL statement for references, transactions, control flow, data changes, and migration impacts.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "sql": { "type": "string", "description": "T-SQL text to analyze." },
                        "dialect": {
                            "type": "string",
                            "description": "SQL dialect (default: tsql).",
                            "default": "tsql",
                        },
                    },
                    "required": ["sql"],
                },
                "outputSchema": {
                    "type": "object",
                    "properties": {
                        "version": { "type": "string" },
                        "references": { "type": "object" },
                        "transactions": { "type": "object" },
                        "migration_impacts": { "type": "object" },
                        "control_flow": { "type": "object" },
                        "data_changes": { "type": "object" },
                        "error_handling": { "type": "object" },
                        "errors": { "type": "array", "items": { "type": "string" } },
                    },
                },
            }
        ]
    })
}

fn tool_result(summary: &str, structured_content: Option<Value>, is_error: bool) -> Value {
    json!({
        "content": [{ "type": "text", "text": summary }],
        "structuredContent": structured_content.unwrap_or_else(|| json!({})),
        "isError": is_error,
    })
}

fn handle_tools_call(params: &Value) -> Value {
    let Some(name) = params.get("name").and_then(Value::as_str) else {
        return tool_result("Tool name is required.", None, true);
    };
    if name != TOOL_ANALYZE {
        return tool_result(&format!("Unknown tool: {name}."), None, true);
    }
    let Some(arguments) = params.get("arguments").filter(|value| value.is_object()) else {
        return tool_result("Tool arguments must be an object.", None, true);
    };

    let request: AnalyzeRequest = match serde_json::from_value(arguments.clone()) {
        Ok(request) => request,
        Err(error) => {
            return tool_result(&format!("Tool execution failed: {error}."), None, true);
        }
    };
    if request.sql.is_empty() {
        return tool_result("Tool execution failed: sql must not be empty.", None, true);
    }

    let response = run_analysis(&request.sql, &request.dialect);
    let summary = format!(
        "Analysis complete. tables={}, functions={}, errors={}.",
        response.references.tables.len(),
        response.references.functions.len(),
        response.errors.len()
    );
    let payload = serde_json::to_value(&response).unwrap_or_else(|_| json!({}));
    tool_result(&summary, Some(payload), false)
}

fn protocol_version_supported(headers: &HeaderMap, supported: &[String]) -> bool {
    match headers
        .get("MCP-Protocol-Version")
        .and_then(|value| value.to_str().ok())
    {
        Some(version) => supported.iter().any(|candidate| candidate == version),
        None => true,
    }
}

pub async fn mcp_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Option<Json<Value>>,
) -> Response {
    if !protocol_version_supported(&headers, &state.config.mcp.supported_protocol_versions) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "Unsupported MCP-Protocol-Version" })),
        )
            .into_response();
    }

    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "detail": "Invalid JSON payload" })))
            .into_response();
    };
    if !payload.is_object() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "Invalid JSON-RPC payload" })),
        )
            .into_response();
    }

    let method = payload.get("method").and_then(Value::as_str);
    if method == Some("notifications/initialized") {
        return StatusCode::ACCEPTED.into_response();
    }

    let id = payload.get("id").cloned();
    let (Some(method), Some(id)) = (method, id) else {
        return StatusCode::ACCEPTED.into_response();
    };

    let params = payload.get("params").cloned().unwrap_or_else(|| json!({}));
    if !params.is_object() {
        return jsonrpc_error(&id, -32602, "Invalid params");
    }

    match method {
        "initialize" => jsonrpc_result(&id, handle_initialize()),
        "tools/list" => jsonrpc_result(&id, handle_tools_list()),
        "tools/call" => jsonrpc_result(&id, handle_tools_call(&params)),
        "ping" => jsonrpc_result(&id, json!({})),
        other => jsonrpc_error(&id, -32601, &format!("Method not found: {other}")),
    }
}

pub async fn mcp_get() -> Response {
    StatusCode::METHOD_NOT_ALLOWED.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tools_list_contains_analyze() {
        let tools = handle_tools_list();
        let names: Vec<&str> = tools["tools"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|tool| tool["name"].as_str())
            .collect();
        assert_eq!(names, vec![TOOL_ANALYZE]);
    }

    #[test]
    fn test_initialize_shape() {
        let result = handle_initialize();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert!(result["capabilities"]["tools"]["listChanged"].is_boolean());
    }

    #[test]
    fn test_tools_call_unknown_tool() {
        let result = handle_tools_call(&json!({ "name": "nope", "arguments": {} }));
        assert_eq!(result["isError"], true);
    }

    #[test]
    fn test_tools_call_analyze() {
        let result = handle_tools_call(&json!({
            "name": TOOL_ANALYZE,
            "arguments": { "sql": "SELECT 1" }
        }));
        assert_eq!(result["isError"], false);
        assert_eq!(result["structuredContent"]["version"], "0.6");
        assert!(
            result["content"][0]["text"]
                .as_str()
                .unwrap()
                .starts_with("Analysis complete.")
        );
    }

    #[test]
    fn test_tools_call_requires_object_arguments() {
        let result = handle_tools_call(&json!({ "name": TOOL_ANALYZE, "arguments": "sql" }));
        assert_eq!(result["isError"], true);
    }

    #[test]
    fn test_protocol_version_check() {
        let supported = vec!["2025-03-26".to_string(), "2025-11-25".to_string()];
        let mut headers = HeaderMap::new();
        assert!(protocol_version_supported(&headers, &supported));
        headers.insert("MCP-Protocol-Version", "2025-11-25".parse().unwrap());
        assert!(protocol_version_supported(&headers, &supported));
        headers.insert("MCP-Protocol-Version", "1999-01-01".parse().unwrap());
        assert!(!protocol_version_supported(&headers, &supported));
    }
}
