//! POST /mcp/common/call-graph - build the corpus call graph.

use axum::Json;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::services::call_graph::{CallGraphOptions, CallGraphReport, build_call_graph};
use crate::services::callers::SqlObject;
use crate::utils::ApiResult;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CallGraphRequest {
    pub objects: Vec<SqlObject>,
    #[serde(default)]
    pub options: CallGraphOptions,
}

#[utoipa::path(
    post,
    path = "/mcp/common/call-graph",
    request_body = CallGraphRequest,
    responses((status = 200, description = "Call graph with topology", body = CallGraphReport)),
    tag = "Common"
)]
pub async fn call_graph(
    Json(request): Json<CallGraphRequest>,
) -> ApiResult<Json<CallGraphReport>> {
    Ok(Json(build_call_graph(&request.objects, request.options)))
}
