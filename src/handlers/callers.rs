//! POST /mcp/callers - find callers of a target object in a corpus.

use axum::Json;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::services::callers::{CallerOptions, CallersReport, SqlObject, find_callers, infer_target_type};
use crate::utils::{ApiError, ApiResult};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CallersRequest {
    pub target: String,
    #[serde(default)]
    pub target_type: Option<String>,
    pub objects: Vec<SqlObject>,
    #[serde(default)]
    pub options: CallerOptions,
}

#[utoipa::path(
    post,
    path = "/mcp/callers",
    request_body = CallersRequest,
    responses((status = 200, description = "Callers of the target object", body = CallersReport)),
    tag = "Common"
)]
pub async fn callers(Json(request): Json<CallersRequest>) -> ApiResult<Json<CallersReport>> {
    if request.target.trim().is_empty() {
        return Err(ApiError::validation("target must not be empty"));
    }
    let target_type = infer_target_type(&request.target, request.target_type.as_deref());
    Ok(Json(find_callers(
        &request.target,
        &target_type,
        &request.objects,
        request.options,
    )))
}
