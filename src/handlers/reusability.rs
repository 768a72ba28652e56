//! POST /mcp/common/reusability - reusability candidacy scoring.

use axum::Json;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::services::reusability::{ReusabilityReport, evaluate_reusability};
use crate::utils::ApiResult;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(default)]
pub struct ReusabilityOptions {
    pub dialect: String,
    pub max_reason_items: usize,
}

impl Default for ReusabilityOptions {
    fn default() -> Self {
        Self { dialect: "tsql".to_string(), max_reason_items: 20 }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReusabilityRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[validate(length(min = 1))]
    pub sql: String,
    #[serde(default)]
    pub options: ReusabilityOptions,
}

#[utoipa::path(
    post,
    path = "/mcp/common/reusability",
    request_body = ReusabilityRequest,
    responses((status = 200, description = "Reusability evaluation", body = ReusabilityReport)),
    tag = "Common"
)]
pub async fn reusability(
    Json(request): Json<ReusabilityRequest>,
) -> ApiResult<Json<ReusabilityReport>> {
    request.validate()?;
    Ok(Json(evaluate_reusability(
        &request.name,
        &request.object_type,
        &request.sql,
        &request.options.dialect,
        request.options.max_reason_items,
    )))
}
