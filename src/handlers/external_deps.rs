//! POST /mcp/external-deps - external dependency inventory.

use axum::Json;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::services::external_deps::{ExternalDepsReport, analyze_external_dependencies};
use crate::utils::ApiResult;

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(default)]
pub struct ExternalDepsOptions {
    pub case_insensitive: bool,
    pub max_items: usize,
}

impl Default for ExternalDepsOptions {
    fn default() -> Self {
        Self { case_insensitive: true, max_items: 200 }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ExternalDepsRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[validate(length(min = 1))]
    pub sql: String,
    #[serde(default)]
    pub options: ExternalDepsOptions,
}

#[utoipa::path(
    post,
    path = "/mcp/external-deps",
    request_body = ExternalDepsRequest,
    responses((status = 200, description = "External dependencies", body = ExternalDepsReport)),
    tag = "Common"
)]
pub async fn external_deps(
    Json(request): Json<ExternalDepsRequest>,
) -> ApiResult<Json<ExternalDepsReport>> {
    request.validate()?;
    Ok(Json(analyze_external_dependencies(
        &request.name,
        &request.object_type,
        &request.sql,
        request.options.case_insensitive,
        request.options.max_items,
    )))
}
