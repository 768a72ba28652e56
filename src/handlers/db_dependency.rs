//! POST /mcp/quality/db-dependency - database dependency scoring.

use axum::Json;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::services::db_dependency::{DbDependencyReport, analyze_db_dependency};
use crate::utils::ApiResult;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(default)]
pub struct DbDependencyOptions {
    pub dialect: String,
    pub case_insensitive: bool,
    pub max_items: usize,
}

impl Default for DbDependencyOptions {
    fn default() -> Self {
        Self { dialect: "tsql".to_string(), case_insensitive: true, max_items: 200 }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DbDependencyRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[validate(length(min = 1))]
    pub sql: String,
    #[serde(default)]
    pub options: DbDependencyOptions,
}

#[utoipa::path(
    post,
    path = "/mcp/quality/db-dependency",
    request_body = DbDependencyRequest,
    responses((status = 200, description = "Database dependency analysis", body = DbDependencyReport)),
    tag = "Quality"
)]
pub async fn db_dependency(
    Json(request): Json<DbDependencyRequest>,
) -> ApiResult<Json<DbDependencyReport>> {
    request.validate()?;
    Ok(Json(analyze_db_dependency(
        &request.name,
        &request.object_type,
        &request.sql,
        &request.options.dialect,
        request.options.case_insensitive,
        request.options.max_items,
    )))
}
