//! POST /mcp/migration/mybatis-difficulty - migration difficulty scoring.

use axum::Json;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::services::mybatis_difficulty::{DifficultyReport, evaluate_mybatis_difficulty};
use crate::utils::ApiResult;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(default)]
pub struct DifficultyOptions {
    pub dialect: String,
    pub case_insensitive: bool,
    pub max_reason_items: usize,
}

impl Default for DifficultyOptions {
    fn default() -> Self {
        Self { dialect: "tsql".to_string(), case_insensitive: true, max_reason_items: 25 }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DifficultyRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[validate(length(min = 1))]
    pub sql: String,
    #[serde(default)]
    pub options: DifficultyOptions,
}

#[utoipa::path(
    post,
    path = "/mcp/migration/mybatis-difficulty",
    request_body = DifficultyRequest,
    responses((status = 200, description = "MyBatis difficulty evaluation", body = DifficultyReport)),
    tag = "Migration"
)]
pub async fn mybatis_difficulty(
    Json(request): Json<DifficultyRequest>,
) -> ApiResult<Json<DifficultyReport>> {
    request.validate()?;
    Ok(Json(evaluate_mybatis_difficulty(
        &request.name,
        &request.object_type,
        &request.sql,
        &request.options.dialect,
        request.options.case_insensitive,
        request.options.max_reason_items,
    )))
}
