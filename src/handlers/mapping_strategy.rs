//! POST /mcp/migration/mapping-strategy - Java/MyBatis mapping strategy.

use axum::Json;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::services::mapping_strategy::{MappingStrategyReport, recommend_mapping_strategy};
use crate::utils::ApiResult;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(default)]
pub struct MappingStrategyOptions {
    pub dialect: String,
    pub case_insensitive: bool,
    pub target_style: String,
    pub max_items: usize,
}

impl Default for MappingStrategyOptions {
    fn default() -> Self {
        Self {
            dialect: "tsql".to_string(),
            case_insensitive: true,
            target_style: "rewrite".to_string(),
            max_items: 30,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MappingStrategyRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[validate(length(min = 1))]
    pub sql: String,
    #[serde(default)]
    pub options: MappingStrategyOptions,
}

#[utoipa::path(
    post,
    path = "/mcp/migration/mapping-strategy",
    request_body = MappingStrategyRequest,
    responses((status = 200, description = "Mapping strategy recommendation", body = MappingStrategyReport)),
    tag = "Migration"
)]
pub async fn mapping_strategy(
    Json(request): Json<MappingStrategyRequest>,
) -> ApiResult<Json<MappingStrategyReport>> {
    request.validate()?;
    Ok(Json(recommend_mapping_strategy(
        &request.name,
        &request.object_type,
        &request.sql,
        &request.options.dialect,
        &request.options.target_style,
        request.options.max_items,
    )))
}
