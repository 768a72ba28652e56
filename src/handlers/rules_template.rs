//! POST /mcp/common/rules-template - business rule and template extraction.

use axum::Json;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::services::business_rules::{BusinessRulesReport, analyze_business_rules};
use crate::utils::ApiResult;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(default)]
pub struct BusinessRulesOptions {
    pub dialect: String,
    pub case_insensitive: bool,
    pub max_rules: usize,
    pub max_templates: usize,
}

impl Default for BusinessRulesOptions {
    fn default() -> Self {
        Self {
            dialect: "tsql".to_string(),
            case_insensitive: true,
            max_rules: 100,
            max_templates: 150,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BusinessRulesRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[validate(length(min = 1))]
    pub sql: String,
    #[serde(default)]
    pub options: BusinessRulesOptions,
}

#[utoipa::path(
    post,
    path = "/mcp/common/rules-template",
    request_body = BusinessRulesRequest,
    responses((status = 200, description = "Business rules and template suggestions", body = BusinessRulesReport)),
    tag = "Common"
)]
pub async fn rules_template(
    Json(request): Json<BusinessRulesRequest>,
) -> ApiResult<Json<BusinessRulesReport>> {
    request.validate()?;
    Ok(Json(analyze_business_rules(
        &request.name,
        &request.object_type,
        &request.sql,
        &request.options.dialect,
        request.options.case_insensitive,
        request.options.max_rules,
        request.options.max_templates,
    )))
}
