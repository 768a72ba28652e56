//! POST /mcp/quality/performance-risk - performance anti-pattern findings.

use axum::Json;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::services::performance_risk::{PerformanceRiskReport, analyze_performance_risk};
use crate::utils::ApiResult;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(default)]
pub struct PerformanceRiskOptions {
    pub dialect: String,
    pub case_insensitive: bool,
    pub max_findings: usize,
}

impl Default for PerformanceRiskOptions {
    fn default() -> Self {
        Self { dialect: "tsql".to_string(), case_insensitive: true, max_findings: 50 }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PerformanceRiskRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[validate(length(min = 1))]
    pub sql: String,
    #[serde(default)]
    pub options: PerformanceRiskOptions,
}

#[utoipa::path(
    post,
    path = "/mcp/quality/performance-risk",
    request_body = PerformanceRiskRequest,
    responses((status = 200, description = "Performance risk findings", body = PerformanceRiskReport)),
    tag = "Quality"
)]
pub async fn performance_risk(
    Json(request): Json<PerformanceRiskRequest>,
) -> ApiResult<Json<PerformanceRiskReport>> {
    request.validate()?;
    Ok(Json(analyze_performance_risk(
        &request.name,
        &request.object_type,
        &request.sql,
        &request.options.dialect,
        request.options.max_findings,
    )))
}
