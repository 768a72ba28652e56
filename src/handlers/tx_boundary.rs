//! POST /mcp/migration/transaction-boundary - transaction boundary guidance.

use axum::Json;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::services::tx_boundary::{TxBoundaryReport, recommend_transaction_boundary};
use crate::utils::ApiResult;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(default)]
pub struct TxBoundaryOptions {
    pub dialect: String,
    pub case_insensitive: bool,
    pub prefer_service_layer_tx: bool,
    pub max_items: usize,
}

impl Default for TxBoundaryOptions {
    fn default() -> Self {
        Self {
            dialect: "tsql".to_string(),
            case_insensitive: true,
            prefer_service_layer_tx: true,
            max_items: 30,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TxBoundaryRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[validate(length(min = 1))]
    pub sql: String,
    #[serde(default)]
    pub options: TxBoundaryOptions,
}

#[utoipa::path(
    post,
    path = "/mcp/migration/transaction-boundary",
    request_body = TxBoundaryRequest,
    responses((status = 200, description = "Transaction boundary recommendation", body = TxBoundaryReport)),
    tag = "Migration"
)]
pub async fn tx_boundary(
    Json(request): Json<TxBoundaryRequest>,
) -> ApiResult<Json<TxBoundaryReport>> {
    request.validate()?;
    Ok(Json(recommend_transaction_boundary(
        &request.name,
        &request.object_type,
        &request.sql,
        &request.options.dialect,
        request.options.max_items,
    )))
}
