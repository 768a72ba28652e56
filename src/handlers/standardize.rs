//! POST /mcp/standardize/spec and /mcp/standardize/spec-with-evidence.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::AppState;
use crate::services::standardization::{
    EvidenceOptions, SpecInputs, SpecOptions, SpecReport, SpecWithEvidenceReport,
    build_spec_with_evidence, build_standardization_spec,
};
use crate::utils::{ApiError, ApiResult};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ObjectRef {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SpecRequest {
    pub object: ObjectRef,
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default)]
    pub inputs: Option<SpecInputs>,
    #[serde(default)]
    pub options: SpecOptions,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SpecWithEvidenceOptions {
    #[serde(flatten)]
    pub spec: SpecOptions,
    #[serde(flatten)]
    pub evidence: EvidenceOptions,
}

impl Default for SpecWithEvidenceOptions {
    fn default() -> Self {
        Self { spec: SpecOptions::default(), evidence: EvidenceOptions::default() }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SpecWithEvidenceRequest {
    pub object: ObjectRef,
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default)]
    pub inputs: Option<SpecInputs>,
    #[serde(default)]
    pub options: SpecWithEvidenceOptions,
}

/// Exactly one of `sql` / `inputs` must be supplied.
fn check_exclusive(sql: Option<&String>, inputs: Option<&SpecInputs>) -> Result<(), ApiError> {
    match (sql, inputs) {
        (Some(_), Some(_)) => {
            Err(ApiError::validation("provide either sql or inputs, not both"))
        }
        (None, None) => Err(ApiError::validation("one of sql or inputs is required")),
        (Some(sql), None) if sql.trim().is_empty() => {
            Err(ApiError::validation("sql must not be empty"))
        }
        _ => Ok(()),
    }
}

#[utoipa::path(
    post,
    path = "/mcp/standardize/spec",
    request_body = SpecRequest,
    responses((status = 200, description = "Standardization spec", body = SpecReport)),
    tag = "Standardize"
)]
pub async fn spec(Json(request): Json<SpecRequest>) -> ApiResult<Json<SpecReport>> {
    check_exclusive(request.sql.as_ref(), request.inputs.as_ref())?;
    Ok(Json(build_standardization_spec(
        &request.object.name,
        &request.object.object_type,
        request.sql.as_deref(),
        request.inputs.as_ref(),
        &request.options,
    )))
}

#[utoipa::path(
    post,
    path = "/mcp/standardize/spec-with-evidence",
    request_body = SpecWithEvidenceRequest,
    responses((status = 200, description = "Standardization spec with document evidence", body = SpecWithEvidenceReport)),
    tag = "Standardize"
)]
pub async fn spec_with_evidence(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SpecWithEvidenceRequest>,
) -> ApiResult<Json<SpecWithEvidenceReport>> {
    check_exclusive(request.sql.as_ref(), request.inputs.as_ref())?;

    let mut evidence_options = request.options.evidence.clone();
    if evidence_options.docs_dir.is_none() {
        evidence_options.docs_dir = state.config.retrieval.docs_dir.clone();
    }

    Ok(Json(build_spec_with_evidence(
        &request.object.name,
        &request.object.object_type,
        request.sql.as_deref(),
        request.inputs.as_ref(),
        &request.options.spec,
        &evidence_options,
        &state.retriever,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusive_sql_or_inputs() {
        assert!(check_exclusive(None, None).is_err());
        assert!(
            check_exclusive(Some(&"SELECT 1".to_string()), Some(&SpecInputs::default())).is_err()
        );
        assert!(check_exclusive(Some(&"SELECT 1".to_string()), None).is_ok());
        assert!(check_exclusive(None, Some(&SpecInputs::default())).is_ok());
        assert!(check_exclusive(Some(&"   ".to_string()), None).is_err());
    }
}
