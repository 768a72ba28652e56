//! MSSQL Migration Analysis Library
//!
//! Deterministic static analysis of T-SQL stored procedures and functions
//! for Java/MyBatis migration planning.

use std::sync::Arc;

pub mod config;
pub mod handlers;
pub mod services;
pub mod utils;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use config::Config;
pub use services::{
    BusinessRulesReport, CallGraphReport, CallersReport, DbDependencyReport, DifficultyReport,
    ExternalDepsReport, MappingStrategyReport, PerformanceRiskReport, RetrieverCache,
    ReusabilityReport, SpecReport, SpecWithEvidenceReport, TxBoundaryReport,
};

/// Application shared state
///
/// All analyzers are pure functions; the only shared state is the
/// configuration and the per-directory TF-IDF index cache, both wrapped in
/// Arc for cheap cloning and thread safety.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub retriever: Arc<RetrieverCache>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self { config, retriever: Arc::new(RetrieverCache::new()) }
    }
}

/// All API and probe routes. The binary layers Swagger, tracing, and CORS on
/// top; tests drive this router directly.
pub fn build_router(state: Arc<AppState>) -> axum::Router {
    use axum::routing::{get, post};

    let api_routes = axum::Router::new()
        .route("/mcp/analyze", post(handlers::analyze::analyze))
        .route("/mcp/callers", post(handlers::callers::callers))
        .route("/mcp/external-deps", post(handlers::external_deps::external_deps))
        .route("/mcp/common/reusability", post(handlers::reusability::reusability))
        .route("/mcp/common/rules-template", post(handlers::rules_template::rules_template))
        .route("/mcp/common/call-graph", post(handlers::call_graph::call_graph))
        .route(
            "/mcp/migration/mapping-strategy",
            post(handlers::mapping_strategy::mapping_strategy),
        )
        .route(
            "/mcp/migration/mybatis-difficulty",
            post(handlers::mybatis_difficulty::mybatis_difficulty),
        )
        .route(
            "/mcp/migration/transaction-boundary",
            post(handlers::tx_boundary::tx_boundary),
        )
        .route(
            "/mcp/quality/performance-risk",
            post(handlers::performance_risk::performance_risk),
        )
        .route("/mcp/quality/db-dependency", post(handlers::db_dependency::db_dependency))
        .route("/mcp/standardize/spec", post(handlers::standardize::spec))
        .route(
            "/mcp/standardize/spec-with-evidence",
            post(handlers::standardize::spec_with_evidence),
        )
        .route("/mcp", post(handlers::mcp::mcp_post).get(handlers::mcp::mcp_get))
        .with_state(state);

    let health_routes = axum::Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check));

    axum::Router::new().merge(api_routes).merge(health_routes)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

async fn ready_check() -> &'static str {
    "READY"
}
