use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use mssql_migration::config::Config;
use mssql_migration::services;
use mssql_migration::{AppState, handlers};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::analyze::analyze,
        handlers::callers::callers,
        handlers::external_deps::external_deps,
        handlers::reusability::reusability,
        handlers::rules_template::rules_template,
        handlers::call_graph::call_graph,
        handlers::mapping_strategy::mapping_strategy,
        handlers::mybatis_difficulty::mybatis_difficulty,
        handlers::tx_boundary::tx_boundary,
        handlers::performance_risk::performance_risk,
        handlers::db_dependency::db_dependency,
        handlers::standardize::spec,
        handlers::standardize::spec_with_evidence,
    ),
    components(
        schemas(
            handlers::analyze::AnalyzeRequest,
            handlers::analyze::AnalyzeResponse,
            handlers::callers::CallersRequest,
            handlers::call_graph::CallGraphRequest,
            handlers::external_deps::ExternalDepsRequest,
            handlers::external_deps::ExternalDepsOptions,
            handlers::reusability::ReusabilityRequest,
            handlers::reusability::ReusabilityOptions,
            handlers::rules_template::BusinessRulesRequest,
            handlers::rules_template::BusinessRulesOptions,
            handlers::mapping_strategy::MappingStrategyRequest,
            handlers::mapping_strategy::MappingStrategyOptions,
            handlers::mybatis_difficulty::DifficultyRequest,
            handlers::mybatis_difficulty::DifficultyOptions,
            handlers::tx_boundary::TxBoundaryRequest,
            handlers::tx_boundary::TxBoundaryOptions,
            handlers::performance_risk::PerformanceRiskRequest,
            handlers::performance_risk::PerformanceRiskOptions,
            handlers::db_dependency::DbDependencyRequest,
            handlers::db_dependency::DbDependencyOptions,
            handlers::standardize::SpecRequest,
            handlers::standardize::SpecWithEvidenceRequest,
            handlers::standardize::SpecWithEvidenceOptions,
            handlers::standardize::ObjectRef,
            services::analyzer::References,
            services::analyzer::TransactionSummary,
            services::analyzer::MigrationImpacts,
            services::analyzer::ImpactItem,
            services::analyzer::ControlFlow,
            services::analyzer::DataChanges,
            services::analyzer::ErrorHandling,
            services::callers::SqlObject,
            services::callers::CallerOptions,
            services::callers::CallersReport,
            services::call_graph::CallGraphOptions,
            services::call_graph::CallGraphReport,
            services::external_deps::ExternalDepsReport,
            services::reusability::ObjectInfo,
            services::reusability::ReusabilityReport,
            services::business_rules::BusinessRulesReport,
            services::mapping_strategy::MappingStrategyReport,
            services::mybatis_difficulty::DifficultyReport,
            services::tx_boundary::TxBoundaryReport,
            services::performance_risk::PerformanceRiskReport,
            services::db_dependency::DbDependencyReport,
            services::standardization::SpecOptions,
            services::standardization::SpecInputs,
            services::standardization::EvidenceOptions,
            services::standardization::SpecReport,
            services::standardization::SpecWithEvidenceReport,
        )
    ),
    tags(
        (name = "Analyze", description = "Combined primitive analyzers"),
        (name = "Common", description = "Cross-object and reusability analysis"),
        (name = "Migration", description = "Migration strategy and difficulty"),
        (name = "Quality", description = "Performance and dependency quality checks"),
        (name = "Standardize", description = "Standardization spec assembly"),
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    let log_filter = tracing_subscriber::EnvFilter::new(&config.logging.level);
    let registry = tracing_subscriber::registry().with(log_filter);

    if let Some(log_file) = &config.logging.file {
        let log_path = std::path::Path::new(log_file);
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let log_dir = log_path.parent().and_then(|p| p.to_str()).unwrap_or("logs");
        let file_name = log_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("atlas.log");
        let file_prefix = file_name.strip_suffix(".log").unwrap_or(file_name);

        let file_appender = tracing_appender::rolling::daily(log_dir, file_prefix);
        let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
    tracing::info!("Atlas starting up");
    tracing::info!("Configuration loaded successfully");

    let state = Arc::new(AppState::new(config.clone()));
    let app = mssql_migration::build_router(Arc::clone(&state))
        .merge(SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("API documentation available at http://{}/api-docs", addr);
    tracing::info!("Atlas is ready to serve requests");

    axum::serve(listener, app).await?;

    Ok(())
}
