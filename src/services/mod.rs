pub mod analyzer;
pub mod business_rules;
pub mod call_graph;
pub mod callers;
pub mod db_dependency;
pub mod external_deps;
pub mod mapping_strategy;
pub mod mybatis_difficulty;
pub mod performance_risk;
pub mod retrieval;
pub mod reusability;
pub mod safe_sql;
pub mod sql_parser;
pub mod standardization;
pub mod tx_boundary;

pub use business_rules::{BusinessRulesReport, analyze_business_rules};
pub use call_graph::{CallGraphOptions, CallGraphReport, build_call_graph};
pub use callers::{CallerOptions, CallersReport, SqlObject, find_callers, infer_target_type};
pub use db_dependency::{DbDependencyReport, analyze_db_dependency};
pub use external_deps::{ExternalDepsReport, analyze_external_dependencies};
pub use mapping_strategy::{MappingStrategyReport, recommend_mapping_strategy};
pub use mybatis_difficulty::{DifficultyReport, evaluate_mybatis_difficulty};
pub use performance_risk::{PerformanceRiskReport, analyze_performance_risk};
pub use retrieval::RetrieverCache;
pub use reusability::{ObjectInfo, ReusabilityReport, evaluate_reusability};
pub use standardization::{
    EvidenceOptions, SpecInputs, SpecOptions, SpecReport, SpecWithEvidenceReport,
    build_spec_with_evidence, build_standardization_spec,
};
pub use tx_boundary::{TxBoundaryReport, recommend_transaction_boundary};
