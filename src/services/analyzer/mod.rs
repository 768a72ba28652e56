//! Primitive T-SQL analyzers.
//!
//! Six independent pure functions over scrubbed SQL text plus the optional
//! AST. Each returns a freshly allocated result and records any parse
//! failure as a `parse_error: <kind>` entry instead of propagating it.

pub mod control_flow;
pub mod data_changes;
pub mod error_handling;
pub mod impacts;
pub mod references;
pub mod transactions;

pub use control_flow::{ControlFlow, ControlFlowResult, analyze_control_flow};
pub use data_changes::{DataChanges, DataChangesResult, analyze_data_changes};
pub use error_handling::{ErrorHandling, analyze_error_handling};
pub use impacts::{ImpactItem, MigrationImpacts, analyze_migration_impacts};
pub use references::{References, ReferencesResult, analyze_references};
pub use transactions::{TransactionSummary, analyze_transactions};
