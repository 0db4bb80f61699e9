//! Migration engine for portal-migrate
//!
//! Drives each module of a [`MigrationPlan`](portal_migrate_core::MigrationPlan)
//! through extract, transform, load and validate, and folds the outcome of
//! every module into a [`MigrationReport`].

#![allow(clippy::missing_errors_doc, reason = "Errors are self-explanatory from Result types")]
#![allow(clippy::module_name_repetitions, reason = "Type names mirror their module")]
#![allow(clippy::cast_precision_loss, reason = "Record counts stay far below 2^52")]

mod error;
mod extract;
mod load;
mod orchestrator;
mod report;
mod retry;
pub mod transform;
mod validate;

#[cfg(test)]
mod pipeline_tests;
#[cfg(test)]
mod testing;

pub use error::EngineError;
pub use extract::SourceExtractor;
pub use load::{BatchError, BatchLoader, LoadOutcome};
pub use orchestrator::MigrationOrchestrator;
pub use report::{MigrationReport, ModulePhase, ModuleStats, ModuleStatus, ReportSummary, RunMode};
pub use retry::{RetryError, RetryPolicy, retry_with_backoff};
pub use transform::{CollectionRecords, TransformRegistry, Transformed, Transformer};
pub use validate::{Validator, meets_tolerance};
