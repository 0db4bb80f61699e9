//! Typed error enum for the engine.
//!
//! Unifies source, destination, plan and report failures so the CLI can tell
//! a startup problem from a module-level one.

use portal_migrate_core::{DestinationError, PlanError, SourceError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Source API call failed in a way that aborts the module.
    #[error("source: {0}")]
    Source(#[from] SourceError),

    /// Destination API call failed outside the retried batch writes.
    #[error("destination: {0}")]
    Destination(#[from] DestinationError),

    /// No configured source of the module could be read.
    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("unknown module: {0}")]
    UnknownModule(String),

    /// Run cannot start (unreachable API, rejected credentials).
    #[error("startup: {0}")]
    Startup(String),

    #[error("plan: {0}")]
    Plan(#[from] PlanError),

    #[error("report io: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}
