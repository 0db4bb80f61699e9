use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or checking a migration plan.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("failed to read plan {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid plan file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid plan: {0}")]
    Invalid(String),
}
