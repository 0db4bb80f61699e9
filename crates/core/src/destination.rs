//! Destination API abstraction
//!
//! The structured-store API records are migrated *to*. Implemented over HTTP
//! by `portal-migrate-directus` and by in-memory fakes in tests.

use async_trait::async_trait;
use thiserror::Error;

use crate::record::DestinationRecord;

/// Row filter for [`DestinationApi::count`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountFilter {
    /// Rows where the field is not null.
    NotNull(String),
}

/// A migrated row's traceability pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceIdPair {
    pub source_id: String,
    pub destination_id: String,
}

/// Errors from destination API operations.
#[derive(Debug, Error)]
pub enum DestinationError {
    #[error("destination request failed: {0}")]
    Transport(String),
    #[error("destination API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("invalid destination response: {0}")]
    InvalidResponse(String),
    #[error("destination client initialization failed: {0}")]
    ClientInit(String),
}

impl DestinationError {
    /// Whether this error is transient and should be retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Api { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            Self::InvalidResponse(_) | Self::ClientInit(_) => false,
        }
    }
}

/// Batch writer and row counter over destination collections.
#[async_trait]
pub trait DestinationApi: Send + Sync {
    /// Insert every record of the batch; any rejection fails the whole call.
    async fn create_many(&self, collection: &str, records: &[DestinationRecord]) -> Result<(), DestinationError>;

    /// Number of rows in `collection`, optionally filtered.
    async fn count(&self, collection: &str, filter: Option<&CountFilter>) -> Result<u64, DestinationError>;

    /// `source_id` → primary key pairs of every migrated row in `collection`.
    async fn source_id_pairs(&self, collection: &str) -> Result<Vec<SourceIdPair>, DestinationError>;

    /// Cheap call used before a run starts.
    async fn ping(&self) -> Result<(), DestinationError>;
}
