//! Source API abstraction
//!
//! The document-database API records are migrated *from*. Implemented over
//! HTTP by `portal-migrate-notion` and by in-memory fakes in tests.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::record::SourceRecord;

/// Cursor position for one page request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub cursor: Option<String>,
    pub page_size: u32,
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueryPage {
    #[serde(default)]
    pub results: Vec<SourceRecord>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Error discriminator reported by the source API in its `code` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceErrorCode {
    ObjectNotFound,
    Unauthorized,
    RestrictedResource,
    RateLimited,
    ValidationError,
    Other(String),
}

impl SourceErrorCode {
    pub fn from_code(code: &str) -> Self {
        match code {
            "object_not_found" => Self::ObjectNotFound,
            "unauthorized" => Self::Unauthorized,
            "restricted_resource" => Self::RestrictedResource,
            "rate_limited" => Self::RateLimited,
            "validation_error" => Self::ValidationError,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::ObjectNotFound => "object_not_found",
            Self::Unauthorized => "unauthorized",
            Self::RestrictedResource => "restricted_resource",
            Self::RateLimited => "rate_limited",
            Self::ValidationError => "validation_error",
            Self::Other(code) => code,
        }
    }
}

impl std::fmt::Display for SourceErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from source API operations.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source request failed: {0}")]
    Transport(String),
    #[error("source API error {status} ({code}): {message}")]
    Api { status: u16, code: SourceErrorCode, message: String },
    #[error("invalid source response: {0}")]
    InvalidResponse(String),
    #[error("source client initialization failed: {0}")]
    ClientInit(String),
}

impl SourceError {
    /// Whether this error is transient and should be retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Api { status, code, .. } => {
                *code == SourceErrorCode::RateLimited || matches!(status, 429 | 500 | 502 | 503 | 504)
            },
            Self::InvalidResponse(_) | Self::ClientInit(_) => false,
        }
    }

    /// Whether the credentials were rejected; no other source can succeed either.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api { code: SourceErrorCode::Unauthorized, .. } | Self::Api { status: 401, .. })
    }
}

/// Paginated reader over source collections.
#[async_trait]
pub trait SourceApi: Send + Sync {
    /// Fetch one page of `collection_id`.
    async fn query(&self, collection_id: &str, request: &PageRequest) -> Result<QueryPage, SourceError>;

    /// Cheap authenticated call used before a run starts.
    async fn ping(&self) -> Result<(), SourceError>;
}
