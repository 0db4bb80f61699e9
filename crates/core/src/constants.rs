//! Shared constants for portal-migrate.
//!
//! Centralizes the defaults used by the plan, the clients and the engine.

/// Records written per destination `createMany` call.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Attempts per batch before it is recorded as failed.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Base retry delay; attempt `n` waits `n * DEFAULT_RETRY_DELAY_MS`.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Pause after every successful batch write.
pub const DEFAULT_RATE_LIMIT_DELAY_MS: u64 = 100;

/// Records requested per source page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// The source API refuses larger pages.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Pause between source page requests.
pub const DEFAULT_PAGE_DELAY_MS: u64 = 50;

/// Minimum fraction of expected rows that must exist after load.
pub const DEFAULT_VALIDATION_TOLERANCE: f64 = 0.95;

/// Traceability field carried by every destination record.
pub const SOURCE_ID_FIELD: &str = "source_id";

/// Strategy used when a module names none or an unknown one.
pub const DEFAULT_TRANSFORM: &str = "standard";

/// Prefix of the settings override environment variables.
pub const ENV_PREFIX: &str = "PORTAL_MIGRATE_";
