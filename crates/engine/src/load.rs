//! Batched, retried writes to the destination API.

use std::sync::Arc;
use std::time::Duration;

use portal_migrate_core::{DestinationApi, DestinationError, DestinationRecord, MigrationSettings};
use serde::Serialize;

use crate::retry::{RetryPolicy, retry_with_backoff};

/// A batch that still failed after every retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchError {
    pub collection: String,
    /// Inclusive record range within the collection, `"start-end"`.
    pub batch: String,
    pub error: String,
    pub attempts: u32,
}

/// Counts for one or more `load` calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadOutcome {
    pub success: usize,
    pub failed: usize,
    pub batches: usize,
    pub errors: Vec<BatchError>,
}

impl LoadOutcome {
    /// Fold another outcome into this one.
    pub fn merge(&mut self, other: Self) {
        self.success += other.success;
        self.failed += other.failed;
        self.batches += other.batches;
        self.errors.extend(other.errors);
    }

    pub fn total(&self) -> usize {
        self.success + self.failed
    }
}

pub struct BatchLoader {
    destination: Arc<dyn DestinationApi>,
    batch_size: usize,
    rate_limit_delay: Duration,
    retry: RetryPolicy,
}

impl BatchLoader {
    pub fn new(destination: Arc<dyn DestinationApi>, settings: &MigrationSettings) -> Self {
        Self {
            destination,
            batch_size: settings.batch_size.max(1),
            rate_limit_delay: settings.rate_limit_delay(),
            retry: RetryPolicy::linear(settings.retry_attempts, settings.retry_delay()),
        }
    }

    /// Write `records` in chunks; a chunk that keeps failing is recorded and skipped.
    pub async fn load(&self, records: &[DestinationRecord], collection: &str) -> LoadOutcome {
        let mut outcome = LoadOutcome::default();
        let total_batches = records.len().div_ceil(self.batch_size);

        for (index, chunk) in records.chunks(self.batch_size).enumerate() {
            let start = index * self.batch_size;
            let end = start + chunk.len() - 1;
            outcome.batches += 1;

            let written = retry_with_backoff(&self.retry, |_: &DestinationError| true, |_| {
                self.destination.create_many(collection, chunk)
            })
            .await;

            match written {
                Ok(()) => {
                    outcome.success += chunk.len();
                    tracing::info!(
                        collection,
                        batch = index + 1,
                        of = total_batches,
                        records = chunk.len(),
                        "batch written"
                    );
                    if !self.rate_limit_delay.is_zero() {
                        tokio::time::sleep(self.rate_limit_delay).await;
                    }
                },
                Err(e) => {
                    let range = format!("{start}-{end}");
                    tracing::error!(collection, batch = %range, "batch failed: {e}");
                    outcome.failed += chunk.len();
                    outcome.errors.push(BatchError {
                        collection: collection.to_owned(),
                        batch: range,
                        error: e.error.to_string(),
                        attempts: e.attempts,
                    });
                },
            }
        }
        outcome
    }
}
