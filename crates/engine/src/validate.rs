use std::sync::Arc;

use portal_migrate_core::constants::SOURCE_ID_FIELD;
use portal_migrate_core::{CountFilter, DestinationApi};

/// Post-load row count check against a tolerance.
pub struct Validator {
    destination: Arc<dyn DestinationApi>,
    tolerance: f64,
}

impl Validator {
    pub fn new(destination: Arc<dyn DestinationApi>, tolerance: f64) -> Self {
        Self { destination, tolerance }
    }

    /// Whether `collection` holds at least `expected * tolerance` migrated rows.
    ///
    /// Never fails: count errors are logged and reported as `false`.
    pub async fn validate(&self, collection: &str, expected: usize) -> bool {
        if expected == 0 {
            return true;
        }
        let filter = CountFilter::NotNull(SOURCE_ID_FIELD.to_owned());
        match self.destination.count(collection, Some(&filter)).await {
            Ok(actual) if meets_tolerance(actual, expected, self.tolerance) => {
                tracing::info!(collection, actual, expected, "validation passed");
                true
            },
            Ok(actual) => {
                tracing::warn!(collection, actual, expected, tolerance = self.tolerance, "validation shortfall");
                false
            },
            Err(e) => {
                tracing::error!(collection, "validation count failed: {e}");
                false
            },
        }
    }
}

pub fn meets_tolerance(actual: u64, expected: usize, tolerance: f64) -> bool {
    actual as f64 >= expected as f64 * tolerance
}
