//! Paginated, fault-isolated reads from the source API.

use std::sync::Arc;
use std::time::Duration;

use portal_migrate_core::{MigrationSettings, PageRequest, SourceApi, SourceError, SourceRecord};

use crate::error::EngineError;
use crate::retry::{RetryError, RetryPolicy, retry_with_backoff};

/// Reads every page of a module's source collections.
pub struct SourceExtractor {
    source: Arc<dyn SourceApi>,
    page_size: u32,
    page_delay: Duration,
    retry: RetryPolicy,
}

impl SourceExtractor {
    pub fn new(source: Arc<dyn SourceApi>, settings: &MigrationSettings) -> Self {
        Self {
            source,
            page_size: settings.page_size,
            page_delay: settings.page_delay(),
            retry: RetryPolicy::linear(settings.retry_attempts, settings.retry_delay()),
        }
    }

    /// Records of every source, concatenated in request order.
    ///
    /// A failing source is skipped; rejected credentials abort the whole call
    /// and so does every non-empty source failing.
    pub async fn extract(&self, source_ids: &[String]) -> Result<Vec<SourceRecord>, EngineError> {
        let mut records = Vec::new();
        let mut attempted = 0_usize;
        let mut failed = 0_usize;

        for source_id in source_ids.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
            attempted += 1;
            match self.extract_source(source_id).await {
                Ok(mut batch) => {
                    tracing::info!(source = source_id, records = batch.len(), "extracted source");
                    records.append(&mut batch);
                },
                Err(RetryError { error, .. }) if error.is_unauthorized() => {
                    tracing::error!(source = source_id, "source rejected credentials: {error}");
                    return Err(EngineError::Source(error));
                },
                Err(e) => {
                    tracing::warn!(source = source_id, "skipping source: {e}");
                    failed += 1;
                },
            }
        }

        if attempted == 0 {
            tracing::warn!("module has no configured sources");
        } else if failed == attempted {
            return Err(EngineError::Extraction(format!("all {attempted} source(s) failed")));
        }
        Ok(records)
    }

    /// Every page of one source. Nothing is returned unless the last page was read.
    pub async fn extract_source(&self, source_id: &str) -> Result<Vec<SourceRecord>, RetryError<SourceError>> {
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0_u32;

        loop {
            let request = PageRequest { cursor: cursor.take(), page_size: self.page_size };
            let page =
                retry_with_backoff(&self.retry, SourceError::is_transient, |_| self.source.query(source_id, &request))
                    .await?;
            pages += 1;
            records.extend(page.results);
            tracing::debug!(source = source_id, page = pages, total = records.len(), "fetched page");

            if !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }

            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                (true, None) => {
                    tracing::warn!(source = source_id, "has_more without next_cursor; stopping");
                    break;
                },
                (false, _) => break,
            }
        }
        Ok(records)
    }
}
