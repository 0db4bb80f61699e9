//! In-memory source and destination APIs for engine tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use portal_migrate_core::{
    CountFilter, DestinationApi, DestinationError, DestinationRecord, MigrationSettings, PageRequest, QueryPage,
    SourceApi, SourceError, SourceErrorCode, SourceIdPair, SourceRecord, TypedProperty,
};

/// Settings with every delay zeroed.
pub fn fast_settings() -> MigrationSettings {
    MigrationSettings { retry_delay_ms: 0, rate_limit_delay_ms: 0, page_delay_ms: 0, ..MigrationSettings::default() }
}

/// `{prefix}_1..={prefix}_{n}`, each with a `Name` title.
pub fn numbered(prefix: &str, n: usize) -> Vec<SourceRecord> {
    (1..=n)
        .map(|i| SourceRecord::new(format!("{prefix}_{i}")).with_property("Name", TypedProperty::title(format!("{prefix} {i}"))))
        .collect()
}

#[derive(Default)]
pub struct FakeSource {
    collections: HashMap<String, Vec<SourceRecord>>,
    failing: HashMap<String, (u16, SourceErrorCode)>,
    transient_failures: AtomicU32,
    unreachable: bool,
    calls: Mutex<Vec<(String, Option<String>, u32)>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_collection(mut self, id: &str, records: Vec<SourceRecord>) -> Self {
        self.collections.insert(id.to_owned(), records);
        self
    }

    #[must_use]
    pub fn with_failing(mut self, id: &str, status: u16, code: SourceErrorCode) -> Self {
        self.failing.insert(id.to_owned(), (status, code));
        self
    }

    /// The next `n` queries fail with a retryable 503.
    #[must_use]
    pub fn with_transient_failures(self, n: u32) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    #[must_use]
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn calls_for(&self, id: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(c, _, _)| c == id).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl SourceApi for FakeSource {
    async fn query(&self, collection_id: &str, request: &PageRequest) -> Result<QueryPage, SourceError> {
        self.calls.lock().unwrap().push((collection_id.to_owned(), request.cursor.clone(), request.page_size));

        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(SourceError::Api {
                status: 503,
                code: SourceErrorCode::Other("service_unavailable".into()),
                message: "try again".into(),
            });
        }
        if let Some((status, code)) = self.failing.get(collection_id) {
            return Err(SourceError::Api { status: *status, code: code.clone(), message: "rejected".into() });
        }
        let Some(records) = self.collections.get(collection_id) else {
            return Err(SourceError::Api {
                status: 404,
                code: SourceErrorCode::ObjectNotFound,
                message: format!("no database {collection_id}"),
            });
        };

        let offset: usize = request.cursor.as_deref().map_or(Ok(0), str::parse::<usize>).unwrap();
        let end = (offset + request.page_size as usize).min(records.len());
        let has_more = end < records.len();
        Ok(QueryPage {
            results: records[offset..end].to_vec(),
            has_more,
            next_cursor: has_more.then(|| end.to_string()),
        })
    }

    async fn ping(&self) -> Result<(), SourceError> {
        if self.unreachable {
            return Err(SourceError::Transport("connection refused".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
struct DestinationState {
    rows: HashMap<String, Vec<(String, DestinationRecord)>>,
    seeded: HashMap<String, Vec<SourceIdPair>>,
    create_calls: Vec<(String, usize)>,
    fail_next_creates: u32,
    always_fail: HashSet<String>,
    poisoned: HashSet<String>,
    count_override: HashMap<String, u64>,
    next_id: u64,
}

#[derive(Default)]
pub struct FakeDestination {
    state: Mutex<DestinationState>,
    unreachable: bool,
}

impl FakeDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` `create_many` calls fail with a 503.
    #[must_use]
    pub fn with_failing_creates(self, n: u32) -> Self {
        self.state.lock().unwrap().fail_next_creates = n;
        self
    }

    #[must_use]
    pub fn with_rejected_collection(self, collection: &str) -> Self {
        self.state.lock().unwrap().always_fail.insert(collection.to_owned());
        self
    }

    /// Any batch carrying this source id is rejected with a 400.
    #[must_use]
    pub fn with_poisoned_record(self, source_id: &str) -> Self {
        self.state.lock().unwrap().poisoned.insert(source_id.to_owned());
        self
    }

    #[must_use]
    pub fn with_count(self, collection: &str, count: u64) -> Self {
        self.state.lock().unwrap().count_override.insert(collection.to_owned(), count);
        self
    }

    /// A row migrated by an earlier run.
    #[must_use]
    pub fn with_existing(self, collection: &str, source_id: &str, destination_id: &str) -> Self {
        self.state.lock().unwrap().seeded.entry(collection.to_owned()).or_default().push(SourceIdPair {
            source_id: source_id.to_owned(),
            destination_id: destination_id.to_owned(),
        });
        self
    }

    #[must_use]
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn rows(&self, collection: &str) -> Vec<DestinationRecord> {
        let state = self.state.lock().unwrap();
        state.rows.get(collection).map(|r| r.iter().map(|(_, rec)| rec.clone()).collect()).unwrap_or_default()
    }

    /// Batch sizes of every `create_many` call on `collection`, failed ones included.
    pub fn create_sizes(&self, collection: &str) -> Vec<usize> {
        let state = self.state.lock().unwrap();
        state.create_calls.iter().filter(|(c, _)| c == collection).map(|(_, n)| *n).collect()
    }

    pub fn create_calls(&self) -> usize {
        self.state.lock().unwrap().create_calls.len()
    }
}

#[async_trait]
impl DestinationApi for FakeDestination {
    async fn create_many(&self, collection: &str, records: &[DestinationRecord]) -> Result<(), DestinationError> {
        let mut state = self.state.lock().unwrap();
        state.create_calls.push((collection.to_owned(), records.len()));
        if state.fail_next_creates > 0 {
            state.fail_next_creates -= 1;
            return Err(DestinationError::Api { status: 503, message: "unavailable".into() });
        }
        if state.always_fail.contains(collection) || records.iter().any(|r| state.poisoned.contains(r.source_id())) {
            return Err(DestinationError::Api { status: 400, message: "invalid payload".into() });
        }
        for record in records {
            state.next_id += 1;
            let id = state.next_id.to_string();
            state.rows.entry(collection.to_owned()).or_default().push((id, record.clone()));
        }
        Ok(())
    }

    async fn count(&self, collection: &str, filter: Option<&CountFilter>) -> Result<u64, DestinationError> {
        assert_eq!(filter, Some(&CountFilter::NotNull("source_id".into())));
        let state = self.state.lock().unwrap();
        if let Some(count) = state.count_override.get(collection) {
            return Ok(*count);
        }
        let rows = state.rows.get(collection).map_or(0, Vec::len);
        let seeded = state.seeded.get(collection).map_or(0, Vec::len);
        Ok((rows + seeded) as u64)
    }

    async fn source_id_pairs(&self, collection: &str) -> Result<Vec<SourceIdPair>, DestinationError> {
        let state = self.state.lock().unwrap();
        let mut pairs = state.seeded.get(collection).cloned().unwrap_or_default();
        if let Some(rows) = state.rows.get(collection) {
            pairs.extend(rows.iter().map(|(id, record)| SourceIdPair {
                source_id: record.source_id().to_owned(),
                destination_id: id.clone(),
            }));
        }
        Ok(pairs)
    }

    async fn ping(&self) -> Result<(), DestinationError> {
        if self.unreachable {
            return Err(DestinationError::Transport("connection refused".into()));
        }
        Ok(())
    }
}
