//! Event-data store seam

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use crate::types::{EventDataRecord, EventDataValue, EventDataValueCount, EventValueQuery};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] pulse_db::DbError),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Read contract the query engine needs from event-data storage.
///
/// Implementations return value/total pairs for records matching the query.
/// They may return duplicates or any order; the engine merges and sorts.
#[async_trait]
pub trait EventDataStore: Send + Sync {
    async fn fetch_values(&self, query: &EventValueQuery) -> Result<Vec<EventDataValueCount>, StoreError>;

    async fn is_healthy(&self) -> bool {
        true
    }

    fn backend(&self) -> &'static str;
}

/// Process-local store, used for tests and `STORE_BACKEND=memory`
#[derive(Default)]
pub struct InMemoryEventDataStore {
    records: RwLock<Vec<EventDataRecord>>,
}

impl InMemoryEventDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = EventDataRecord>) -> Self {
        Self {
            records: RwLock::new(records.into_iter().collect()),
        }
    }

    pub fn insert(&self, record: EventDataRecord) {
        self.records.write().push(record);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl EventDataStore for InMemoryEventDataStore {
    async fn fetch_values(&self, query: &EventValueQuery) -> Result<Vec<EventDataValueCount>, StoreError> {
        let records = self.records.read();

        let mut totals: BTreeMap<&EventDataValue, u64> = BTreeMap::new();
        for record in records.iter().filter(|r| query.matches(r)) {
            *totals.entry(&record.value).or_default() += 1;
        }

        Ok(totals
            .into_iter()
            .map(|(value, total)| EventDataValueCount {
                value: value.clone(),
                total,
            })
            .collect())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
