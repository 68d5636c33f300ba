//! Event Value Query Engine
//!
//! Turns a validated query into the distinct (type, value) pairs recorded for a
//! website, ordered by type and then by value.

mod postgres;
mod store;

pub use postgres::PgEventDataStore;
pub use store::{EventDataStore, InMemoryEventDataStore, StoreError};

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::types::{EventDataValue, EventDataValueCount, EventValueQuery};

#[derive(Clone)]
pub struct EventValueQueryEngine {
    store: Arc<dyn EventDataStore>,
}

impl EventValueQueryEngine {
    pub fn new(store: Arc<dyn EventDataStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn EventDataStore> {
        &self.store
    }

    /// Distinct values with the number of records carrying each.
    ///
    /// Rows the store returns for the same (type, value) are merged and their
    /// totals summed. An empty result is a success.
    #[instrument(skip(self), fields(website_id = %query.website_id, backend = self.store.backend()))]
    pub async fn distinct_value_counts(
        &self,
        query: &EventValueQuery,
    ) -> Result<Vec<EventDataValueCount>, StoreError> {
        let rows = self.store.fetch_values(query).await?;
        let fetched = rows.len();

        let mut merged: BTreeMap<EventDataValue, u64> = BTreeMap::new();
        for row in rows {
            *merged.entry(row.value).or_default() += row.total;
        }

        debug!(fetched, distinct = merged.len(), "Event data values resolved");

        Ok(merged
            .into_iter()
            .map(|(value, total)| EventDataValueCount { value, total })
            .collect())
    }

    /// Distinct values only, same order as [`Self::distinct_value_counts`]
    pub async fn distinct_values(&self, query: &EventValueQuery) -> Result<Vec<EventDataValue>, StoreError> {
        Ok(self
            .distinct_value_counts(query)
            .await?
            .into_iter()
            .map(|row| row.value)
            .collect())
    }
}
