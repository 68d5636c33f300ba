//! Unit tests for the query engine and request pipeline

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulse_core::{UserId, WebsiteId};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::access::{Identity, InMemoryWebsiteDirectory, WebsiteAccessPolicy};
use crate::error::ApiError;
use crate::metrics::ServiceMetrics;
use crate::pipeline::EventDataValuesPipeline;
use crate::query::{EventDataStore, EventValueQueryEngine, InMemoryEventDataStore, StoreError};
use crate::types::{
    DataType, EventDataFilter, EventDataRecord, EventDataValue, EventDataValueCount,
    EventValueQuery, TimeRange,
};
use crate::validation::ValuesQueryParams;

const T0: i64 = 1_700_000_000_000;

fn at(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap()
}

fn record(website: WebsiteId, event: &str, prop: &str, value: EventDataValue, ms: i64) -> EventDataRecord {
    EventDataRecord {
        website_id: website,
        event_name: event.to_string(),
        property_name: prop.to_string(),
        value,
        created_at: at(ms),
    }
}

fn query(website: WebsiteId, start: i64, end: i64, event: Option<&str>, prop: Option<&str>) -> EventValueQuery {
    EventValueQuery {
        website_id: website,
        range: TimeRange::from_millis(start, end).unwrap(),
        filter: EventDataFilter {
            event_name: event.map(str::to_string),
            property_name: prop.map(str::to_string),
        },
    }
}

fn engine(records: Vec<EventDataRecord>) -> EventValueQueryEngine {
    EventValueQueryEngine::new(Arc::new(InMemoryEventDataStore::with_records(records)))
}

/// Counts calls and delegates to an in-memory store
struct SpyStore {
    calls: AtomicUsize,
    inner: InMemoryEventDataStore,
}

impl SpyStore {
    fn new(records: Vec<EventDataRecord>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            inner: InMemoryEventDataStore::with_records(records),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventDataStore for SpyStore {
    async fn fetch_values(&self, query: &EventValueQuery) -> Result<Vec<EventDataValueCount>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_values(query).await
    }

    fn backend(&self) -> &'static str {
        "spy"
    }
}

/// Returns rows out of order and with duplicates, like a sharded backend might
struct UnorderedStore(Vec<EventDataValueCount>);

#[async_trait]
impl EventDataStore for UnorderedStore {
    async fn fetch_values(&self, _query: &EventValueQuery) -> Result<Vec<EventDataValueCount>, StoreError> {
        Ok(self.0.clone())
    }

    fn backend(&self) -> &'static str {
        "unordered"
    }
}

/// Never answers, like a read stuck on a dead connection
struct StalledStore;

#[async_trait]
impl EventDataStore for StalledStore {
    async fn fetch_values(&self, _query: &EventValueQuery) -> Result<Vec<EventDataValueCount>, StoreError> {
        std::future::pending().await
    }

    fn backend(&self) -> &'static str {
        "stalled"
    }
}

struct FailingStore;

#[async_trait]
impl EventDataStore for FailingStore {
    async fn fetch_values(&self, _query: &EventValueQuery) -> Result<Vec<EventDataValueCount>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn is_healthy(&self) -> bool {
        false
    }

    fn backend(&self) -> &'static str {
        "failing"
    }
}

fn pipeline_for(store: Arc<dyn EventDataStore>, directory: InMemoryWebsiteDirectory) -> (EventDataValuesPipeline, ServiceMetrics) {
    let metrics = ServiceMetrics::new();
    let pipeline = EventDataValuesPipeline::new(
        Arc::new(WebsiteAccessPolicy::new(Arc::new(directory))),
        EventValueQueryEngine::new(store),
        metrics.clone(),
    );
    (pipeline, metrics)
}

fn params(start: i64, end: i64) -> ValuesQueryParams {
    ValuesQueryParams {
        start_at: Some(start.to_string()),
        end_at: Some(end.to_string()),
        ..Default::default()
    }
}

// ============================================
// Query engine
// ============================================

#[tokio::test]
async fn test_end_to_end_click_colors() {
    let website = WebsiteId(Uuid::new_v4());
    let engine = engine(vec![
        record(website, "click", "color", "red".into(), T0 + 10),
        record(website, "click", "color", "red".into(), T0 + 20),
        record(website, "click", "color", "blue".into(), T0 + 30),
        record(website, "click", "color", "green".into(), T0 + 5_000),
    ]);

    let values = engine
        .distinct_values(&query(website, T0, T0 + 1_000, Some("click"), Some("color")))
        .await
        .unwrap();

    let got: HashSet<EventDataValue> = values.into_iter().collect();
    let expected: HashSet<EventDataValue> = ["red", "blue"].into_iter().map(EventDataValue::from).collect();
    assert_eq!(got, expected);
}

#[tokio::test]
async fn test_duplicates_collapse_with_totals() {
    let website = WebsiteId(Uuid::new_v4());
    let engine = engine(vec![
        record(website, "click", "color", "red".into(), T0),
        record(website, "click", "color", "red".into(), T0 + 1),
        record(website, "click", "color", "blue".into(), T0 + 2),
    ]);

    let counts = engine
        .distinct_value_counts(&query(website, T0, T0 + 10, None, None))
        .await
        .unwrap();

    assert_eq!(
        counts,
        vec![
            EventDataValueCount { value: "blue".into(), total: 1 },
            EventDataValueCount { value: "red".into(), total: 2 },
        ]
    );
}

#[tokio::test]
async fn test_numeric_and_string_values_stay_separate() {
    let website = WebsiteId(Uuid::new_v4());
    let engine = engine(vec![
        record(website, "game", "score", EventDataValue::from(5), T0),
        record(website, "game", "score", EventDataValue::from("5"), T0),
    ]);

    let values = engine
        .distinct_values(&query(website, T0, T0, None, Some("score")))
        .await
        .unwrap();

    assert_eq!(values, vec![EventDataValue::from("5"), EventDataValue::from(5)]);
    assert_eq!(values[0].data_type(), DataType::String);
    assert_eq!(values[1].data_type(), DataType::Number);
}

#[tokio::test]
async fn test_range_bounds_are_inclusive() {
    let website = WebsiteId(Uuid::new_v4());
    let (start, end) = (T0, T0 + 60_000);
    let engine = engine(vec![
        record(website, "view", "page", "before".into(), start - 1),
        record(website, "view", "page", "at-start".into(), start),
        record(website, "view", "page", "at-end".into(), end),
        record(website, "view", "page", "after".into(), end + 1),
    ]);

    let values = engine
        .distinct_values(&query(website, start, end, None, None))
        .await
        .unwrap();

    assert_eq!(values, vec![EventDataValue::from("at-end"), EventDataValue::from("at-start")]);
}

#[tokio::test]
async fn test_zero_width_range_matches_exact_instant() {
    let website = WebsiteId(Uuid::new_v4());
    let engine = engine(vec![
        record(website, "view", "page", "exact".into(), T0),
        record(website, "view", "page", "later".into(), T0 + 1),
    ]);

    let values = engine
        .distinct_values(&query(website, T0, T0, None, None))
        .await
        .unwrap();

    assert_eq!(values, vec![EventDataValue::from("exact")]);
}

#[tokio::test]
async fn test_scoped_to_website_and_event() {
    let website = WebsiteId(Uuid::new_v4());
    let other = WebsiteId(Uuid::new_v4());
    let engine = engine(vec![
        record(website, "click", "color", "red".into(), T0),
        record(website, "signup", "color", "teal".into(), T0),
        record(other, "click", "color", "black".into(), T0),
    ]);

    let values = engine
        .distinct_values(&query(website, T0, T0, Some("click"), None))
        .await
        .unwrap();

    assert_eq!(values, vec![EventDataValue::from("red")]);
}

#[tokio::test]
async fn test_unmatched_property_is_empty_success() {
    let website = WebsiteId(Uuid::new_v4());
    let engine = engine(vec![record(website, "click", "color", "red".into(), T0)]);

    let values = engine
        .distinct_values(&query(website, T0, T0, None, Some("size")))
        .await
        .unwrap();

    assert!(values.is_empty());
}

#[tokio::test]
async fn test_repeated_queries_are_identical() {
    let website = WebsiteId(Uuid::new_v4());
    let engine = engine(vec![
        record(website, "e", "p", EventDataValue::from(true), T0),
        record(website, "e", "p", EventDataValue::from(at(T0)), T0),
        record(website, "e", "p", "x".into(), T0),
        record(website, "e", "p", EventDataValue::from(-3), T0),
    ]);
    let q = query(website, T0, T0, None, None);

    let first = engine.distinct_values(&q).await.unwrap();
    let second = engine.distinct_values(&q).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(
        first.iter().map(|v| v.data_type()).collect::<Vec<_>>(),
        vec![DataType::String, DataType::Number, DataType::Boolean, DataType::Date]
    );
}

#[tokio::test]
async fn test_engine_merges_and_sorts_store_rows() {
    let rows = vec![
        EventDataValueCount { value: EventDataValue::from(7), total: 1 },
        EventDataValueCount { value: "b".into(), total: 2 },
        EventDataValueCount { value: EventDataValue::from(7), total: 3 },
        EventDataValueCount { value: "a".into(), total: 1 },
    ];
    let engine = EventValueQueryEngine::new(Arc::new(UnorderedStore(rows)));
    let website = WebsiteId(Uuid::new_v4());

    let counts = engine
        .distinct_value_counts(&query(website, T0, T0, None, None))
        .await
        .unwrap();

    assert_eq!(
        counts,
        vec![
            EventDataValueCount { value: "a".into(), total: 1 },
            EventDataValueCount { value: "b".into(), total: 2 },
            EventDataValueCount { value: EventDataValue::from(7), total: 4 },
        ]
    );
}

#[tokio::test]
async fn test_store_failure_surfaces() {
    let engine = EventValueQueryEngine::new(Arc::new(FailingStore));
    let website = WebsiteId(Uuid::new_v4());

    let result = engine.distinct_values(&query(website, T0, T0, None, None)).await;
    assert!(matches!(result, Err(StoreError::Unavailable(_))));
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn value_strategy() -> impl Strategy<Value = EventDataValue> {
        prop_oneof![
            "[a-c0-9]{0,2}".prop_map(EventDataValue::String),
            (-3i64..3).prop_map(EventDataValue::from),
            any::<bool>().prop_map(EventDataValue::Boolean),
            (0i64..3).prop_map(|offset| EventDataValue::Date(at(T0 + offset))),
        ]
    }

    proptest! {
        #[test]
        fn prop_results_have_no_duplicates_and_are_sorted(
            entries in prop::collection::vec((value_strategy(), -5i64..15), 0..40)
        ) {
            let website = WebsiteId(Uuid::new_v4());
            let records: Vec<EventDataRecord> = entries
                .iter()
                .map(|(value, offset)| record(website, "e", "p", value.clone(), T0 + offset))
                .collect();
            let engine = engine(records);
            let q = query(website, T0, T0 + 9, None, None);

            let values = tokio_test::block_on(engine.distinct_values(&q)).unwrap();
            let again = tokio_test::block_on(engine.distinct_values(&q)).unwrap();

            let unique: HashSet<&EventDataValue> = values.iter().collect();
            prop_assert_eq!(unique.len(), values.len());
            prop_assert!(values.windows(2).all(|w| w[0] < w[1]));
            prop_assert_eq!(&values, &again);

            let expected: HashSet<EventDataValue> = entries
                .iter()
                .filter(|(_, offset)| (0..=9).contains(offset))
                .map(|(value, _)| value.clone())
                .collect();
            prop_assert_eq!(values.into_iter().collect::<HashSet<_>>(), expected);
        }
    }
}

// ============================================
// Pipeline
// ============================================

#[tokio::test]
async fn test_unauthorized_never_reaches_store() {
    let website = WebsiteId(Uuid::new_v4());
    let owner = UserId(Uuid::new_v4());
    let stranger = UserId(Uuid::new_v4());

    let directory = InMemoryWebsiteDirectory::new();
    directory.add_user_website(website, owner);
    let spy = Arc::new(SpyStore::new(vec![record(website, "click", "color", "red".into(), T0)]));
    let (pipeline, metrics) = pipeline_for(spy.clone(), directory);

    for identity in [Identity::anonymous(), Identity::user(stranger, false)] {
        let result = pipeline
            .run(&identity, &website.to_string(), &params(T0, T0 + 1))
            .await;
        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }

    assert_eq!(spy.calls(), 0);
    assert_eq!(metrics.denied.get(), 2);
}

#[tokio::test]
async fn test_validation_precedes_authorization() {
    let spy = Arc::new(SpyStore::new(vec![]));
    let (pipeline, metrics) = pipeline_for(spy.clone(), InMemoryWebsiteDirectory::new());

    let result = pipeline
        .run(&Identity::anonymous(), "not-a-uuid", &params(T0 + 1, T0))
        .await;

    assert!(matches!(result, Err(ApiError::Validation(_))));
    assert_eq!(metrics.rejected.get(), 1);
    assert_eq!(metrics.denied.get(), 0);
    assert_eq!(spy.calls(), 0);
}

#[tokio::test]
async fn test_owner_gets_values() {
    let website = WebsiteId(Uuid::new_v4());
    let owner = UserId(Uuid::new_v4());
    let directory = InMemoryWebsiteDirectory::new();
    directory.add_user_website(website, owner);
    let spy = Arc::new(SpyStore::new(vec![record(website, "click", "color", "red".into(), T0)]));
    let (pipeline, metrics) = pipeline_for(spy.clone(), directory);

    let values = pipeline
        .run(&Identity::user(owner, false), &website.to_string(), &params(T0, T0))
        .await
        .unwrap();

    assert_eq!(values, vec![EventDataValueCount { value: "red".into(), total: 1 }]);
    assert_eq!(spy.calls(), 1);
    assert_eq!(metrics.queries.get(), 1);
    assert_eq!(metrics.query_latency_ms.snapshot().count, 1);
    assert_eq!(metrics.in_flight.get(), 0);
}

#[tokio::test]
async fn test_storage_failure_is_counted() {
    let website = WebsiteId(Uuid::new_v4());
    let (pipeline, metrics) = pipeline_for(Arc::new(FailingStore), InMemoryWebsiteDirectory::new());

    let result = pipeline
        .run(&Identity::share(website), &website.to_string(), &params(T0, T0))
        .await;

    assert!(matches!(result, Err(ApiError::Storage(_))));
    assert_eq!(metrics.storage_failures.get(), 1);
    assert_eq!(metrics.queries.get(), 0);
}

#[tokio::test]
async fn test_abandoned_query_releases_in_flight_gauge() {
    let website = WebsiteId(Uuid::new_v4());
    let (pipeline, metrics) = pipeline_for(Arc::new(StalledStore), InMemoryWebsiteDirectory::new());

    let outcome = tokio::time::timeout(
        std::time::Duration::from_millis(50),
        pipeline.run(&Identity::share(website), &website.to_string(), &params(T0, T0)),
    )
    .await;

    assert!(outcome.is_err());
    assert_eq!(metrics.in_flight.get(), 0);
    assert_eq!(metrics.query_latency_ms.snapshot().count, 1);
    assert_eq!(metrics.queries.get(), 0);
    assert_eq!(metrics.storage_failures.get(), 0);
}

