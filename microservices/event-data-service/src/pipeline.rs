//! Request orchestration: validate, then authorize, then query.
//!
//! Each stage returns early on failure, so nothing past a failing stage runs.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

use crate::access::{AuthorizationService, Identity};
use crate::error::{ApiError, Result};
use crate::metrics::ServiceMetrics;
use crate::query::EventValueQueryEngine;
use crate::types::{EventDataValueCount, EventValueQuery};
use crate::validation::{validate_values_request, ValuesQueryParams};

#[derive(Clone)]
pub struct EventDataValuesPipeline {
    authorizer: Arc<dyn AuthorizationService>,
    engine: EventValueQueryEngine,
    metrics: ServiceMetrics,
}

impl EventDataValuesPipeline {
    pub fn new(
        authorizer: Arc<dyn AuthorizationService>,
        engine: EventValueQueryEngine,
        metrics: ServiceMetrics,
    ) -> Self {
        Self {
            authorizer,
            engine,
            metrics,
        }
    }

    pub fn engine(&self) -> &EventValueQueryEngine {
        &self.engine
    }

    #[instrument(skip(self, identity, params), fields(website_id = %website_id))]
    pub async fn run(
        &self,
        identity: &Identity,
        website_id: &str,
        params: &ValuesQueryParams,
    ) -> Result<Vec<EventDataValueCount>> {
        let query = self.validate(website_id, params)?;
        self.authorize(identity, &query).await?;
        self.query(&query).await
    }

    fn validate(&self, website_id: &str, params: &ValuesQueryParams) -> Result<EventValueQuery> {
        validate_values_request(website_id, params).map_err(|errors| {
            self.metrics.rejected.inc();
            debug!(%errors, "Rejected event data values request");
            ApiError::Validation(errors)
        })
    }

    async fn authorize(&self, identity: &Identity, query: &EventValueQuery) -> Result<()> {
        let allowed = self
            .authorizer
            .can_view(identity, query.website_id)
            .await
            .map_err(|e| {
                self.metrics.storage_failures.inc();
                ApiError::Storage(e)
            })?;

        if !allowed {
            self.metrics.denied.inc();
            info!(
                website_id = %query.website_id,
                anonymous = identity.is_anonymous(),
                "Denied event data values request"
            );
            return Err(ApiError::Unauthorized);
        }

        Ok(())
    }

    async fn query(&self, query: &EventValueQuery) -> Result<Vec<EventDataValueCount>> {
        let _in_flight = InFlight::start(&self.metrics);

        match self.engine.distinct_value_counts(query).await {
            Ok(values) => {
                self.metrics.queries.inc();
                Ok(values)
            }
            Err(e) => {
                self.metrics.storage_failures.inc();
                Err(ApiError::Storage(e))
            }
        }
    }
}

/// Holds the in-flight gauge raised for one store read.
///
/// Released on drop, so a request abandoned mid-read still lowers the gauge
/// and records its latency.
struct InFlight<'a> {
    metrics: &'a ServiceMetrics,
    started: Instant,
}

impl<'a> InFlight<'a> {
    fn start(metrics: &'a ServiceMetrics) -> Self {
        metrics.in_flight.inc();
        Self {
            metrics,
            started: Instant::now(),
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.metrics.in_flight.dec();
        self.metrics
            .query_latency_ms
            .record(self.started.elapsed().as_secs_f64() * 1000.0);
    }
}
