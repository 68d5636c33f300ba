//! Event Data Service
//!
//! Read-only lookup of the distinct values recorded for custom event properties:
//! - Query parameter validation (website id, epoch-millisecond window, filters)
//! - Website visibility checks (owner, team, admin, share token)
//! - Typed distinct-value queries over the event-data store
//! - REST surface with health, readiness and stats endpoints

pub mod access;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod pipeline;
pub mod query;
pub mod routes;
pub mod types;
pub mod validation;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Instant;

use access::{
    AuthorizationService, IdentityResolver, InMemoryWebsiteDirectory, PgWebsiteDirectory,
    WebsiteAccessPolicy,
};
use config::{Config, StoreBackend};
use metrics::ServiceMetrics;
use pipeline::EventDataValuesPipeline;
use query::{EventDataStore, EventValueQueryEngine, InMemoryEventDataStore, PgEventDataStore};

pub use error::{ApiError, Result};
pub use routes::create_router;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: EventDataValuesPipeline,
    pub identity: Arc<IdentityResolver>,
    pub metrics: ServiceMetrics,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<dyn EventDataStore>,
        authorizer: Arc<dyn AuthorizationService>,
        identity: IdentityResolver,
    ) -> Self {
        let metrics = ServiceMetrics::new();
        let engine = EventValueQueryEngine::new(store);

        Self {
            pipeline: EventDataValuesPipeline::new(authorizer, engine, metrics.clone()),
            identity: Arc::new(identity),
            metrics,
            started_at: Instant::now(),
        }
    }

    /// Wire stores and the access policy for the configured backend
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let identity = IdentityResolver::new(&config.jwt_secret, &config.jwt_issuer);

        let state = match config.store_backend {
            StoreBackend::Postgres => {
                let pool_config =
                    pulse_db::PoolConfig::from_env().with_url(config.service.database_url.clone());
                let db = pulse_db::DbPool::new(pool_config)?;

                let directory = Arc::new(PgWebsiteDirectory::new(db.clone()));
                Self::new(
                    Arc::new(PgEventDataStore::new(db)),
                    Arc::new(WebsiteAccessPolicy::new(directory)),
                    identity,
                )
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory event data store; it starts empty and nothing is persisted");
                let directory = Arc::new(InMemoryWebsiteDirectory::new());
                Self::new(
                    Arc::new(InMemoryEventDataStore::new()),
                    Arc::new(WebsiteAccessPolicy::new(directory)),
                    identity,
                )
            }
        };

        Ok(state)
    }
}
