//! Event Data Service binary

use event_data_service::{config::Config, create_router, AppState};
use pulse_core::{DependencyStatus, HealthStatus, MicroserviceRuntime, PulseService, ReadinessStatus};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub struct EventDataService {
    config: Config,
    state: AppState,
}

#[async_trait::async_trait]
impl PulseService for EventDataService {
    fn service_id(&self) -> &'static str {
        "event-data-service"
    }

    async fn health(&self) -> HealthStatus {
        HealthStatus {
            healthy: true,
            service_id: self.service_id().to_string(),
            version: self.version().to_string(),
            uptime_seconds: self.state.started_at.elapsed().as_secs(),
        }
    }

    async fn ready(&self) -> ReadinessStatus {
        let store = self.state.pipeline.engine().store();
        let started = std::time::Instant::now();
        let available = store.is_healthy().await;

        ReadinessStatus {
            ready: available,
            dependencies: vec![DependencyStatus {
                name: store.backend().to_string(),
                available,
                latency_ms: Some(started.elapsed().as_millis() as u64),
            }],
        }
    }

    async fn shutdown(&self) -> pulse_core::Result<()> {
        info!(
            queries_total = self.state.metrics.queries.get(),
            "Shutting down Event Data Service"
        );
        Ok(())
    }

    async fn start(&self) -> pulse_core::Result<()> {
        let bind_addr = self.config.service.bind_address();
        let app = create_router(self.state.clone());

        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            bind = %bind_addr,
            backend = ?self.config.store_backend,
            "Event Data Service listening"
        );

        axum::serve(listener, app).await?;

        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _telemetry = pulse_telemetry::init("event-data-service")?;

    info!("Starting Event Data Service");

    let config = Config::from_env()?;
    let state = AppState::from_config(&config)?;

    let runtime = MicroserviceRuntime::new(config.service.clone());
    let service = Arc::new(EventDataService { config, state });

    runtime.run(service).await?;

    Ok(())
}
