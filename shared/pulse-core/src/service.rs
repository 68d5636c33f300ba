//! Service infrastructure for all microservices

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use crate::config::ServiceConfig;
use crate::error::{PulseError, Result};

/// Health status for liveness probes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub service_id: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Readiness status for readiness probes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessStatus {
    pub ready: bool,
    pub dependencies: Vec<DependencyStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyStatus {
    pub name: String,
    pub available: bool,
    pub latency_ms: Option<u64>,
}

/// Standard trait all microservices must implement
#[async_trait]
pub trait PulseService: Send + Sync + 'static {
    /// Service identifier (e.g., "event-data-service")
    fn service_id(&self) -> &'static str;

    /// Service version
    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Health check - is the service alive?
    async fn health(&self) -> HealthStatus;

    /// Readiness check - are all dependencies available?
    async fn ready(&self) -> ReadinessStatus;

    /// Graceful shutdown
    async fn shutdown(&self) -> Result<()>;

    /// Start the service (HTTP servers, etc.)
    async fn start(&self) -> Result<()>;
}

/// Drives one service from readiness check to graceful shutdown
pub struct MicroserviceRuntime {
    config: ServiceConfig,
}

impl MicroserviceRuntime {
    pub fn new(config: ServiceConfig) -> Self {
        Self { config }
    }

    /// Report dependency readiness, serve until a shutdown signal, then stop.
    ///
    /// A server that exits on its own ends the run with its error instead of
    /// waiting for a signal that would never matter.
    pub async fn run<S: PulseService>(self, service: Arc<S>) -> Result<()> {
        info!(
            service = %self.config.service_name,
            service_id = service.service_id(),
            version = service.version(),
            bind = %self.config.bind_address(),
            "Starting microservice"
        );

        let readiness = service.ready().await;
        for dependency in &readiness.dependencies {
            if dependency.available {
                info!(dependency = %dependency.name, latency_ms = ?dependency.latency_ms, "Dependency available");
            } else {
                warn!(dependency = %dependency.name, "Dependency unavailable at startup");
            }
        }

        let server = service.clone();
        let mut server_handle = tokio::spawn(async move { server.start().await });

        let outcome = tokio::select! {
            _ = Self::wait_for_shutdown() => {
                info!("Shutdown signal received, gracefully stopping...");
                Ok(())
            }
            joined = &mut server_handle => match joined {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    error!(error = %e, "Service stopped with an error");
                    Err(e)
                }
                Err(e) => Err(PulseError::Internal(format!("service task failed: {}", e))),
            },
        };

        if let Err(e) = service.shutdown().await {
            warn!(error = %e, "Error during shutdown");
        }
        server_handle.abort();

        let health = service.health().await;
        info!(uptime_seconds = health.uptime_seconds, "Microservice stopped");

        outcome
    }

    async fn wait_for_shutdown() {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!("Failed to listen for SIGTERM: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }
}
