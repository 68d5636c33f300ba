//! Configuration for Event Data Service

use anyhow::{bail, Context};
use pulse_core::ServiceConfig;
use std::str::FromStr;

const MIN_JWT_SECRET_LEN: usize = 32;

/// Where event data and website ownership are read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// Process-local and empty at startup; only useful for smoke-testing the HTTP surface
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown STORE_BACKEND '{}', expected 'postgres' or 'memory'", other),
        }
    }
}

/// Event Data Service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared service settings (bind address, database URL, log level)
    pub service: ServiceConfig,
    pub store_backend: StoreBackend,
    /// HMAC secret for bearer and share tokens
    pub jwt_secret: String,
    pub jwt_issuer: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let mut service = ServiceConfig::from_env().context("loading service configuration")?;
        if std::env::var("SERVICE_NAME").is_err() {
            service.service_name = "event-data-service".to_string();
        }

        let store_backend: StoreBackend = std::env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse()?;

        let jwt_secret = jwt_secret(std::env::var("JWT_SECRET").ok())?;

        Ok(Self {
            service,
            store_backend,
            jwt_secret,
            jwt_issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "pulse".to_string()),
        })
    }
}

/// Rejects a missing or short `JWT_SECRET`
fn jwt_secret(raw: Option<String>) -> anyhow::Result<String> {
    match raw {
        Some(secret) if secret.len() >= MIN_JWT_SECRET_LEN => Ok(secret),
        Some(_) => bail!("JWT_SECRET must be at least {} bytes", MIN_JWT_SECRET_LEN),
        None => bail!("JWT_SECRET must be set"),
    }
}
