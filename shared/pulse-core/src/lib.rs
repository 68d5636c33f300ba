//! Pulse Core - Shared domain types and service infrastructure
//!
//! This crate provides:
//! - Standard service trait all microservices must implement
//! - Common identifiers (WebsiteId, UserId, TeamId)
//! - Error handling utilities
//! - Configuration management

pub mod config;
pub mod domain;
pub mod error;
pub mod service;

pub use config::ServiceConfig;
pub use domain::*;
pub use error::{PulseError, Result};
pub use service::{DependencyStatus, HealthStatus, MicroserviceRuntime, PulseService, ReadinessStatus};
