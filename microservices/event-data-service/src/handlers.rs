//! HTTP handlers for Event Data Service

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;

use crate::error::{ApiError, Result};
use crate::metrics::MetricsSnapshot;
use crate::types::EventDataValueCount;
use crate::validation::{malformed_query, ValuesQueryParams};
use crate::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Ready check response
#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub store: String,
}

// ============================================
// Health & Metrics Handlers
// ============================================

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "event-data-service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let store = state.pipeline.engine().store();

    Json(ReadyResponse {
        ready: store.is_healthy().await,
        store: store.backend().to_string(),
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

// ============================================
// Event Data Handlers
// ============================================

/// `GET /api/websites/{website_id}/event-data/values`
pub async fn event_data_values(
    State(state): State<AppState>,
    Path(website_id): Path<String>,
    headers: HeaderMap,
    params: std::result::Result<Query<ValuesQueryParams>, QueryRejection>,
) -> Result<Json<Vec<EventDataValueCount>>> {
    let Query(params) = params.map_err(|rejection| {
        state.metrics.rejected.inc();
        ApiError::Validation(malformed_query(rejection.body_text()))
    })?;

    let identity = state.identity.resolve(&headers);
    let values = state.pipeline.run(&identity, &website_id, &params).await?;

    Ok(Json(values))
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
