//! Health and metrics handlers.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub operations: usize,
    pub sensors: usize,
}

/// GET /health - Basic health check
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /ready - Ready once operations are registered and the store answers
pub async fn ready_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    let operations = state
        .operations
        .entries()
        .iter()
        .filter(|e| e.registered)
        .count();
    let sensors = state.store.sensors().map(|s| s.len());

    let response = ReadyResponse {
        ready: operations > 0 && sensors.is_ok(),
        operations,
        sensors: sensors.unwrap_or(0),
    };
    let status = if response.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response)).into_response()
}

/// GET /metrics - Prometheus metrics
pub async fn metrics_handler(handle: Option<Extension<PrometheusHandle>>) -> Response {
    match handle {
        Some(Extension(handle)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "Metrics recorder not installed").into_response(),
    }
}
