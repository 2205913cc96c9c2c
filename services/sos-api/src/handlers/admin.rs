//! Administrative endpoints: operation toggles, config reload and stats.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use sos_common::OperationKey;
use tracing::{error, info, instrument};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub enabled: bool,
}

/// GET /admin/operations - Registered and disabled operation keys
pub async fn list_operations_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    Json(state.operations.entries())
}

/// PUT /admin/operations/:service/:version/:operation - Enable or disable an
/// operation. The next dispatch observes the change.
#[instrument(skip(state))]
pub async fn toggle_operation_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((service, version, operation)): Path<(String, String, String)>,
    Json(toggle): Json<ToggleRequest>,
) -> Response {
    let key = OperationKey::new(service, version, operation);
    let known = |key: &OperationKey| {
        state.operations.entries().into_iter().find(|e| {
            e.service == key.service && e.version == key.version && e.operation == key.operation
        })
    };

    if known(&key).is_none() {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": format!("Unknown operation {}", key)
            })),
        )
            .into_response();
    }

    state.operations.set_enabled(&key, toggle.enabled);
    info!(key = %key, enabled = toggle.enabled, "Operation toggled");

    match known(&key) {
        Some(entry) => Json(entry).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// POST /admin/config/reload - Re-read the configuration file
#[instrument(skip(state))]
pub async fn reload_config_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    match state.reload_config().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "reloaded" })),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Configuration reload failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": format!("{:#}", e) })),
            )
                .into_response()
        }
    }
}

/// GET /admin/stats - Request counters and timing
pub async fn stats_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}
