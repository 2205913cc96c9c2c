//! Router construction.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header, HeaderValue},
    routing::{any, get, post, put},
    Router,
};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::handlers;
use crate::state::AppState;

/// Build the router. The REST tree is mounted at `url_pattern`.
///
/// The REST tree answers OPTIONS itself, so the CORS layer that would
/// short-circuit preflights is only applied to the other routes.
pub fn build_router(state: Arc<AppState>, url_pattern: &str) -> Router {
    let rest_root = url_pattern.trim_end_matches('/');

    let rest = Router::new()
        .route(rest_root, any(handlers::rest_handler))
        .route(&format!("{}/", rest_root), any(handlers::rest_handler))
        .route(&format!("{}/*path", rest_root), any(handlers::rest_handler))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ));

    let api = Router::new()
        // Operation endpoint (KVP, POX, SOAP, JSON)
        .route("/service", any(handlers::service_handler))
        .route("/service/", any(handlers::service_handler))
        // Administration
        .route("/admin/operations", get(handlers::list_operations_handler))
        .route(
            "/admin/operations/:service/:version/:operation",
            put(handlers::toggle_operation_handler),
        )
        .route("/admin/config/reload", post(handlers::reload_config_handler))
        .route("/admin/stats", get(handlers::stats_handler))
        // Health and metrics
        .route("/health", get(handlers::health_handler))
        .route("/ready", get(handlers::ready_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(CorsLayer::permissive());

    Router::new()
        .merge(rest)
        .merge(api)
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
}
