//! REST resource tree handler.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, Extension, Path, Query},
    http::{HeaderMap, Method},
    response::Response,
};
use tracing::{debug, instrument};

use super::common::{context_from, negotiation_headers, run_pipeline};
use crate::binding::{Endpoint, TransportMessage};
use crate::state::AppState;

/// Any method on the REST endpoint or a path below it.
#[instrument(skip_all, fields(method = %method))]
pub async fn rest_handler(
    Extension(state): Extension<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    path: Option<Path<String>>,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Response {
    let (content_type, accept) = negotiation_headers(&headers);
    let path = path
        .map(|Path(p)| p.trim_matches('/').to_string())
        .unwrap_or_default();
    debug!(path = %path, "REST request");

    let message = TransportMessage {
        endpoint: Endpoint::Rest,
        method: method.as_str().to_string(),
        path,
        query,
        content_type,
        accept,
        body,
        context: context_from(&headers, connect_info.map(|ConnectInfo(addr)| addr)),
    };

    run_pipeline(state, message).await
}
