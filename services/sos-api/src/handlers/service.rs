//! Operation endpoint handler: KVP over GET, POX, SOAP and JSON over POST.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, Extension, Query},
    http::{HeaderMap, Method},
    response::Response,
};
use tracing::{debug, instrument};

use super::common::{context_from, negotiation_headers, run_pipeline};
use crate::binding::{Endpoint, TransportMessage};
use crate::state::AppState;

/// Any method on `/service`. Unsupported methods are rejected by the
/// pipeline with an exception report.
#[instrument(skip_all, fields(method = %method))]
pub async fn service_handler(
    Extension(state): Extension<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Response {
    let (content_type, accept) = negotiation_headers(&headers);
    debug!(
        params = query.len(),
        body_len = body.len(),
        content_type = ?content_type,
        "Service request"
    );

    let message = TransportMessage {
        endpoint: Endpoint::Service,
        method: method.as_str().to_string(),
        path: String::new(),
        query,
        content_type,
        accept,
        body,
        context: context_from(&headers, connect_info.map(|ConnectInfo(addr)| addr)),
    };

    run_pipeline(state, message).await
}
