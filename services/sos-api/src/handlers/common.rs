//! Shared handler utilities: transport context extraction, response
//! conversion and the blocking pipeline call.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::Response,
};
use sos_common::{CodedException, Fault};
use sos_protocol::RequestContext;
use tracing::error;

use crate::binding::{Binding, OutboundMessage, TransportMessage};
use crate::state::AppState;

/// Caller facts from the connection and headers.
pub fn context_from(headers: &HeaderMap, addr: Option<SocketAddr>) -> RequestContext {
    let forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string());

    RequestContext {
        remote_addr: addr.map(|a| a.ip()),
        forwarded_for,
        token,
    }
}

/// Content-Type and Accept headers as strings.
pub fn negotiation_headers(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let get = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    (get(header::CONTENT_TYPE), get(header::ACCEPT))
}

/// Convert a pipeline answer into an HTTP response.
pub fn to_http_response(out: OutboundMessage) -> Response {
    let status = StatusCode::from_u16(out.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = Response::new(Body::from(out.body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    if let Some(media_type) = out.media_type.as_deref() {
        if let Ok(value) = HeaderValue::from_str(media_type) {
            headers.insert(header::CONTENT_TYPE, value);
        }
    }
    for (name, value) in &out.headers {
        match (HeaderName::try_from(name.as_str()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => error!(header = %name, "Dropping invalid response header"),
        }
    }
    response
}

/// Run the pipeline on tokio's blocking pool.
///
/// A failed worker is reported as a NoApplicableCode fault in the binding
/// the request was addressed to.
pub async fn run_pipeline(state: Arc<AppState>, message: TransportMessage) -> Response {
    let pipeline = Arc::clone(&state.pipeline);
    let binding = Binding::assumed(&message);
    let accept = message.accept.clone();

    match tokio::task::spawn_blocking(move || pipeline.process(message)).await {
        Ok(out) => to_http_response(out),
        Err(e) => {
            error!(error = %e, "Pipeline worker failed");
            let fault: Fault = CodedException::no_applicable_code(format!(
                "The request could not be processed: {}",
                e
            ))
            .with_cause(e)
            .into();
            to_http_response(state.pipeline.fault_response(&fault, binding, accept.as_deref()))
        }
    }
}
