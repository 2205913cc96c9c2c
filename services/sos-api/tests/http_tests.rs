//! HTTP router tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use sos_api::{routes, AppState, SosConfig};
use sos_common::media_types;
use test_utils::{assert_body_contains, fixtures};
use tower::ServiceExt;

const BODY_LIMIT: usize = 1024 * 1024;

fn app() -> Router {
    let state = Arc::new(AppState::from_config(SosConfig::default(), None).unwrap());
    routes::build_router(state, "/rest")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), BODY_LIMIT).await.unwrap();
    (status, headers, String::from_utf8_lossy(&bytes).into_owned())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health() {
    let (status, _, body) = send(&app(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_body_contains!(body, "ok");

    let (status, _, body) = send(&app(), get("/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_body_contains!(body, "\"ready\":true");
}

#[tokio::test]
async fn test_kvp_capabilities() {
    let uri = format!(
        "/service?{}",
        fixtures::kvp::to_query_string(fixtures::kvp::GET_CAPABILITIES)
    );
    let (status, headers, body) = send(&app(), get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], media_types::XML);
    assert_body_contains!(body, "Capabilities");
}

#[tokio::test]
async fn test_put_on_service_endpoint() {
    let request = Request::builder()
        .method(Method::PUT)
        .uri("/service")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app(), request).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_body_contains!(body, "ExceptionReport");
}

#[tokio::test]
async fn test_rest_options() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/rest/sensors")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(&app(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::ALLOW], "GET, POST, PUT, DELETE, OPTIONS");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["body"]["resource"], "sensors");

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/rest")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(&app(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::ALLOW], "GET, OPTIONS");
    let value: Value = serde_json::from_str(&body).unwrap();
    assert!(value["resources"]["observations"].is_array());
}

#[tokio::test]
async fn test_rest_options_preflight_reaches_handler() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/rest/observations")
        .header(header::ORIGIN, "http://client.example.org")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send(&app(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::ALLOW], "GET, POST, OPTIONS");
    assert_eq!(headers[header::CONTENT_TYPE], media_types::JSON);
}

#[tokio::test]
async fn test_rest_options_disabled() {
    let app = app();
    let request = Request::builder()
        .method(Method::PUT)
        .uri("/admin/operations/SOS/2.0.0/Options")
        .header(header::CONTENT_TYPE, media_types::JSON)
        .body(Body::from(r#"{"enabled": false}"#))
        .unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/rest/sensors")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(headers.get(header::ALLOW).is_none());
    assert_body_contains!(body, "OperationNotSupported");
}

#[tokio::test]
async fn test_cors_on_service_endpoint() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/service")
        .header(header::ORIGIN, "http://client.example.org")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send(&app(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
}

#[tokio::test]
async fn test_rest_unknown_resource() {
    let (status, headers, _) = send(&app(), get("/rest/nothing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(headers[header::CONTENT_TYPE], media_types::JSON);
}

#[tokio::test]
async fn test_rest_capabilities() {
    let (status, _, body) = send(&app(), get("/rest/capabilities")).await;
    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["service"], "SOS");
}

#[tokio::test]
async fn test_admin_toggle() {
    let app = app();
    let uri = "/service?service=SOS&version=2.0.0&request=GetFeatureOfInterest";

    let toggle = |enabled: bool| {
        Request::builder()
            .method(Method::PUT)
            .uri("/admin/operations/SOS/2.0.0/GetFeatureOfInterest")
            .header(header::CONTENT_TYPE, media_types::JSON)
            .body(Body::from(format!(r#"{{"enabled": {}}}"#, enabled)))
            .unwrap()
    };

    let (status, _, body) = send(&app, toggle(false)).await;
    assert_eq!(status, StatusCode::OK);
    let entry: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(entry["enabled"], false);

    let (status, _, body) = send(&app, get(uri)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_body_contains!(body, "OperationNotSupported");

    send(&app, toggle(true)).await;
    let (status, _, _) = send(&app, get(uri)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_admin_toggle_unknown_key() {
    let request = Request::builder()
        .method(Method::PUT)
        .uri("/admin/operations/SOS/3.0.0/GetCapabilities")
        .header(header::CONTENT_TYPE, media_types::JSON)
        .body(Body::from(r#"{"enabled": false}"#))
        .unwrap();
    let (status, _, _) = send(&app(), request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_operations_and_stats() {
    let app = app();
    let (status, _, body) = send(&app, get("/admin/operations")).await;
    assert_eq!(status, StatusCode::OK);
    let entries: Vec<Value> = serde_json::from_str(&body).unwrap();
    assert!(entries
        .iter()
        .any(|e| e["version"] == "1.0.0" && e["operation"] == "DescribeSensor"));

    send(&app, get("/service?service=SOS&request=GetCapabilities")).await;
    let (status, _, body) = send(&app, get("/admin/stats")).await;
    assert_eq!(status, StatusCode::OK);
    let stats: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(stats["requests"], 1);
}

#[tokio::test]
async fn test_reload_without_config_file() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/admin/config/reload")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app(), request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_body_contains!(body, "error");
}

#[tokio::test]
async fn test_metrics_without_recorder() {
    let (status, _, _) = send(&app(), get("/metrics")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
