//! End-to-end pipeline tests over the wired application state.

use sos_api::{AppState, SosConfig, TransportMessage};
use sos_common::media_types;
use sos_protocol::json::decode_response;
use sos_protocol::ResponseBody;
use test_utils::{assert_body_contains, fixtures, ids};

fn state() -> AppState {
    AppState::from_config(SosConfig::default(), None).unwrap()
}

fn state_with(yaml: &str) -> AppState {
    AppState::from_config(SosConfig::from_yaml(yaml).unwrap(), None).unwrap()
}

/// Register the fixture sensor and one observation through the POX binding.
fn seed(state: &AppState) {
    let out = state
        .pipeline
        .process(TransportMessage::post(media_types::XML, fixtures::pox::INSERT_SENSOR));
    assert_eq!(out.status, 200, "{}", out.text());

    let out = state
        .pipeline
        .process(TransportMessage::post(media_types::XML, fixtures::pox::INSERT_OBSERVATION));
    assert_eq!(out.status, 200, "{}", out.text());
}

#[test]
fn test_kvp_get_observation_in_om() {
    let state = state();
    seed(&state);

    let out = state
        .pipeline
        .process(TransportMessage::kvp(fixtures::kvp::GET_OBSERVATION.iter().copied()));

    assert_eq!(out.status, 200);
    assert_eq!(out.media_type.as_deref(), Some(media_types::XML));
    let body = out.text();
    assert_body_contains!(body, "GetObservationResponse");
    assert_body_contains!(body, "OM_Observation");
    assert_body_contains!(body, ids::PROCEDURE);
    assert_body_contains!(body, "21.5");
}

#[test]
fn test_unknown_version_is_bad_request() {
    let out = state().pipeline.process(TransportMessage::kvp([
        ("service", "SOS"),
        ("version", "9.9.9"),
        ("request", "GetObservation"),
    ]));
    assert_eq!(out.status, 400);
    assert_body_contains!(out.text(), "InvalidParameterValue");
    assert_body_contains!(out.text(), "version");
}

#[test]
fn test_accept_versions_negotiation() {
    let state = state();
    let out = state
        .pipeline
        .process(TransportMessage::post(media_types::XML, fixtures::pox::GET_CAPABILITIES));
    assert_eq!(out.status, 200);
    assert_body_contains!(out.text(), "2.0.0");

    let out = state.pipeline.process(TransportMessage::kvp([
        ("service", "SOS"),
        ("request", "GetCapabilities"),
        ("AcceptVersions", "9.9.9"),
    ]));
    assert_eq!(out.status, 400);
    assert_body_contains!(out.text(), "VersionNegotiationFailed");
}

#[test]
fn test_batch_stop_at_failure() {
    let state = state();

    let lengths: Vec<usize> = [true, false]
        .into_iter()
        .map(|stop| {
            let out = state
                .pipeline
                .process(TransportMessage::post(media_types::JSON, fixtures::json::batch(stop)));
            assert_eq!(out.status, 200, "{}", out.text());
            match decode_response(&out.body).unwrap().body {
                ResponseBody::Batch(batch) => {
                    assert_eq!(batch.failures(), 1);
                    batch.results.len()
                }
                other => panic!("expected batch response, got {:?}", other),
            }
        })
        .collect();

    assert_eq!(lengths, vec![2, 3]);
}

#[test]
fn test_disabled_operation() {
    let state = state_with("operations:\n  disabled:\n    - SOS/2.0.0/DeleteSensor\n");
    let out = state
        .pipeline
        .process(TransportMessage::post(media_types::JSON, fixtures::json::DELETE_SENSOR));

    assert_eq!(out.status, 400);
    assert_eq!(out.media_type.as_deref(), Some(media_types::JSON));
    assert_body_contains!(out.text(), "OperationNotSupported");
}

#[test]
fn test_unsupported_content_type() {
    let out = state()
        .pipeline
        .process(TransportMessage::post("text/plain", "service=SOS"));
    assert_eq!(out.status, 415);
}

#[test]
fn test_unacceptable_accept_header() {
    let out = state().pipeline.process(
        TransportMessage::kvp(fixtures::kvp::GET_CAPABILITIES.iter().copied()).with_accept("image/png"),
    );
    assert_eq!(out.status, 406);
}

#[test]
fn test_refused_accept_is_not_acceptable() {
    let out = state()
        .pipeline
        .process(TransportMessage::rest("GET", "capabilities").with_accept("application/json;q=0"));
    assert_eq!(out.status, 406);
    assert_body_contains!(out.text(), "NoApplicableCode");
}

#[test]
fn test_soap_fault_for_unknown_version() {
    let out = state().pipeline.process(TransportMessage::post(
        media_types::SOAP,
        fixtures::soap::DESCRIBE_UNKNOWN_VERSION,
    ));
    assert_eq!(out.status, 400);
    assert_eq!(out.media_type.as_deref(), Some(media_types::SOAP));
    assert_body_contains!(out.text(), "env:Sender");
    assert_body_contains!(out.text(), "ExceptionReport");
}

#[test]
fn test_soap11_fault_for_unknown_version() {
    let out = state().pipeline.process(TransportMessage::post(
        media_types::TEXT_XML,
        fixtures::soap::DESCRIBE_UNKNOWN_VERSION_11,
    ));
    assert_eq!(out.status, 400);
    assert_eq!(out.media_type.as_deref(), Some(media_types::TEXT_XML));
    let body = out.text();
    assert_body_contains!(body, "http://schemas.xmlsoap.org/soap/envelope/");
    assert_body_contains!(body, "<faultcode>soap:Client</faultcode>");
    assert_body_contains!(body, "<detail>");
    assert_body_contains!(body, "ExceptionReport");
    assert!(!body.contains("env:Sender"));
}

#[test]
fn test_soap_capabilities_wrapped() {
    let out = state().pipeline.process(TransportMessage::post(
        media_types::SOAP,
        fixtures::soap::GET_CAPABILITIES,
    ));
    assert_eq!(out.status, 200);
    assert_body_contains!(out.text(), "Envelope");
    assert_body_contains!(out.text(), "Capabilities");
}

#[test]
fn test_json_delete_round_trip() {
    let state = state();
    seed(&state);

    let out = state
        .pipeline
        .process(TransportMessage::post(media_types::JSON, fixtures::json::DELETE_SENSOR));
    assert_eq!(out.status, 200, "{}", out.text());

    let response = decode_response(&out.body).unwrap();
    match response.body {
        ResponseBody::DeleteSensor(r) => assert_eq!(r.deleted_procedure, ids::PROCEDURE),
        other => panic!("expected delete response, got {:?}", other),
    }

    // Observations of the deleted sensor are gone
    assert!(state.store.observations(&Default::default()).unwrap().is_empty());
}

#[test]
fn test_rest_describe_sensor_with_links() {
    let state = state();
    seed(&state);

    let out = state
        .pipeline
        .process(TransportMessage::rest("GET", &format!("sensors/{}", ids::PROCEDURE)));
    assert_eq!(out.status, 200, "{}", out.text());
    assert_eq!(out.media_type.as_deref(), Some(media_types::JSON));

    let response = decode_response(&out.body).unwrap();
    assert!(!response.links.is_empty());
    assert!(matches!(response.body, ResponseBody::DescribeSensor(_)));
}

#[test]
fn test_rest_method_not_allowed() {
    let out = state()
        .pipeline
        .process(TransportMessage::rest("DELETE", "features"));
    assert_eq!(out.status, 405);
}

#[test]
fn test_reload_applies_phrases() {
    let file = test_utils::temp_config("faults:\n  wrong_content_type: Media type refused\n");
    let state = AppState::load(file.path()).unwrap();

    tokio_test::block_on(state.reload_config()).unwrap();

    let out = state
        .pipeline
        .process(TransportMessage::post("text/plain", "x"));
    assert_eq!(out.status, 415);
    assert_body_contains!(out.text(), "Media type refused");
}
