//! Decoding and encoding across bindings using the shared fixtures.

use sos_common::{media_types, ExceptionCode, FaultHint, FormatKey, Operation};
use sos_protocol::requests::RequestBody;
use sos_protocol::{
    Decoder, Encoder, FaultEncoder, JsonDecoder, JsonEncoder, KvpDecoder,
    OwsExceptionReportEncoder, Payload, PoxDecoder, SoapEnvelope, SoapFaultEncoder, SosXmlEncoder,
    XmlElement,
};
use test_utils::{assert_body_contains, assert_fault, fixtures, kvp, sample_observation};

// ============================================================================
// KVP
// ============================================================================

#[test]
fn test_kvp_get_observation_fixture() {
    let params = kvp(fixtures::kvp::GET_OBSERVATION);
    let request = KvpDecoder::new()
        .decode(&Payload::Kvp(&params))
        .unwrap()
        .expect("KVP payload is decoded");

    assert_eq!(request.operation(), Operation::GetObservation);
    assert_eq!(request.service.as_deref(), Some("SOS"));
    assert_eq!(request.response_format(), Some(media_types::OM_2_0));
}

#[test]
fn test_kvp_decoder_ignores_other_payloads() {
    let root = XmlElement::parse(fixtures::pox::GET_OBSERVATION).unwrap();
    assert!(KvpDecoder::new().decode(&Payload::Xml(&root)).unwrap().is_none());
}

#[test]
fn test_kvp_transactional_operation_rejected() {
    let params = kvp(&[("service", "SOS"), ("version", "2.0.0"), ("request", "DeleteSensor")]);
    let fault = KvpDecoder::new().decode_params(&params).unwrap_err();
    assert_fault!(fault, ExceptionCode::InvalidParameterValue, "request");
}

// ============================================================================
// POX and SOAP
// ============================================================================

#[test]
fn test_pox_insert_sensor_fixture() {
    let root = XmlElement::parse(fixtures::pox::INSERT_SENSOR).unwrap();
    let request = PoxDecoder::new().decode_document(&root).unwrap();

    match request.body {
        RequestBody::InsertSensor(insert) => {
            assert_eq!(insert.procedure.as_deref(), Some(fixtures::ids::PROCEDURE));
            assert_eq!(insert.observable_properties, vec![fixtures::ids::OBSERVED_PROPERTY]);
            assert!(insert.procedure_description.contains("PhysicalSystem"));
        }
        other => panic!("unexpected body: {:?}", other),
    }
}

#[test]
fn test_pox_insert_observation_fixture() {
    let root = XmlElement::parse(fixtures::pox::INSERT_OBSERVATION).unwrap();
    let request = PoxDecoder::new().decode_document(&root).unwrap();

    match request.body {
        RequestBody::InsertObservation(insert) => {
            assert_eq!(insert.offerings, vec![fixtures::ids::OFFERING]);
            assert_eq!(insert.observations, vec![sample_observation(21.5)]);
        }
        other => panic!("unexpected body: {:?}", other),
    }
}

#[test]
fn test_pox_keys_cover_namespaces() {
    let keys = PoxDecoder::new().keys();
    assert!(keys.contains(&FormatKey::request(
        sos_common::namespaces::SWES_2_0,
        Operation::InsertSensor
    )));
    assert!(keys.contains(&FormatKey::request(
        sos_common::namespaces::SOS_1_0,
        Operation::GetCapabilities
    )));
}

#[test]
fn test_soap_payload_decodes_as_pox() {
    let root = XmlElement::parse(fixtures::soap::GET_CAPABILITIES).unwrap();
    let envelope = SoapEnvelope::from_element(root).unwrap();
    let request = PoxDecoder::new()
        .decode(&Payload::Xml(&envelope.payload))
        .unwrap()
        .expect("envelope payload is decoded");

    assert_eq!(request.operation(), Operation::GetCapabilities);
    assert_eq!(request.version, None);
    assert!(envelope.header_extensions().get("MessageID").is_some());
}

#[test]
fn test_malformed_xml_is_bad_request() {
    let fault = XmlElement::parse(fixtures::pox::MALFORMED).unwrap_err();
    assert_eq!(fault.first().hint, Some(FaultHint::BadRequest));
}

// ============================================================================
// JSON
// ============================================================================

#[test]
fn test_json_batch_fixture() {
    let value: serde_json::Value = serde_json::from_str(&fixtures::json::batch(true)).unwrap();
    let request = JsonDecoder::new().decode_value(&value).unwrap();

    match request.body {
        RequestBody::Batch(batch) => {
            assert!(batch.stop_at_failure);
            let operations: Vec<_> = batch.requests.iter().map(|r| r.operation()).collect();
            assert_eq!(
                operations,
                vec![
                    Operation::GetCapabilities,
                    Operation::DescribeSensor,
                    Operation::GetFeatureOfInterest
                ]
            );
        }
        other => panic!("unexpected body: {:?}", other),
    }
}

#[test]
fn test_json_response_reads_back() {
    let response = test_utils::observations_response(vec![sample_observation(3.25)]);
    let bytes = JsonEncoder::new()
        .encode(&response, media_types::JSON)
        .unwrap()
        .unwrap();
    let decoded = sos_protocol::json::decode_response(&bytes).unwrap();
    assert_eq!(decoded, response);
}

// ============================================================================
// Encoders
// ============================================================================

#[test]
fn test_xml_observations_document_is_well_formed() {
    let response = test_utils::observations_response(vec![sample_observation(21.5)]);
    let bytes = SosXmlEncoder::new()
        .encode(&response, media_types::OM_2_0)
        .unwrap()
        .unwrap();
    let xml = String::from_utf8(bytes.to_vec()).unwrap();

    let root = XmlElement::parse(&xml).unwrap();
    assert_eq!(root.local_name, "GetObservationResponse");
    assert_body_contains!(xml, "uom=\"Cel\"");
    assert_body_contains!(xml, fixtures::ids::PROCEDURE);
}

#[test]
fn test_fault_encoders_agree_on_content() {
    let fault = sos_common::Fault::from(sos_common::CodedException::missing_parameter("service"));

    let report = OwsExceptionReportEncoder.encode(&fault, 400).unwrap();
    let soap = SoapFaultEncoder.encode(&fault, 400).unwrap();

    for bytes in [report, soap] {
        let xml = String::from_utf8(bytes.to_vec()).unwrap();
        assert_body_contains!(xml, "exceptionCode=\"MissingParameterValue\"");
        assert_body_contains!(xml, "locator=\"service\"");
    }
}
