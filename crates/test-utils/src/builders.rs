//! Builders for typed requests, stub responses and temporary config files.

use std::io::Write;

use chrono::{DateTime, TimeZone, Utc};
use sos_common::{versions, SOS};
use sos_protocol::requests::{
    DeleteSensorRequest, DescribeSensorRequest, GetCapabilitiesRequest, GetObservationRequest,
    InsertObservationRequest, InsertSensorRequest,
};
use sos_protocol::responses::{DeleteSensorResponse, DescribeSensorResponse, ObservationsResponse};
use sos_protocol::{KvpParams, Observation, ObservationValue, Request, Response, ResponseBody};
use tempfile::NamedTempFile;

use crate::fixtures::{ids, sensorml};

/// Build KVP parameters from literal pairs.
pub fn kvp(pairs: &[(&str, &str)]) -> KvpParams {
    KvpParams::from_pairs(pairs.iter().copied())
}

/// The fixture reference time as a timestamp.
pub fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
}

/// A temperature measurement from the fixture sensor.
pub fn sample_observation(value: f64) -> Observation {
    Observation {
        identifier: None,
        procedure: ids::PROCEDURE.to_string(),
        observed_property: ids::OBSERVED_PROPERTY.to_string(),
        feature_of_interest: ids::FEATURE.to_string(),
        phenomenon_time: reference_time(),
        result: ObservationValue::Measure {
            value,
            uom: "Cel".to_string(),
        },
    }
}

/// SOS 2.0.0 request with service and version set.
pub fn sos_request(body: impl Into<sos_protocol::RequestBody>) -> Request {
    Request::new(body)
        .with_service(SOS)
        .with_version(versions::V2_0_0)
}

pub fn get_capabilities_request() -> Request {
    Request::new(GetCapabilitiesRequest::default()).with_service(SOS)
}

pub fn describe_sensor_request(procedure: &str) -> Request {
    sos_request(DescribeSensorRequest {
        procedure: procedure.to_string(),
        procedure_description_format: None,
        valid_time: None,
    })
}

pub fn get_observation_request() -> Request {
    sos_request(GetObservationRequest::default())
}

pub fn insert_sensor_request() -> Request {
    sos_request(InsertSensorRequest {
        procedure_description_format: sos_common::media_types::SENSORML_2_0.to_string(),
        procedure_description: sensorml::PHYSICAL_SYSTEM.to_string(),
        observable_properties: vec![ids::OBSERVED_PROPERTY.to_string()],
        procedure: Some(ids::PROCEDURE.to_string()),
    })
}

pub fn insert_observation_request(values: &[f64]) -> Request {
    sos_request(InsertObservationRequest {
        offerings: vec![ids::OFFERING.to_string()],
        observations: values.iter().map(|v| sample_observation(*v)).collect(),
    })
}

pub fn delete_sensor_request(procedure: &str) -> Request {
    sos_request(DeleteSensorRequest {
        procedure: procedure.to_string(),
    })
}

/// Stub response for a describe sensor request.
pub fn describe_sensor_response() -> Response {
    Response::new(
        SOS,
        versions::V2_0_0,
        DescribeSensorResponse {
            procedure: ids::PROCEDURE.to_string(),
            procedure_description_format: sos_common::media_types::SENSORML_2_0.to_string(),
            description: sensorml::PHYSICAL_SYSTEM.to_string(),
        },
    )
}

/// Stub response carrying the given observations.
pub fn observations_response(observations: Vec<Observation>) -> Response {
    Response::new(
        SOS,
        versions::V2_0_0,
        ResponseBody::GetObservation(ObservationsResponse { observations }),
    )
}

pub fn delete_sensor_response(procedure: &str) -> Response {
    Response::new(
        SOS,
        versions::V2_0_0,
        DeleteSensorResponse {
            deleted_procedure: procedure.to_string(),
        },
    )
}

/// Write a YAML config to a temporary file that lives as long as the handle.
pub fn temp_config(yaml: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("Failed to create temp config");
    file.write_all(yaml.as_bytes())
        .expect("Failed to write temp config");
    file.flush().expect("Failed to flush temp config");
    file
}
