//! JSON binding.
//!
//! Requests are objects with `service`, `version` and `request` members
//! next to the operation's own camelCase members. A `Batch` request nests
//! further request objects under `requests`. Responses are the serde form
//! of [`Response`].

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sos_common::{media_types, CodedException, Fault, FormatKey, Operation};

use crate::codec::{Decoder, DecoderHint, Encoder, Payload};
use crate::requests::{
    BatchRequest, DeleteSensorRequest, DescribeSensorRequest, GetCapabilitiesRequest,
    GetFeatureOfInterestRequest, GetObservationByIdRequest, GetObservationRequest,
    GetResultRequest, InsertObservationRequest, InsertSensorRequest, Request, RequestBody,
    UpdateSensorDescriptionRequest,
};
use crate::responses::Response;

/// Decoder for JSON request bodies.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDecoder;

impl JsonDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode a JSON request object, recursing into batch members.
    pub fn decode_value(&self, value: &Value) -> Result<Request, Fault> {
        let object = value.as_object().ok_or_else(|| {
            CodedException::invalid_parameter("request", "The JSON request must be an object")
        })?;

        let name = object
            .get("request")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| CodedException::missing_parameter("request"))?;

        let operation: Operation = name.parse().map_err(|_| {
            CodedException::invalid_parameter(
                "request",
                format!("The requested operation '{}' is not known", name),
            )
        })?;

        let body = match operation {
            Operation::GetCapabilities => {
                RequestBody::GetCapabilities(body_of::<GetCapabilitiesRequest>(value, operation)?)
            }
            Operation::DescribeSensor => {
                RequestBody::DescribeSensor(body_of::<DescribeSensorRequest>(value, operation)?)
            }
            Operation::GetObservation => {
                RequestBody::GetObservation(body_of::<GetObservationRequest>(value, operation)?)
            }
            Operation::GetObservationById => RequestBody::GetObservationById(
                body_of::<GetObservationByIdRequest>(value, operation)?,
            ),
            Operation::InsertObservation => RequestBody::InsertObservation(
                body_of::<InsertObservationRequest>(value, operation)?,
            ),
            Operation::InsertSensor => {
                RequestBody::InsertSensor(body_of::<InsertSensorRequest>(value, operation)?)
            }
            Operation::UpdateSensorDescription => RequestBody::UpdateSensorDescription(
                body_of::<UpdateSensorDescriptionRequest>(value, operation)?,
            ),
            Operation::DeleteSensor => {
                RequestBody::DeleteSensor(body_of::<DeleteSensorRequest>(value, operation)?)
            }
            Operation::GetResult => {
                RequestBody::GetResult(body_of::<GetResultRequest>(value, operation)?)
            }
            Operation::GetFeatureOfInterest => RequestBody::GetFeatureOfInterest(
                body_of::<GetFeatureOfInterestRequest>(value, operation)?,
            ),
            Operation::Batch => {
                let members = object
                    .get("requests")
                    .and_then(Value::as_array)
                    .ok_or_else(|| CodedException::missing_parameter("requests"))?;
                let requests = members
                    .iter()
                    .map(|member| self.decode_value(member))
                    .collect::<Result<Vec<_>, Fault>>()?;
                RequestBody::Batch(BatchRequest {
                    requests,
                    stop_at_failure: object
                        .get("stopAtFailure")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                })
            }
            Operation::Options => {
                return Err(CodedException::invalid_parameter(
                    "request",
                    "Options requests are only supported by the REST binding",
                )
                .into());
            }
        };

        let mut request = Request::new(body);
        request.service = string_member(value, "service");
        request.version = string_member(value, "version");

        if let Some(extensions) = object.get("extensions").and_then(Value::as_object) {
            for (name, ext) in extensions {
                let text = match ext {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                request.extensions.insert(name.clone(), text);
            }
        }
        Ok(request)
    }
}

fn string_member(value: &Value, name: &str) -> Option<String> {
    value
        .get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Deserialize the operation members of a request object.
fn body_of<T: DeserializeOwned>(value: &Value, operation: Operation) -> Result<T, Fault> {
    T::deserialize(value).map_err(|e| {
        Fault::from(
            CodedException::invalid_parameter(operation.as_str(), format!("Invalid {} request: {}", operation, e))
                .with_cause(e),
        )
    })
}

impl Decoder for JsonDecoder {
    fn name(&self) -> &'static str {
        "JsonDecoder"
    }

    fn keys(&self) -> Vec<FormatKey> {
        Operation::ALL
            .iter()
            .map(|op| FormatKey::request(media_types::JSON, *op))
            .collect()
    }

    fn accepts(&self, hint: &DecoderHint) -> bool {
        hint.format == media_types::JSON
    }

    fn decode(&self, payload: &Payload<'_>) -> Result<Option<Request>, Fault> {
        match payload {
            Payload::Json(value) => self.decode_value(value).map(Some),
            _ => Ok(None),
        }
    }
}

/// Encoder writing responses as JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonEncoder;

impl JsonEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Encoder for JsonEncoder {
    fn name(&self) -> &'static str {
        "JsonEncoder"
    }

    fn keys(&self) -> Vec<FormatKey> {
        Operation::ALL
            .iter()
            .map(|op| FormatKey::response(media_types::JSON, *op))
            .collect()
    }

    fn media_type(&self, _format: &str) -> String {
        media_types::JSON.to_string()
    }

    fn encode(&self, response: &Response, _format: &str) -> Result<Option<Bytes>, Fault> {
        let body = serde_json::to_vec(response)?;
        Ok(Some(Bytes::from(body)))
    }
}

/// Read back a response written by [`JsonEncoder`].
pub fn decode_response(bytes: &[u8]) -> Result<Response, Fault> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sos_common::ExceptionCode;

    #[test]
    fn test_decode_describe_sensor() {
        let request = JsonDecoder::new()
            .decode_value(&json!({
                "service": "SOS",
                "version": "2.0.0",
                "request": "DescribeSensor",
                "procedure": "p1",
                "procedureDescriptionFormat": "http://www.opengis.net/sensorml/2.0"
            }))
            .unwrap();
        assert_eq!(request.operation(), Operation::DescribeSensor);
        assert_eq!(
            request.response_format(),
            Some("http://www.opengis.net/sensorml/2.0")
        );
    }

    #[test]
    fn test_decode_batch() {
        let request = JsonDecoder::new()
            .decode_value(&json!({
                "service": "SOS",
                "version": "2.0.0",
                "request": "Batch",
                "stopAtFailure": true,
                "requests": [
                    {"request": "DeleteSensor", "procedure": "p1"},
                    {"request": "GetCapabilities"}
                ]
            }))
            .unwrap();

        match request.body {
            RequestBody::Batch(batch) => {
                assert!(batch.stop_at_failure);
                assert_eq!(batch.requests.len(), 2);
                assert_eq!(batch.requests[0].service, None);
                assert_eq!(batch.requests[1].operation(), Operation::GetCapabilities);
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_missing_member_is_invalid_parameter() {
        let fault = JsonDecoder::new()
            .decode_value(&json!({"request": "DeleteSensor"}))
            .unwrap_err();
        assert_eq!(fault.first().code, ExceptionCode::InvalidParameterValue);
        assert_eq!(fault.first().locator.as_deref(), Some("DeleteSensor"));
    }

    #[test]
    fn test_options_is_rest_only() {
        let fault = JsonDecoder::new()
            .decode_value(&json!({"service": "SOS", "request": "Options"}))
            .unwrap_err();
        assert_eq!(fault.first().code, ExceptionCode::InvalidParameterValue);
        assert_eq!(fault.first().locator.as_deref(), Some("request"));
    }

    #[test]
    fn test_missing_request_member() {
        let fault = JsonDecoder::new()
            .decode_value(&json!({"service": "SOS"}))
            .unwrap_err();
        assert_eq!(fault.first().code, ExceptionCode::MissingParameterValue);
    }

    #[test]
    fn test_extensions_object() {
        let request = JsonDecoder::new()
            .decode_value(&json!({
                "request": "GetCapabilities",
                "extensions": {"language": "de", "crs": 4326}
            }))
            .unwrap();
        assert_eq!(request.extensions.get("language"), Some("de"));
        assert_eq!(request.extensions.get("crs"), Some("4326"));
    }
}
