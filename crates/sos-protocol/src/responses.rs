//! Typed SOS operation responses.
//!
//! Responses mirror [`Request`](crate::Request): a common header plus one
//! body per operation. They carry no transport concern and serialize to
//! JSON with serde, which is also the JSON binding's wire form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sos_common::{Fault, Operation};

use crate::observation::{Feature, Observation};
use crate::requests::Extensions;
use crate::rest::Link;

/// A response produced by an operation handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub service: String,
    pub version: String,

    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,

    /// Hypermedia links, filled in by the REST binding.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,

    pub body: ResponseBody,
}

impl Response {
    pub fn new(service: impl Into<String>, version: impl Into<String>, body: impl Into<ResponseBody>) -> Self {
        Self {
            service: service.into(),
            version: version.into(),
            extensions: Extensions::new(),
            links: Vec::new(),
            body: body.into(),
        }
    }

    pub fn operation(&self) -> Operation {
        self.body.operation()
    }

    /// Name of the response type, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.body.type_name()
    }
}

/// Operation-specific response content, tagged with the operation name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "request")]
pub enum ResponseBody {
    GetCapabilities(CapabilitiesResponse),
    DescribeSensor(DescribeSensorResponse),
    GetObservation(ObservationsResponse),
    GetObservationById(ObservationsResponse),
    InsertObservation(InsertObservationResponse),
    InsertSensor(InsertSensorResponse),
    UpdateSensorDescription(UpdateSensorDescriptionResponse),
    DeleteSensor(DeleteSensorResponse),
    GetResult(GetResultResponse),
    GetFeatureOfInterest(FeatureCollection),
    Batch(BatchResponse),
    Options(OptionsResponse),
}

impl ResponseBody {
    pub fn operation(&self) -> Operation {
        match self {
            ResponseBody::GetCapabilities(_) => Operation::GetCapabilities,
            ResponseBody::DescribeSensor(_) => Operation::DescribeSensor,
            ResponseBody::GetObservation(_) => Operation::GetObservation,
            ResponseBody::GetObservationById(_) => Operation::GetObservationById,
            ResponseBody::InsertObservation(_) => Operation::InsertObservation,
            ResponseBody::InsertSensor(_) => Operation::InsertSensor,
            ResponseBody::UpdateSensorDescription(_) => Operation::UpdateSensorDescription,
            ResponseBody::DeleteSensor(_) => Operation::DeleteSensor,
            ResponseBody::GetResult(_) => Operation::GetResult,
            ResponseBody::GetFeatureOfInterest(_) => Operation::GetFeatureOfInterest,
            ResponseBody::Batch(_) => Operation::Batch,
            ResponseBody::Options(_) => Operation::Options,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ResponseBody::GetCapabilities(_) => "CapabilitiesResponse",
            ResponseBody::DescribeSensor(_) => "DescribeSensorResponse",
            ResponseBody::GetObservation(_) => "GetObservationResponse",
            ResponseBody::GetObservationById(_) => "GetObservationByIdResponse",
            ResponseBody::InsertObservation(_) => "InsertObservationResponse",
            ResponseBody::InsertSensor(_) => "InsertSensorResponse",
            ResponseBody::UpdateSensorDescription(_) => "UpdateSensorDescriptionResponse",
            ResponseBody::DeleteSensor(_) => "DeleteSensorResponse",
            ResponseBody::GetResult(_) => "GetResultResponse",
            ResponseBody::GetFeatureOfInterest(_) => "GetFeatureOfInterestResponse",
            ResponseBody::Batch(_) => "BatchResponse",
            ResponseBody::Options(_) => "OptionsResponse",
        }
    }
}

/// Capabilities document; each section is present only when requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitiesResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_sequence: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_identification: Option<ServiceIdentification>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operations_metadata: Option<Vec<OperationMetadata>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<Vec<Offering>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceIdentification {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    pub service_type: String,
    pub service_type_versions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationMetadata {
    pub name: String,
    /// Endpoint for GET and POST requests.
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offering {
    pub identifier: String,
    pub procedure: String,
    #[serde(default)]
    pub observable_properties: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phenomenon_time: Option<TimePeriod>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePeriod {
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeSensorResponse {
    pub procedure: String,
    pub procedure_description_format: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationsResponse {
    pub observations: Vec<Observation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertObservationResponse {
    pub observation_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertSensorResponse {
    pub assigned_procedure: String,
    pub assigned_offering: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSensorDescriptionResponse {
    pub updated_procedure: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSensorResponse {
    pub deleted_procedure: String,
}

/// Result values as a text block: one `time,value` record per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetResultResponse {
    pub result_values: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

/// Methods a REST resource answers to, `OPTIONS` included.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionsResponse {
    pub resource: String,
    pub methods: Vec<String>,
}

impl OptionsResponse {
    /// Value of the `Allow` header.
    pub fn allow(&self) -> String {
        self.methods.join(", ")
    }
}

/// Outcome of every executed batch member, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    #[serde(with = "batch_results")]
    pub results: Vec<Result<Response, Fault>>,
}

impl BatchResponse {
    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| r.is_err()).count()
    }
}

mod batch_results {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use sos_common::Fault;

    use super::Response;

    #[derive(Serialize)]
    #[serde(untagged)]
    enum EntryRef<'a> {
        Response(&'a Response),
        Fault(&'a Fault),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Entry {
        Response(Response),
        Fault(Fault),
    }

    pub fn serialize<S>(results: &[Result<Response, Fault>], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let entries: Vec<EntryRef<'_>> = results
            .iter()
            .map(|r| match r {
                Ok(response) => EntryRef::Response(response),
                Err(fault) => EntryRef::Fault(fault),
            })
            .collect();
        entries.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Result<Response, Fault>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = Vec::<Entry>::deserialize(deserializer)?;
        Ok(entries
            .into_iter()
            .map(|e| match e {
                Entry::Response(response) => Ok(response),
                Entry::Fault(fault) => Err(fault),
            })
            .collect())
    }
}

macro_rules! impl_from_response {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ResponseBody {
                fn from(response: $ty) -> Self {
                    ResponseBody::$variant(response)
                }
            }
        )*
    };
}

impl_from_response! {
    GetCapabilities => CapabilitiesResponse,
    DescribeSensor => DescribeSensorResponse,
    InsertObservation => InsertObservationResponse,
    InsertSensor => InsertSensorResponse,
    UpdateSensorDescription => UpdateSensorDescriptionResponse,
    DeleteSensor => DeleteSensorResponse,
    GetResult => GetResultResponse,
    GetFeatureOfInterest => FeatureCollection,
    Batch => BatchResponse,
    Options => OptionsResponse,
}
