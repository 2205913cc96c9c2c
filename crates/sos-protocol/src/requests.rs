//! Typed SOS operation requests.
//!
//! A [`Request`] is the common header (service, version, extensions and
//! transport context) plus one [`RequestBody`] variant per operation.
//! Service and version stay optional here; they are validated when the
//! request is dispatched.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use sos_common::Operation;

use crate::observation::{Observation, TemporalFilter};

/// A named extension value attached to a request or response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    pub name: String,
    pub value: String,
}

/// Ordered set of extensions keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Extensions(Vec<Extension>);

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an extension. An existing entry with the same name keeps its
    /// position and takes the new value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|e| e.name == name) {
            Some(existing) => existing.value = value,
            None => self.0.push(Extension { name, value }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.value.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Extension> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Transport facts about the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub remote_addr: Option<IpAddr>,
    /// `X-Forwarded-For` chain, client first.
    pub forwarded_for: Vec<String>,
    /// Bearer token from the `Authorization` header.
    pub token: Option<String>,
}

/// A decoded operation request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub service: Option<String>,
    pub version: Option<String>,
    pub extensions: Extensions,
    pub context: RequestContext,
    pub body: RequestBody,
}

impl Request {
    pub fn new(body: impl Into<RequestBody>) -> Self {
        Self {
            service: None,
            version: None,
            extensions: Extensions::new(),
            context: RequestContext::default(),
            body: body.into(),
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_extension(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extensions.insert(name, value);
        self
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    pub fn operation(&self) -> Operation {
        self.body.operation()
    }

    /// Explicitly requested response format, if the operation has one.
    pub fn response_format(&self) -> Option<&str> {
        self.body.response_format()
    }
}

/// Operation-specific request content.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    GetCapabilities(GetCapabilitiesRequest),
    DescribeSensor(DescribeSensorRequest),
    GetObservation(GetObservationRequest),
    GetObservationById(GetObservationByIdRequest),
    InsertObservation(InsertObservationRequest),
    InsertSensor(InsertSensorRequest),
    UpdateSensorDescription(UpdateSensorDescriptionRequest),
    DeleteSensor(DeleteSensorRequest),
    GetResult(GetResultRequest),
    GetFeatureOfInterest(GetFeatureOfInterestRequest),
    Batch(BatchRequest),
    Options(OptionsRequest),
}

impl RequestBody {
    pub fn operation(&self) -> Operation {
        match self {
            RequestBody::GetCapabilities(_) => Operation::GetCapabilities,
            RequestBody::DescribeSensor(_) => Operation::DescribeSensor,
            RequestBody::GetObservation(_) => Operation::GetObservation,
            RequestBody::GetObservationById(_) => Operation::GetObservationById,
            RequestBody::InsertObservation(_) => Operation::InsertObservation,
            RequestBody::InsertSensor(_) => Operation::InsertSensor,
            RequestBody::UpdateSensorDescription(_) => Operation::UpdateSensorDescription,
            RequestBody::DeleteSensor(_) => Operation::DeleteSensor,
            RequestBody::GetResult(_) => Operation::GetResult,
            RequestBody::GetFeatureOfInterest(_) => Operation::GetFeatureOfInterest,
            RequestBody::Batch(_) => Operation::Batch,
            RequestBody::Options(_) => Operation::Options,
        }
    }

    pub fn response_format(&self) -> Option<&str> {
        match self {
            RequestBody::DescribeSensor(r) => r.procedure_description_format.as_deref(),
            RequestBody::GetObservation(r) => r.response_format.as_deref(),
            RequestBody::GetObservationById(r) => r.response_format.as_deref(),
            _ => None,
        }
    }
}

macro_rules! impl_from_request {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for RequestBody {
                fn from(request: $ty) -> Self {
                    RequestBody::$variant(request)
                }
            }
        )*
    };
}

impl_from_request! {
    GetCapabilities => GetCapabilitiesRequest,
    DescribeSensor => DescribeSensorRequest,
    GetObservation => GetObservationRequest,
    GetObservationById => GetObservationByIdRequest,
    InsertObservation => InsertObservationRequest,
    InsertSensor => InsertSensorRequest,
    UpdateSensorDescription => UpdateSensorDescriptionRequest,
    DeleteSensor => DeleteSensorRequest,
    GetResult => GetResultRequest,
    GetFeatureOfInterest => GetFeatureOfInterestRequest,
    Batch => BatchRequest,
    Options => OptionsRequest,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetCapabilitiesRequest {
    pub accept_versions: Vec<String>,
    pub sections: Vec<String>,
    pub accept_formats: Vec<String>,
    pub update_sequence: Option<String>,
}

impl GetCapabilitiesRequest {
    /// Whether a capabilities section should be included.
    ///
    /// An empty section list, or the `All` section, selects everything.
    pub fn wants_section(&self, section: &str) -> bool {
        self.sections.is_empty()
            || self
                .sections
                .iter()
                .any(|s| s.eq_ignore_ascii_case("All") || s.eq_ignore_ascii_case(section))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeSensorRequest {
    pub procedure: String,
    #[serde(default)]
    pub procedure_description_format: Option<String>,
    #[serde(default)]
    pub valid_time: Option<TemporalFilter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetObservationRequest {
    pub offerings: Vec<String>,
    pub procedures: Vec<String>,
    pub observed_properties: Vec<String>,
    pub features_of_interest: Vec<String>,
    pub temporal_filter: Option<TemporalFilter>,
    pub response_format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetObservationByIdRequest {
    pub observation_ids: Vec<String>,
    #[serde(default)]
    pub response_format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertObservationRequest {
    #[serde(default)]
    pub offerings: Vec<String>,
    pub observations: Vec<Observation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertSensorRequest {
    pub procedure_description_format: String,
    /// Procedure description document, kept verbatim.
    pub procedure_description: String,
    #[serde(default)]
    pub observable_properties: Vec<String>,
    /// Identifier found in the description, if any.
    #[serde(default)]
    pub procedure: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSensorDescriptionRequest {
    pub procedure: String,
    pub procedure_description_format: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSensorRequest {
    pub procedure: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetResultRequest {
    pub offering: String,
    pub observed_property: String,
    #[serde(default)]
    pub features_of_interest: Vec<String>,
    #[serde(default)]
    pub temporal_filter: Option<TemporalFilter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetFeatureOfInterestRequest {
    pub feature_ids: Vec<String>,
    pub procedures: Vec<String>,
    pub observed_properties: Vec<String>,
}

/// Several requests executed one after another.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchRequest {
    pub requests: Vec<Request>,
    /// Stop after the first member that fails.
    pub stop_at_failure: bool,
}

/// Method discovery on a REST resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsRequest {
    /// Resource path segment as requested.
    pub resource: String,
    #[serde(default)]
    pub id: Option<String>,
    /// Methods the resource maps to operations, without `OPTIONS`.
    #[serde(default)]
    pub methods: Vec<String>,
}
