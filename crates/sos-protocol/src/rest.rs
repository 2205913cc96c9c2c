//! REST binding: resource paths and HTTP methods mapped onto operations.
//!
//! Resource URLs have the form `/<urlPattern>/<resourceType>[/<id>]` plus
//! optional query parameters. Segment names and link relations come from
//! configuration.

use serde::{Deserialize, Serialize};
use sos_common::{
    media_types, CodedException, Fault, FaultHint, FaultPhrases, FormatKey, Operation,
};

use crate::codec::{Decoder, DecoderHint, KvpParams, Payload};
use crate::kvp::temporal_filter;
use crate::observation::Observation;
use crate::pox::procedure_identifier;
use crate::requests::{
    DeleteSensorRequest, DescribeSensorRequest, GetCapabilitiesRequest,
    GetFeatureOfInterestRequest, GetObservationByIdRequest, GetObservationRequest,
    InsertObservationRequest, InsertSensorRequest, OptionsRequest, Request, RequestBody,
    UpdateSensorDescriptionRequest,
};
use crate::responses::{Response, ResponseBody};
use crate::xml::XmlElement;

/// Hypermedia link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    pub rel: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

impl Link {
    pub fn new(href: impl Into<String>, rel: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            rel: rel.into(),
            media_type: None,
        }
    }

    pub fn with_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }
}

fn default_url_pattern() -> String {
    "/rest".to_string()
}

fn default_service() -> String {
    sos_common::SOS.to_string()
}

fn default_version() -> String {
    sos_common::versions::V2_0_0.to_string()
}

fn default_format() -> String {
    media_types::JSON.to_string()
}

/// Path segment names of the REST resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceNames {
    pub capabilities: String,
    pub sensors: String,
    pub observations: String,
    pub features: String,
    pub offerings: String,
}

impl Default for ResourceNames {
    fn default() -> Self {
        Self {
            capabilities: "capabilities".to_string(),
            sensors: "sensors".to_string(),
            observations: "observations".to_string(),
            features: "features".to_string(),
            offerings: "offerings".to_string(),
        }
    }
}

/// Relation names used in hypermedia links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkRelations {
    #[serde(rename = "self")]
    pub self_: String,
    pub sensor: String,
    pub observations: String,
    pub features: String,
}

impl Default for LinkRelations {
    fn default() -> Self {
        Self {
            self_: "self".to_string(),
            sensor: "sensor".to_string(),
            observations: "observations".to_string(),
            features: "features".to_string(),
        }
    }
}

/// REST resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestResource {
    Capabilities,
    Sensors,
    Observations,
    Features,
    Offerings,
}

impl RestResource {
    pub const ALL: [RestResource; 5] = [
        RestResource::Capabilities,
        RestResource::Sensors,
        RestResource::Observations,
        RestResource::Features,
        RestResource::Offerings,
    ];

    /// HTTP methods mapped to an operation, excluding `OPTIONS`.
    pub fn allowed_methods(&self) -> &'static [&'static str] {
        match self {
            RestResource::Sensors => &["GET", "POST", "PUT", "DELETE"],
            RestResource::Observations => &["GET", "POST"],
            RestResource::Capabilities | RestResource::Features | RestResource::Offerings => &["GET"],
        }
    }
}

/// REST binding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestVocabulary {
    #[serde(default = "default_url_pattern")]
    pub url_pattern: String,

    #[serde(default)]
    pub resources: ResourceNames,

    #[serde(default)]
    pub relations: LinkRelations,

    /// Service and version stamped on decoded requests.
    #[serde(default = "default_service")]
    pub service: String,

    #[serde(default = "default_version")]
    pub version: String,

    /// Response format when the client sends no Accept header.
    #[serde(default = "default_format")]
    pub default_format: String,
}

impl Default for RestVocabulary {
    fn default() -> Self {
        Self {
            url_pattern: default_url_pattern(),
            resources: ResourceNames::default(),
            relations: LinkRelations::default(),
            service: default_service(),
            version: default_version(),
            default_format: default_format(),
        }
    }
}

impl RestVocabulary {
    /// Resolve a path segment to a resource kind.
    pub fn resource(&self, segment: &str) -> Option<RestResource> {
        RestResource::ALL
            .iter()
            .copied()
            .find(|r| self.segment(*r) == segment)
    }

    pub fn segment(&self, resource: RestResource) -> &str {
        match resource {
            RestResource::Capabilities => &self.resources.capabilities,
            RestResource::Sensors => &self.resources.sensors,
            RestResource::Observations => &self.resources.observations,
            RestResource::Features => &self.resources.features,
            RestResource::Offerings => &self.resources.offerings,
        }
    }

    /// Allowed methods per resource segment, for `OPTIONS` on the endpoint.
    pub fn resource_methods(&self) -> Vec<(String, Vec<&'static str>)> {
        RestResource::ALL
            .iter()
            .map(|r| (self.segment(*r).to_string(), r.allowed_methods().to_vec()))
            .collect()
    }

    fn resource_url(&self, base_url: &str, resource: RestResource) -> String {
        format!(
            "{}{}/{}",
            base_url.trim_end_matches('/'),
            self.url_pattern,
            self.segment(resource)
        )
    }

    /// Hypermedia links for a response to `call`.
    pub fn links_for(&self, base_url: &str, call: &RestCall, response: &Response) -> Vec<Link> {
        let base = base_url.trim_end_matches('/');
        let mut self_href = format!("{}{}", base, self.url_pattern);
        if !call.resource_type.is_empty() {
            self_href.push('/');
            self_href.push_str(&call.resource_type);
        }
        if let Some(id) = &call.id {
            self_href.push('/');
            self_href.push_str(id);
        }

        let mut links = vec![Link::new(self_href, &self.relations.self_).with_type(media_types::JSON)];
        let sensors = self.resource_url(base_url, RestResource::Sensors);
        let observations = self.resource_url(base_url, RestResource::Observations);
        let features = self.resource_url(base_url, RestResource::Features);

        let mut push = |href: String, rel: &str| {
            if !links.iter().any(|l| l.href == href && l.rel == rel) {
                links.push(Link::new(href, rel).with_type(media_types::JSON));
            }
        };

        match &response.body {
            ResponseBody::DescribeSensor(r) => {
                push(
                    format!("{}?procedure={}", observations, r.procedure),
                    &self.relations.observations,
                );
            }
            ResponseBody::GetObservation(r) | ResponseBody::GetObservationById(r) => {
                for obs in &r.observations {
                    push(format!("{}/{}", sensors, obs.procedure), &self.relations.sensor);
                    push(
                        format!("{}/{}", features, obs.feature_of_interest),
                        &self.relations.features,
                    );
                }
            }
            ResponseBody::InsertSensor(r) => {
                push(format!("{}/{}", sensors, r.assigned_procedure), &self.relations.sensor);
            }
            ResponseBody::InsertObservation(r) => {
                for id in &r.observation_ids {
                    push(format!("{}/{}", observations, id), &self.relations.observations);
                }
            }
            ResponseBody::GetFeatureOfInterest(r) => {
                for feature in &r.features {
                    push(
                        format!("{}?featureOfInterest={}", observations, feature.identifier),
                        &self.relations.observations,
                    );
                }
            }
            ResponseBody::GetCapabilities(r) => {
                for offering in r.contents.iter().flatten() {
                    push(format!("{}/{}", sensors, offering.procedure), &self.relations.sensor);
                }
            }
            _ => {}
        }
        links
    }
}

/// A request addressed to a REST resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestCall {
    pub method: String,
    /// First path segment after the URL pattern; empty for the bare endpoint.
    pub resource_type: String,
    /// Remaining path, if any.
    pub id: Option<String>,
    pub params: KvpParams,
    pub body: Option<String>,
    pub content_type: Option<String>,
}

impl RestCall {
    /// Build a call from the path below the URL pattern.
    pub fn new(method: impl Into<String>, sub_path: &str, params: KvpParams) -> Self {
        let trimmed = sub_path.trim_matches('/');
        let (resource_type, id) = match trimmed.split_once('/') {
            Some((resource, id)) if !id.is_empty() => (resource.to_string(), Some(id.to_string())),
            Some((resource, _)) => (resource.to_string(), None),
            None => (trimmed.to_string(), None),
        };
        Self {
            method: method.into().to_ascii_uppercase(),
            resource_type,
            id,
            params,
            body: None,
            content_type: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>, content_type: Option<String>) -> Self {
        let body = body.into();
        if !body.trim().is_empty() {
            self.body = Some(body);
        }
        self.content_type = content_type;
        self
    }

    pub fn is_bare_endpoint(&self) -> bool {
        self.resource_type.is_empty()
    }
}

/// Decoder for the REST binding.
#[derive(Debug, Clone, Default)]
pub struct RestDecoder {
    vocabulary: RestVocabulary,
    phrases: FaultPhrases,
}

const REST_OPERATIONS: [Operation; 10] = [
    Operation::GetCapabilities,
    Operation::DescribeSensor,
    Operation::GetObservation,
    Operation::GetObservationById,
    Operation::InsertObservation,
    Operation::InsertSensor,
    Operation::UpdateSensorDescription,
    Operation::DeleteSensor,
    Operation::GetFeatureOfInterest,
    Operation::Options,
];

impl RestDecoder {
    pub fn new(vocabulary: RestVocabulary, phrases: FaultPhrases) -> Self {
        Self {
            vocabulary,
            phrases,
        }
    }

    pub fn vocabulary(&self) -> &RestVocabulary {
        &self.vocabulary
    }

    fn method_not_allowed(&self, call: &RestCall) -> Fault {
        CodedException::no_applicable_code(
            self.phrases
                .method_not_allowed(&call.method, &call.resource_type),
        )
        .with_hint(FaultHint::MethodNotAllowed)
        .into()
    }

    /// Map a REST call onto a typed request.
    pub fn decode_call(&self, call: &RestCall) -> Result<Request, Fault> {
        let resource = if call.is_bare_endpoint() {
            RestResource::Capabilities
        } else {
            self.vocabulary.resource(&call.resource_type).ok_or_else(|| {
                Fault::from(
                    CodedException::invalid_parameter(
                        "resourceType",
                        format!("The resource type '{}' is not supported", call.resource_type),
                    )
                    .with_hint(FaultHint::ResourceNotFound),
                )
            })?
        };

        let params = &call.params;
        let id = call.id.clone();

        let body: RequestBody = match (resource, call.method.as_str()) {
            (RestResource::Capabilities, "GET") => GetCapabilitiesRequest {
                sections: params.get_list("sections"),
                ..Default::default()
            }
            .into(),
            (RestResource::Offerings, "GET") => GetCapabilitiesRequest {
                sections: vec!["Contents".to_string()],
                ..Default::default()
            }
            .into(),
            (RestResource::Sensors, "GET") if id.is_none() => GetCapabilitiesRequest {
                sections: vec!["Contents".to_string()],
                ..Default::default()
            }
            .into(),
            (RestResource::Sensors, "GET") => DescribeSensorRequest {
                procedure: id.unwrap_or_default(),
                procedure_description_format: params
                    .get("procedureDescriptionFormat")
                    .map(str::to_string),
                valid_time: None,
            }
            .into(),
            (RestResource::Sensors, "POST") => {
                let description = call
                    .body
                    .clone()
                    .ok_or_else(|| CodedException::missing_parameter("procedureDescription"))?;
                let procedure = match params.get("procedure") {
                    Some(p) => Some(p.to_string()),
                    None => XmlElement::parse(&description)
                        .ok()
                        .and_then(|doc| procedure_identifier(&doc)),
                };
                InsertSensorRequest {
                    procedure_description_format: params
                        .get("procedureDescriptionFormat")
                        .unwrap_or(media_types::SENSORML_2_0)
                        .to_string(),
                    procedure_description: description,
                    observable_properties: params.get_list("observableProperty"),
                    procedure,
                }
                .into()
            }
            (RestResource::Sensors, "PUT") => {
                let procedure = id.ok_or_else(|| CodedException::missing_parameter("procedure"))?;
                let description = call
                    .body
                    .clone()
                    .ok_or_else(|| CodedException::missing_parameter("description"))?;
                UpdateSensorDescriptionRequest {
                    procedure,
                    procedure_description_format: params
                        .get("procedureDescriptionFormat")
                        .unwrap_or(media_types::SENSORML_2_0)
                        .to_string(),
                    description,
                }
                .into()
            }
            (RestResource::Sensors, "DELETE") => DeleteSensorRequest {
                procedure: id.ok_or_else(|| CodedException::missing_parameter("procedure"))?,
            }
            .into(),
            (RestResource::Observations, "GET") => match id {
                Some(id) => GetObservationByIdRequest {
                    observation_ids: vec![id],
                    response_format: None,
                }
                .into(),
                None => GetObservationRequest {
                    offerings: params.get_list("offering"),
                    procedures: params.get_list("procedure"),
                    observed_properties: params.get_list("observedProperty"),
                    features_of_interest: params.get_list("featureOfInterest"),
                    temporal_filter: temporal_filter(params, "temporalFilter")?,
                    response_format: None,
                }
                .into(),
            },
            (RestResource::Observations, "POST") => {
                let body = call
                    .body
                    .as_deref()
                    .ok_or_else(|| CodedException::missing_parameter("observation"))?;
                insert_observation_from_json(body)?.into()
            }
            (RestResource::Features, "GET") => GetFeatureOfInterestRequest {
                feature_ids: match id {
                    Some(id) => vec![id],
                    None => params.get_list("featureOfInterest"),
                },
                procedures: params.get_list("procedure"),
                observed_properties: params.get_list("observedProperty"),
            }
            .into(),
            (resource, "OPTIONS") => OptionsRequest {
                resource: call.resource_type.clone(),
                id,
                methods: resource.allowed_methods().iter().map(|m| m.to_string()).collect(),
            }
            .into(),
            _ => return Err(self.method_not_allowed(call)),
        };

        Ok(Request::new(body)
            .with_service(&self.vocabulary.service)
            .with_version(&self.vocabulary.version))
    }
}

/// Observations are posted as a single object, an array, or a full
/// InsertObservation document.
fn insert_observation_from_json(body: &str) -> Result<InsertObservationRequest, Fault> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    let request = if value.is_array() {
        InsertObservationRequest {
            offerings: Vec::new(),
            observations: serde_json::from_value::<Vec<Observation>>(value)?,
        }
    } else if value.get("observations").is_some() {
        serde_json::from_value::<InsertObservationRequest>(value)?
    } else {
        InsertObservationRequest {
            offerings: Vec::new(),
            observations: vec![serde_json::from_value::<Observation>(value)?],
        }
    };
    Ok(request)
}

impl Decoder for RestDecoder {
    fn name(&self) -> &'static str {
        "RestDecoder"
    }

    fn keys(&self) -> Vec<FormatKey> {
        REST_OPERATIONS
            .iter()
            .map(|op| FormatKey::request(media_types::REST, *op))
            .collect()
    }

    fn accepts(&self, hint: &DecoderHint) -> bool {
        hint.format == media_types::REST
    }

    fn decode(&self, payload: &Payload<'_>) -> Result<Option<Request>, Fault> {
        match payload {
            Payload::Rest(call) => self.decode_call(call).map(Some),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sos_common::ExceptionCode;

    fn call(method: &str, path: &str) -> RestCall {
        RestCall::new(method, path, KvpParams::default())
    }

    fn decoder() -> RestDecoder {
        RestDecoder::new(RestVocabulary::default(), FaultPhrases::default())
    }

    #[test]
    fn test_path_split() {
        let c = call("get", "/sensors/urn:sensor:1");
        assert_eq!(c.method, "GET");
        assert_eq!(c.resource_type, "sensors");
        assert_eq!(c.id.as_deref(), Some("urn:sensor:1"));

        let bare = call("GET", "");
        assert!(bare.is_bare_endpoint());
    }

    #[test]
    fn test_sensor_methods() {
        let d = decoder();
        assert_eq!(
            d.decode_call(&call("GET", "sensors/p1")).unwrap().operation(),
            Operation::DescribeSensor
        );
        assert_eq!(
            d.decode_call(&call("DELETE", "sensors/p1")).unwrap().operation(),
            Operation::DeleteSensor
        );
        assert_eq!(
            d.decode_call(&call("GET", "sensors")).unwrap().operation(),
            Operation::GetCapabilities
        );
    }

    #[test]
    fn test_request_stamped_with_service_and_version() {
        let request = decoder().decode_call(&call("GET", "observations/o_1")).unwrap();
        assert_eq!(request.service.as_deref(), Some("SOS"));
        assert_eq!(request.version.as_deref(), Some("2.0.0"));
        assert_eq!(request.operation(), Operation::GetObservationById);
    }

    #[test]
    fn test_unknown_resource_is_not_found() {
        let fault = decoder().decode_call(&call("GET", "widgets")).unwrap_err();
        assert_eq!(fault.first().code, ExceptionCode::InvalidParameterValue);
        assert_eq!(fault.first().hint, Some(FaultHint::ResourceNotFound));
    }

    #[test]
    fn test_options_maps_to_operation() {
        let request = decoder().decode_call(&call("OPTIONS", "observations/o_1")).unwrap();
        assert_eq!(request.operation(), Operation::Options);
        assert_eq!(request.version.as_deref(), Some("2.0.0"));
        match request.body {
            RequestBody::Options(r) => {
                assert_eq!(r.resource, "observations");
                assert_eq!(r.id.as_deref(), Some("o_1"));
                assert_eq!(r.methods, vec!["GET", "POST"]);
            }
            other => panic!("unexpected body {:?}", other),
        }

        let fault = decoder().decode_call(&call("OPTIONS", "widgets")).unwrap_err();
        assert_eq!(fault.first().hint, Some(FaultHint::ResourceNotFound));
    }

    #[test]
    fn test_unmapped_method_is_not_allowed() {
        let fault = decoder().decode_call(&call("PATCH", "sensors/p1")).unwrap_err();
        let first = fault.first();
        assert_eq!(first.code, ExceptionCode::NoApplicableCode);
        assert_eq!(first.hint, Some(FaultHint::MethodNotAllowed));
        assert_eq!(
            first.text(),
            "HTTP method 'PATCH' is not allowed for the resource type 'sensors'"
        );
    }

    #[test]
    fn test_post_observation_object() {
        let body = r#"{
            "procedure": "p1",
            "observedProperty": "temp",
            "featureOfInterest": "f1",
            "phenomenonTime": "2024-01-01T00:00:00Z",
            "result": {"value": 1.5, "uom": "Cel"}
        }"#;
        let c = call("POST", "observations").with_body(body, Some("application/json".into()));
        let request = decoder().decode_call(&c).unwrap();
        match request.body {
            RequestBody::InsertObservation(r) => assert_eq!(r.observations.len(), 1),
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_custom_segment_names() {
        let vocabulary = RestVocabulary {
            resources: ResourceNames {
                sensors: "procedures".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let d = RestDecoder::new(vocabulary, FaultPhrases::default());
        assert!(d.decode_call(&call("GET", "procedures/p1")).is_ok());
        assert!(d.decode_call(&call("GET", "sensors/p1")).is_err());
    }

    #[test]
    fn test_links_for_describe_sensor() {
        let vocabulary = RestVocabulary::default();
        let response = Response::new(
            "SOS",
            "2.0.0",
            crate::responses::DescribeSensorResponse {
                procedure: "p1".to_string(),
                procedure_description_format: media_types::SENSORML_2_0.to_string(),
                description: "<x/>".to_string(),
            },
        );
        let links = vocabulary.links_for("http://localhost:8080/", &call("GET", "sensors/p1"), &response);
        assert_eq!(links[0].href, "http://localhost:8080/rest/sensors/p1");
        assert_eq!(links[0].rel, "self");
        assert_eq!(links[1].href, "http://localhost:8080/rest/observations?procedure=p1");
        assert_eq!(links[1].rel, "observations");
    }
}
