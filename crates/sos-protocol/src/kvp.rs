//! KVP (key-value pair) request decoding.
//!
//! Only read operations are available over KVP. Parameters that an
//! operation does not define are kept as request extensions.

use sos_common::{media_types, CodedException, Fault, FormatKey, Operation};

use crate::codec::{Decoder, DecoderHint, KvpParams, Payload};
use crate::observation::TemporalFilter;
use crate::requests::{
    DescribeSensorRequest, GetCapabilitiesRequest, GetFeatureOfInterestRequest,
    GetObservationByIdRequest, GetObservationRequest, GetResultRequest, Request, RequestBody,
};

/// Operations with a KVP encoding.
const KVP_OPERATIONS: [Operation; 6] = [
    Operation::GetCapabilities,
    Operation::DescribeSensor,
    Operation::GetObservation,
    Operation::GetObservationById,
    Operation::GetResult,
    Operation::GetFeatureOfInterest,
];

const COMMON_PARAMS: [&str; 3] = ["service", "version", "request"];

fn known_params(operation: Operation) -> &'static [&'static str] {
    match operation {
        Operation::GetCapabilities => &["acceptVersions", "sections", "acceptFormats", "updateSequence"],
        Operation::DescribeSensor => &["procedure", "procedureDescriptionFormat", "validTime"],
        Operation::GetObservation => &[
            "offering",
            "procedure",
            "observedProperty",
            "featureOfInterest",
            "temporalFilter",
            "responseFormat",
        ],
        Operation::GetObservationById => &["observation", "responseFormat"],
        Operation::GetResult => &["offering", "observedProperty", "featureOfInterest", "temporalFilter"],
        Operation::GetFeatureOfInterest => &["featureOfInterest", "procedure", "observedProperty"],
        _ => &[],
    }
}

/// Decoder for `GET` requests with query parameters.
#[derive(Debug, Default, Clone, Copy)]
pub struct KvpDecoder;

impl KvpDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode a parameter set into a request.
    pub fn decode_params(&self, params: &KvpParams) -> Result<Request, Fault> {
        let name = params
            .get("request")
            .ok_or_else(|| CodedException::missing_parameter("request"))?;

        let operation: Operation = name.parse().map_err(|_| {
            CodedException::invalid_parameter(
                "request",
                format!("The requested operation '{}' is not known", name),
            )
        })?;

        let body = match operation {
            Operation::GetCapabilities => RequestBody::GetCapabilities(GetCapabilitiesRequest {
                accept_versions: params.get_list("acceptVersions"),
                sections: params.get_list("sections"),
                accept_formats: params.get_list("acceptFormats"),
                update_sequence: params.get("updateSequence").map(str::to_string),
            }),
            Operation::DescribeSensor => RequestBody::DescribeSensor(DescribeSensorRequest {
                procedure: required(params, "procedure")?,
                procedure_description_format: params
                    .get("procedureDescriptionFormat")
                    .map(str::to_string),
                valid_time: temporal_filter(params, "validTime")?,
            }),
            Operation::GetObservation => RequestBody::GetObservation(GetObservationRequest {
                offerings: params.get_list("offering"),
                procedures: params.get_list("procedure"),
                observed_properties: params.get_list("observedProperty"),
                features_of_interest: params.get_list("featureOfInterest"),
                temporal_filter: temporal_filter(params, "temporalFilter")?,
                response_format: params.get("responseFormat").map(str::to_string),
            }),
            Operation::GetObservationById => {
                let observation_ids = params.get_list("observation");
                if observation_ids.is_empty() {
                    return Err(CodedException::missing_parameter("observation").into());
                }
                RequestBody::GetObservationById(GetObservationByIdRequest {
                    observation_ids,
                    response_format: params.get("responseFormat").map(str::to_string),
                })
            }
            Operation::GetResult => RequestBody::GetResult(GetResultRequest {
                offering: required(params, "offering")?,
                observed_property: required(params, "observedProperty")?,
                features_of_interest: params.get_list("featureOfInterest"),
                temporal_filter: temporal_filter(params, "temporalFilter")?,
            }),
            Operation::GetFeatureOfInterest => {
                RequestBody::GetFeatureOfInterest(GetFeatureOfInterestRequest {
                    feature_ids: params.get_list("featureOfInterest"),
                    procedures: params.get_list("procedure"),
                    observed_properties: params.get_list("observedProperty"),
                })
            }
            other => {
                return Err(CodedException::invalid_parameter(
                    "request",
                    format!("The operation '{}' is not available via KVP", other),
                )
                .into());
            }
        };

        let mut request = Request::new(body);
        request.service = params.get("service").map(str::to_string);
        request.version = params.get("version").map(str::to_string);

        let known = known_params(operation);
        for (key, value) in params.iter() {
            let is_known = COMMON_PARAMS
                .iter()
                .chain(known.iter())
                .any(|k| k.eq_ignore_ascii_case(key));
            if !is_known {
                request.extensions.insert(key, value);
            }
        }

        Ok(request)
    }
}

fn required(params: &KvpParams, name: &str) -> Result<String, Fault> {
    params
        .get(name)
        .map(str::to_string)
        .ok_or_else(|| CodedException::missing_parameter(name).into())
}

pub(crate) fn temporal_filter(params: &KvpParams, name: &str) -> Result<Option<TemporalFilter>, Fault> {
    match params.get(name) {
        Some(value) => value
            .parse::<TemporalFilter>()
            .map(Some)
            .map_err(|e| CodedException::invalid_parameter(name, format!("{}", e)).into()),
        None => Ok(None),
    }
}

impl Decoder for KvpDecoder {
    fn name(&self) -> &'static str {
        "KvpDecoder"
    }

    fn keys(&self) -> Vec<FormatKey> {
        KVP_OPERATIONS
            .iter()
            .map(|op| FormatKey::request(media_types::KVP, *op))
            .collect()
    }

    // Unknown and non-KVP operations are reported by decode_params
    fn accepts(&self, hint: &DecoderHint) -> bool {
        hint.format == media_types::KVP
    }

    fn decode(&self, payload: &Payload<'_>) -> Result<Option<Request>, Fault> {
        match payload {
            Payload::Kvp(params) => self.decode_params(params).map(Some),
            _ => Ok(None),
        }
    }
}
