//! POX (plain old XML) request decoding.
//!
//! One decoder handles the SOS 2.0 and SWES 2.0 request documents and the
//! SOS 1.0 core requests. It is registered under every (namespace, root
//! element) pair it understands. SOAP bodies go through the same decoder.

use sos_common::{namespaces, CodedException, Fault, FormatKey, Operation};

use crate::codec::{Decoder, Payload};
use crate::observation::{parse_time, Observation, ObservationValue, TemporalFilter};
use crate::requests::{
    DeleteSensorRequest, DescribeSensorRequest, GetCapabilitiesRequest,
    GetFeatureOfInterestRequest, GetObservationByIdRequest, GetObservationRequest,
    GetResultRequest, InsertObservationRequest, InsertSensorRequest, Request, RequestBody,
    UpdateSensorDescriptionRequest,
};
use crate::xml::XmlElement;

const SOS_2_0_OPERATIONS: [Operation; 10] = [
    Operation::GetCapabilities,
    Operation::DescribeSensor,
    Operation::GetObservation,
    Operation::GetObservationById,
    Operation::InsertObservation,
    Operation::InsertSensor,
    Operation::UpdateSensorDescription,
    Operation::DeleteSensor,
    Operation::GetResult,
    Operation::GetFeatureOfInterest,
];

const SWES_2_0_OPERATIONS: [Operation; 4] = [
    Operation::DescribeSensor,
    Operation::InsertSensor,
    Operation::UpdateSensorDescription,
    Operation::DeleteSensor,
];

const SOS_1_0_OPERATIONS: [Operation; 3] = [
    Operation::GetCapabilities,
    Operation::DescribeSensor,
    Operation::GetObservation,
];

/// Decoder for XML request documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct PoxDecoder;

impl PoxDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode a parsed request document.
    pub fn decode_document(&self, root: &XmlElement) -> Result<Request, Fault> {
        let operation: Operation = root.local_name.parse().map_err(|_| {
            CodedException::invalid_parameter(
                "request",
                format!("The request element '{}' is not supported", root.qname),
            )
        })?;

        let body = match operation {
            Operation::GetCapabilities => get_capabilities(root),
            Operation::DescribeSensor => describe_sensor(root)?,
            Operation::GetObservation => get_observation(root)?,
            Operation::GetObservationById => {
                let observation_ids = root.child_texts("observation");
                if observation_ids.is_empty() {
                    return Err(CodedException::missing_parameter("observation").into());
                }
                RequestBody::GetObservationById(GetObservationByIdRequest {
                    observation_ids,
                    response_format: root.child_text("responseFormat").map(str::to_string),
                })
            }
            Operation::InsertObservation => insert_observation(root)?,
            Operation::InsertSensor => insert_sensor(root)?,
            Operation::UpdateSensorDescription => update_sensor_description(root)?,
            Operation::DeleteSensor => RequestBody::DeleteSensor(DeleteSensorRequest {
                procedure: required_child(root, "procedure")?,
            }),
            Operation::GetResult => RequestBody::GetResult(GetResultRequest {
                offering: required_child(root, "offering")?,
                observed_property: required_child(root, "observedProperty")?,
                features_of_interest: root.child_texts("featureOfInterest"),
                temporal_filter: temporal_filter(root)?,
            }),
            Operation::GetFeatureOfInterest => {
                RequestBody::GetFeatureOfInterest(GetFeatureOfInterestRequest {
                    feature_ids: root.child_texts("featureOfInterest"),
                    procedures: root.child_texts("procedure"),
                    observed_properties: root.child_texts("observedProperty"),
                })
            }
            Operation::Batch => {
                return Err(CodedException::invalid_parameter(
                    "request",
                    "Batch requests are only supported by the JSON binding",
                )
                .into());
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
        request.service = root.attr("service").map(str::to_string);
        request.version = root.attr("version").map(str::to_string);

        for extension in root.children_named("extension") {
            let (name, value) = extension_entry(extension);
            request.extensions.insert(name, value);
        }
        Ok(request)
    }
}

fn required_child(root: &XmlElement, name: &str) -> Result<String, Fault> {
    root.child(name)
        .and_then(|c| c.text_or_href())
        .map(str::to_string)
        .ok_or_else(|| CodedException::missing_parameter(name).into())
}

/// Name and value of a `swes:extension`: the wrapped element's definition
/// or local name, and its value text.
fn extension_entry(extension: &XmlElement) -> (String, String) {
    match extension.first_child() {
        Some(inner) => {
            let name = inner
                .attr("definition")
                .or_else(|| inner.attr("name"))
                .unwrap_or(&inner.local_name)
                .to_string();
            let value = inner
                .descendant("value")
                .and_then(|v| v.text())
                .or_else(|| inner.text())
                .unwrap_or_default()
                .to_string();
            (name, value)
        }
        None => (
            extension.attr("name").unwrap_or("extension").to_string(),
            extension.text().unwrap_or_default().to_string(),
        ),
    }
}

/// Identifier declared inside a procedure description.
pub(crate) fn procedure_identifier(description: &XmlElement) -> Option<String> {
    let identifier = description.descendant("identifier")?;
    identifier
        .text()
        .or_else(|| identifier.descendant("value").and_then(|v| v.text()))
        .map(str::to_string)
}

fn get_capabilities(root: &XmlElement) -> RequestBody {
    let nested = |wrapper: &str, item: &str| -> Vec<String> {
        root.child(wrapper)
            .map(|w| w.child_texts(item))
            .unwrap_or_default()
    };

    RequestBody::GetCapabilities(GetCapabilitiesRequest {
        accept_versions: nested("AcceptVersions", "Version"),
        sections: nested("Sections", "Section"),
        accept_formats: nested("AcceptFormats", "OutputFormat"),
        update_sequence: root.attr("updateSequence").map(str::to_string),
    })
}

fn describe_sensor(root: &XmlElement) -> Result<RequestBody, Fault> {
    let format = root
        .child_text("procedureDescriptionFormat")
        .or_else(|| root.attr("outputFormat"))
        .map(str::to_string);

    Ok(RequestBody::DescribeSensor(DescribeSensorRequest {
        procedure: required_child(root, "procedure")?,
        procedure_description_format: format,
        valid_time: None,
    }))
}

fn get_observation(root: &XmlElement) -> Result<RequestBody, Fault> {
    Ok(RequestBody::GetObservation(GetObservationRequest {
        offerings: root.child_texts("offering"),
        procedures: root.child_texts("procedure"),
        observed_properties: root.child_texts("observedProperty"),
        features_of_interest: root.child_texts("featureOfInterest"),
        temporal_filter: temporal_filter(root)?,
        response_format: root.child_text("responseFormat").map(str::to_string),
    }))
}

fn invalid_filter(message: impl Into<String>) -> Fault {
    CodedException::invalid_parameter("temporalFilter", message).into()
}

/// `sos:temporalFilter` holding an `fes:During` or `fes:TEquals` operator.
fn temporal_filter(root: &XmlElement) -> Result<Option<TemporalFilter>, Fault> {
    let operator = match root.child("temporalFilter").and_then(|f| f.first_child()) {
        Some(op) => op,
        None => return Ok(None),
    };

    let value_reference = operator
        .child_text("ValueReference")
        .unwrap_or(crate::observation::PHENOMENON_TIME)
        .to_string();

    let time = |name: &str| -> Result<Option<chrono::DateTime<chrono::Utc>>, Fault> {
        match operator.descendant(name).and_then(|e| e.text()) {
            Some(text) => parse_time(text)
                .map(Some)
                .map_err(|e| invalid_filter(e.to_string())),
            None => Ok(None),
        }
    };

    let filter = match operator.local_name.as_str() {
        "During" | "TEquals" => {
            if let (Some(begin), Some(end)) = (time("beginPosition")?, time("endPosition")?) {
                TemporalFilter::period(begin, end).map_err(|e| invalid_filter(e.to_string()))?
            } else if let Some(instant) = time("timePosition")? {
                TemporalFilter::instant(instant)
            } else {
                return Err(invalid_filter("The temporal filter has no time value"));
            }
        }
        other => {
            return Err(invalid_filter(format!(
                "The temporal operator '{}' is not supported",
                other
            )));
        }
    };

    Ok(Some(filter.with_value_reference(value_reference)))
}

fn insert_observation(root: &XmlElement) -> Result<RequestBody, Fault> {
    let observations = root
        .children_named("observation")
        .map(|wrapper| {
            let element = wrapper.first_child().unwrap_or(wrapper);
            observation(element)
        })
        .collect::<Result<Vec<_>, Fault>>()?;

    if observations.is_empty() {
        return Err(CodedException::missing_parameter("observation").into());
    }

    Ok(RequestBody::InsertObservation(InsertObservationRequest {
        offerings: root.child_texts("offering"),
        observations,
    }))
}

/// Decode an `om:OM_Observation` element.
fn observation(element: &XmlElement) -> Result<Observation, Fault> {
    let phenomenon_time = element
        .child("phenomenonTime")
        .and_then(|t| {
            t.descendant("timePosition")
                .or_else(|| t.descendant("beginPosition"))
        })
        .and_then(|t| t.text())
        .ok_or_else(|| CodedException::missing_parameter("phenomenonTime"))?;
    let phenomenon_time = parse_time(phenomenon_time).map_err(|e| {
        CodedException::invalid_parameter("phenomenonTime", e.to_string())
    })?;

    let feature_of_interest = element
        .child("featureOfInterest")
        .and_then(|f| {
            f.text_or_href()
                .or_else(|| f.descendant("identifier").and_then(|i| i.text()))
        })
        .ok_or_else(|| CodedException::missing_parameter("featureOfInterest"))?
        .to_string();

    let result = element
        .child("result")
        .ok_or_else(|| CodedException::missing_parameter("result"))?;
    let text = result.text().unwrap_or_default();
    let result = match result.attr("uom") {
        Some(uom) => ObservationValue::Measure {
            value: text.parse::<f64>().map_err(|_| {
                CodedException::invalid_parameter("result", format!("'{}' is not a number", text))
            })?,
            uom: uom.to_string(),
        },
        None => ObservationValue::Text(text.to_string()),
    };

    Ok(Observation {
        identifier: element.child_text("identifier").map(str::to_string),
        procedure: required_child(element, "procedure")?,
        observed_property: required_child(element, "observedProperty")?,
        feature_of_interest,
        phenomenon_time,
        result,
    })
}

fn insert_sensor(root: &XmlElement) -> Result<RequestBody, Fault> {
    let description = root
        .child("procedureDescription")
        .ok_or_else(|| CodedException::missing_parameter("procedureDescription"))?;

    let (procedure_description, procedure) = match description.first_child() {
        Some(document) => (document.to_xml(), procedure_identifier(document)),
        None => (
            description
                .text()
                .ok_or_else(|| CodedException::missing_parameter("procedureDescription"))?
                .to_string(),
            None,
        ),
    };

    Ok(RequestBody::InsertSensor(InsertSensorRequest {
        procedure_description_format: required_child(root, "procedureDescriptionFormat")?,
        procedure_description,
        observable_properties: root.child_texts("observableProperty"),
        procedure,
    }))
}

fn update_sensor_description(root: &XmlElement) -> Result<RequestBody, Fault> {
    let description = root
        .child("description")
        .and_then(|d| match d.descendant("data").and_then(|data| data.first_child()) {
            Some(document) => Some(document.to_xml()),
            None => d.text().map(str::to_string),
        })
        .ok_or_else(|| CodedException::missing_parameter("description"))?;

    Ok(RequestBody::UpdateSensorDescription(UpdateSensorDescriptionRequest {
        procedure: required_child(root, "procedure")?,
        procedure_description_format: required_child(root, "procedureDescriptionFormat")?,
        description,
    }))
}

impl Decoder for PoxDecoder {
    fn name(&self) -> &'static str {
        "PoxDecoder"
    }

    fn keys(&self) -> Vec<FormatKey> {
        let sos2 = SOS_2_0_OPERATIONS
            .iter()
            .map(|op| FormatKey::request(namespaces::SOS_2_0, *op));
        let swes = SWES_2_0_OPERATIONS
            .iter()
            .map(|op| FormatKey::request(namespaces::SWES_2_0, *op));
        let sos1 = SOS_1_0_OPERATIONS
            .iter()
            .map(|op| FormatKey::request(namespaces::SOS_1_0, *op));
        sos2.chain(swes).chain(sos1).collect()
    }

    fn decode(&self, payload: &Payload<'_>) -> Result<Option<Request>, Fault> {
        match payload {
            Payload::Xml(root) => self.decode_document(root).map(Some),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sos_common::ExceptionCode;

    fn decode(xml: &str) -> Result<Request, Fault> {
        PoxDecoder::new().decode_document(&XmlElement::parse(xml).unwrap())
    }

    #[test]
    fn test_get_capabilities_accept_versions() {
        let request = decode(
            r#"<sos:GetCapabilities service="SOS" xmlns:sos="http://www.opengis.net/sos/2.0"
                   xmlns:ows="http://www.opengis.net/ows/1.1">
                 <ows:AcceptVersions>
                   <ows:Version>9.9.9</ows:Version>
                   <ows:Version>2.0.0</ows:Version>
                 </ows:AcceptVersions>
               </sos:GetCapabilities>"#,
        )
        .unwrap();

        assert_eq!(request.service.as_deref(), Some("SOS"));
        assert_eq!(request.version, None);
        match request.body {
            RequestBody::GetCapabilities(r) => assert_eq!(r.accept_versions, vec!["9.9.9", "2.0.0"]),
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_get_observation_with_period() {
        let request = decode(
            r#"<sos:GetObservation service="SOS" version="2.0.0"
                   xmlns:sos="http://www.opengis.net/sos/2.0"
                   xmlns:fes="http://www.opengis.net/fes/2.0"
                   xmlns:gml="http://www.opengis.net/gml/3.2">
                 <sos:procedure>p1</sos:procedure>
                 <sos:temporalFilter>
                   <fes:During>
                     <fes:ValueReference>om:resultTime</fes:ValueReference>
                     <gml:TimePeriod gml:id="tp_1">
                       <gml:beginPosition>2024-01-01T00:00:00Z</gml:beginPosition>
                       <gml:endPosition>2024-01-02T00:00:00Z</gml:endPosition>
                     </gml:TimePeriod>
                   </fes:During>
                 </sos:temporalFilter>
               </sos:GetObservation>"#,
        )
        .unwrap();

        match request.body {
            RequestBody::GetObservation(r) => {
                assert_eq!(r.procedures, vec!["p1"]);
                let filter = r.temporal_filter.unwrap();
                assert_eq!(filter.value_reference, "om:resultTime");
                assert!(filter.end.is_some());
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_insert_sensor_keeps_description() {
        let request = decode(
            r#"<swes:InsertSensor service="SOS" version="2.0.0"
                   xmlns:swes="http://www.opengis.net/swes/2.0"
                   xmlns:sml="http://www.opengis.net/sensorml/2.0"
                   xmlns:gml="http://www.opengis.net/gml/3.2">
                 <swes:procedureDescriptionFormat>http://www.opengis.net/sensorml/2.0</swes:procedureDescriptionFormat>
                 <swes:procedureDescription>
                   <sml:PhysicalSystem gml:id="s1">
                     <gml:identifier codeSpace="uniqueID">urn:sensor:1</gml:identifier>
                   </sml:PhysicalSystem>
                 </swes:procedureDescription>
                 <swes:observableProperty>temp</swes:observableProperty>
               </swes:InsertSensor>"#,
        )
        .unwrap();

        match request.body {
            RequestBody::InsertSensor(r) => {
                assert_eq!(r.procedure.as_deref(), Some("urn:sensor:1"));
                assert_eq!(r.observable_properties, vec!["temp"]);
                assert!(r.procedure_description.starts_with("<sml:PhysicalSystem"));
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_insert_observation_measure() {
        let request = decode(
            r#"<sos:InsertObservation service="SOS" version="2.0.0"
                   xmlns:sos="http://www.opengis.net/sos/2.0"
                   xmlns:om="http://www.opengis.net/om/2.0"
                   xmlns:gml="http://www.opengis.net/gml/3.2"
                   xmlns:xlink="http://www.w3.org/1999/xlink">
                 <sos:offering>p1-offering</sos:offering>
                 <sos:observation>
                   <om:OM_Observation gml:id="o1">
                     <om:phenomenonTime>
                       <gml:TimeInstant gml:id="t1">
                         <gml:timePosition>2024-01-01T00:00:00Z</gml:timePosition>
                       </gml:TimeInstant>
                     </om:phenomenonTime>
                     <om:procedure xlink:href="p1"/>
                     <om:observedProperty xlink:href="temp"/>
                     <om:featureOfInterest xlink:href="f1"/>
                     <om:result uom="Cel">21.5</om:result>
                   </om:OM_Observation>
                 </sos:observation>
               </sos:InsertObservation>"#,
        )
        .unwrap();

        match request.body {
            RequestBody::InsertObservation(r) => {
                let obs = &r.observations[0];
                assert_eq!(obs.procedure, "p1");
                assert_eq!(obs.feature_of_interest, "f1");
                assert_eq!(
                    obs.result,
                    ObservationValue::Measure {
                        value: 21.5,
                        uom: "Cel".to_string()
                    }
                );
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_extensions_are_captured() {
        let request = decode(
            r#"<sos:GetObservation service="SOS" version="2.0.0"
                   xmlns:sos="http://www.opengis.net/sos/2.0"
                   xmlns:swes="http://www.opengis.net/swes/2.0"
                   xmlns:swe="http://www.opengis.net/swe/2.0">
                 <swes:extension>
                   <swe:Boolean definition="MergeObservationsIntoDataArray">
                     <swe:value>true</swe:value>
                   </swe:Boolean>
                 </swes:extension>
               </sos:GetObservation>"#,
        )
        .unwrap();
        assert_eq!(
            request.extensions.get("MergeObservationsIntoDataArray"),
            Some("true")
        );
    }

    #[test]
    fn test_missing_procedure() {
        let fault = decode(
            r#"<swes:DeleteSensor service="SOS" version="2.0.0"
                   xmlns:swes="http://www.opengis.net/swes/2.0"/>"#,
        )
        .unwrap_err();
        assert_eq!(fault.first().code, ExceptionCode::MissingParameterValue);
        assert_eq!(fault.first().locator.as_deref(), Some("procedure"));
    }

    #[test]
    fn test_keys_cover_namespace_aliases() {
        let keys = PoxDecoder::new().keys();
        assert!(keys.contains(&FormatKey::request(namespaces::SWES_2_0, Operation::DescribeSensor)));
        assert!(keys.contains(&FormatKey::request(namespaces::SOS_2_0, Operation::DescribeSensor)));
        assert!(keys.contains(&FormatKey::request(namespaces::SOS_1_0, Operation::GetObservation)));
        assert!(!keys.contains(&FormatKey::request(namespaces::SOS_1_0, Operation::InsertSensor)));
    }
}
