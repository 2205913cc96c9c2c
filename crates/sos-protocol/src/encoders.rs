//! XML response encoding.
//!
//! Documents are written with `format!` and escaped text. They carry the
//! element structure clients look for, not the full O&M / SensorML schemas.

use bytes::Bytes;
use quick_xml::escape::escape;
use sos_common::{media_types, namespaces, CodedException, Fault, FormatKey, Operation};

use crate::codec::Encoder;
use crate::observation::{format_time, Feature, Observation, ObservationValue};
use crate::responses::{CapabilitiesResponse, Response, ResponseBody};

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// Operations with an XML response document.
const XML_OPERATIONS: [Operation; 10] = [
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

/// Encoder for SOS/SWES XML response documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct SosXmlEncoder;

impl SosXmlEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Write the response document.
    pub fn document(&self, response: &Response) -> Result<String, Fault> {
        let body = match &response.body {
            ResponseBody::GetCapabilities(caps) => capabilities(response, caps),
            ResponseBody::DescribeSensor(r) => {
                let description = if r.description.trim_start().starts_with('<') {
                    r.description.clone()
                } else {
                    escape(&r.description).into_owned()
                };
                format!(
                    "<swes:DescribeSensorResponse xmlns:swes=\"{}\">\n  <swes:procedureDescriptionFormat>{}</swes:procedureDescriptionFormat>\n  <swes:description>\n    <swes:SensorDescription>\n      <swes:data>{}</swes:data>\n    </swes:SensorDescription>\n  </swes:description>\n</swes:DescribeSensorResponse>",
                    namespaces::SWES_2_0,
                    escape(&r.procedure_description_format),
                    description
                )
            }
            ResponseBody::GetObservation(r) => observations("GetObservationResponse", &r.observations),
            ResponseBody::GetObservationById(r) => {
                observations("GetObservationByIdResponse", &r.observations)
            }
            ResponseBody::InsertObservation(r) => {
                let ids: String = r
                    .observation_ids
                    .iter()
                    .map(|id| format!("  <sos:observation>{}</sos:observation>\n", escape(id)))
                    .collect();
                format!(
                    "<sos:InsertObservationResponse xmlns:sos=\"{}\">\n{}</sos:InsertObservationResponse>",
                    namespaces::SOS_2_0,
                    ids
                )
            }
            ResponseBody::InsertSensor(r) => format!(
                "<swes:InsertSensorResponse xmlns:swes=\"{}\">\n  <swes:assignedProcedure>{}</swes:assignedProcedure>\n  <swes:assignedOffering>{}</swes:assignedOffering>\n</swes:InsertSensorResponse>",
                namespaces::SWES_2_0,
                escape(&r.assigned_procedure),
                escape(&r.assigned_offering)
            ),
            ResponseBody::UpdateSensorDescription(r) => format!(
                "<swes:UpdateSensorDescriptionResponse xmlns:swes=\"{}\">\n  <swes:updatedProcedure>{}</swes:updatedProcedure>\n</swes:UpdateSensorDescriptionResponse>",
                namespaces::SWES_2_0,
                escape(&r.updated_procedure)
            ),
            ResponseBody::DeleteSensor(r) => format!(
                "<swes:DeleteSensorResponse xmlns:swes=\"{}\">\n  <swes:deletedProcedure>{}</swes:deletedProcedure>\n</swes:DeleteSensorResponse>",
                namespaces::SWES_2_0,
                escape(&r.deleted_procedure)
            ),
            ResponseBody::GetResult(r) => format!(
                "<sos:GetResultResponse xmlns:sos=\"{}\">\n  <sos:resultValues>{}</sos:resultValues>\n</sos:GetResultResponse>",
                namespaces::SOS_2_0,
                escape(&r.result_values)
            ),
            ResponseBody::GetFeatureOfInterest(r) => features(&r.features),
            ResponseBody::Batch(_) | ResponseBody::Options(_) => {
                return Err(CodedException::no_applicable_code(format!(
                    "{} responses have no XML encoding",
                    response.operation()
                ))
                .into());
            }
        };
        Ok(format!("{}{}", XML_DECLARATION, body))
    }
}

fn capabilities(response: &Response, caps: &CapabilitiesResponse) -> String {
    let sos_ns = if response.version == sos_common::versions::V1_0_0 {
        namespaces::SOS_1_0
    } else {
        namespaces::SOS_2_0
    };

    let mut out = format!(
        "<sos:Capabilities xmlns:sos=\"{}\" xmlns:ows=\"{}\" xmlns:xlink=\"{}\" version=\"{}\"",
        sos_ns,
        namespaces::OWS_1_1,
        namespaces::XLINK,
        escape(&response.version)
    );
    if let Some(seq) = &caps.update_sequence {
        out.push_str(&format!(" updateSequence=\"{}\"", escape(seq)));
    }
    out.push_str(">\n");

    if let Some(ident) = &caps.service_identification {
        out.push_str("  <ows:ServiceIdentification>\n");
        out.push_str(&format!("    <ows:Title>{}</ows:Title>\n", escape(&ident.title)));
        if let Some(abstract_text) = &ident.abstract_text {
            out.push_str(&format!("    <ows:Abstract>{}</ows:Abstract>\n", escape(abstract_text)));
        }
        out.push_str(&format!(
            "    <ows:ServiceType>{}</ows:ServiceType>\n",
            escape(&ident.service_type)
        ));
        for version in &ident.service_type_versions {
            out.push_str(&format!(
                "    <ows:ServiceTypeVersion>{}</ows:ServiceTypeVersion>\n",
                escape(version)
            ));
        }
        out.push_str("  </ows:ServiceIdentification>\n");
    }

    if let Some(operations) = &caps.operations_metadata {
        out.push_str("  <ows:OperationsMetadata>\n");
        for op in operations {
            let href = escape(&op.href);
            out.push_str(&format!(
                "    <ows:Operation name=\"{}\">\n      <ows:DCP>\n        <ows:HTTP>\n          <ows:Get xlink:href=\"{}\"/>\n          <ows:Post xlink:href=\"{}\"/>\n        </ows:HTTP>\n      </ows:DCP>\n    </ows:Operation>\n",
                escape(&op.name),
                href,
                href
            ));
        }
        out.push_str("  </ows:OperationsMetadata>\n");
    }

    if let Some(offerings) = &caps.contents {
        out.push_str("  <sos:contents>\n    <sos:Contents>\n");
        for offering in offerings {
            out.push_str("      <sos:offering>\n        <sos:ObservationOffering>\n");
            out.push_str(&format!(
                "          <swes:identifier xmlns:swes=\"{}\">{}</swes:identifier>\n",
                namespaces::SWES_2_0,
                escape(&offering.identifier)
            ));
            out.push_str(&format!(
                "          <swes:procedure xmlns:swes=\"{}\">{}</swes:procedure>\n",
                namespaces::SWES_2_0,
                escape(&offering.procedure)
            ));
            for property in &offering.observable_properties {
                out.push_str(&format!(
                    "          <swes:observableProperty xmlns:swes=\"{}\">{}</swes:observableProperty>\n",
                    namespaces::SWES_2_0,
                    escape(property)
                ));
            }
            if let Some(period) = &offering.phenomenon_time {
                out.push_str(&format!(
                    "          <sos:phenomenonTime>{}/{}</sos:phenomenonTime>\n",
                    format_time(&period.begin),
                    format_time(&period.end)
                ));
            }
            out.push_str("        </sos:ObservationOffering>\n      </sos:offering>\n");
        }
        out.push_str("    </sos:Contents>\n  </sos:contents>\n");
    }

    out.push_str("</sos:Capabilities>");
    out
}

fn observation_xml(index: usize, obs: &Observation) -> String {
    let gml_id = obs
        .identifier
        .clone()
        .unwrap_or_else(|| format!("o_{}", index + 1));
    let result = match &obs.result {
        ObservationValue::Measure { value, uom } => format!(
            "<om:result xsi:type=\"gml:MeasureType\" uom=\"{}\">{}</om:result>",
            escape(uom),
            value
        ),
        ObservationValue::Text(text) => format!(
            "<om:result xsi:type=\"xs:string\">{}</om:result>",
            escape(text)
        ),
    };

    let mut out = String::from("  <sos:observationData>\n");
    out.push_str(&format!("    <om:OM_Observation gml:id=\"{}\">\n", escape(&gml_id)));
    if let Some(identifier) = &obs.identifier {
        out.push_str(&format!("      <gml:identifier codeSpace=\"http://www.opengis.net/def/nil/OGC/0/unknown\">{}</gml:identifier>\n", escape(identifier)));
    }
    out.push_str(&format!(
        "      <om:phenomenonTime>\n        <gml:TimeInstant gml:id=\"phenomenonTime_{}\">\n          <gml:timePosition>{}</gml:timePosition>\n        </gml:TimeInstant>\n      </om:phenomenonTime>\n",
        index + 1,
        format_time(&obs.phenomenon_time)
    ));
    out.push_str(&format!(
        "      <om:procedure xlink:href=\"{}\"/>\n      <om:observedProperty xlink:href=\"{}\"/>\n      <om:featureOfInterest xlink:href=\"{}\"/>\n      {}\n",
        escape(&obs.procedure),
        escape(&obs.observed_property),
        escape(&obs.feature_of_interest),
        result
    ));
    out.push_str("    </om:OM_Observation>\n  </sos:observationData>\n");
    out
}

fn observations(element: &str, observations: &[Observation]) -> String {
    let mut out = format!(
        "<sos:{} xmlns:sos=\"{}\" xmlns:om=\"{}\" xmlns:gml=\"{}\" xmlns:xlink=\"{}\" xmlns:xsi=\"{}\" xmlns:xs=\"http://www.w3.org/2001/XMLSchema\">\n",
        element,
        namespaces::SOS_2_0,
        namespaces::OM_2_0,
        namespaces::GML_3_2,
        namespaces::XLINK,
        namespaces::XSI
    );
    for (index, obs) in observations.iter().enumerate() {
        out.push_str(&observation_xml(index, obs));
    }
    out.push_str(&format!("</sos:{}>", element));
    out
}

fn features(features: &[Feature]) -> String {
    let mut out = format!(
        "<sos:GetFeatureOfInterestResponse xmlns:sos=\"{}\" xmlns:sams=\"{}\" xmlns:gml=\"{}\">\n",
        namespaces::SOS_2_0,
        namespaces::SAMS_2_0,
        namespaces::GML_3_2
    );
    for (index, feature) in features.iter().enumerate() {
        out.push_str("  <sos:featureMember>\n");
        out.push_str(&format!(
            "    <sams:SF_SpatialSamplingFeature gml:id=\"foi_{}\">\n      <gml:identifier codeSpace=\"http://www.opengis.net/def/nil/OGC/0/unknown\">{}</gml:identifier>\n",
            index + 1,
            escape(&feature.identifier)
        ));
        if let Some(name) = &feature.name {
            out.push_str(&format!(
                "      <gml:name>{}</gml:name>\n",
                escape(name)
            ));
        }
        if let Some(point) = &feature.geometry {
            out.push_str(&format!(
                "      <sams:shape>\n        <gml:Point gml:id=\"point_{}\" srsName=\"http://www.opengis.net/def/crs/EPSG/0/4326\">\n          <gml:pos>{} {}</gml:pos>\n        </gml:Point>\n      </sams:shape>\n",
                index + 1,
                point.lat,
                point.lon
            ));
        }
        out.push_str("    </sams:SF_SpatialSamplingFeature>\n  </sos:featureMember>\n");
    }
    out.push_str("</sos:GetFeatureOfInterestResponse>");
    out
}

impl Encoder for SosXmlEncoder {
    fn name(&self) -> &'static str {
        "SosXmlEncoder"
    }

    fn keys(&self) -> Vec<FormatKey> {
        let mut keys = Vec::new();
        for op in XML_OPERATIONS {
            keys.push(FormatKey::response(media_types::XML, op));
            keys.push(FormatKey::response(media_types::TEXT_XML, op));
        }
        keys.push(FormatKey::response(media_types::OM_2_0, Operation::GetObservation));
        keys.push(FormatKey::response(media_types::OM_2_0, Operation::GetObservationById));
        keys.push(FormatKey::response(media_types::SENSORML_2_0, Operation::DescribeSensor));
        keys.push(FormatKey::response(media_types::SENSORML_1_0_1, Operation::DescribeSensor));
        keys
    }

    fn media_type(&self, format: &str) -> String {
        if format == media_types::TEXT_XML {
            media_types::TEXT_XML.to_string()
        } else {
            media_types::XML.to_string()
        }
    }

    fn encode(&self, response: &Response, _format: &str) -> Result<Option<Bytes>, Fault> {
        self.document(response).map(|doc| Some(Bytes::from(doc)))
    }
}
