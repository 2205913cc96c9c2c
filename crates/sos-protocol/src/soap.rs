//! SOAP 1.1 / 1.2 envelope handling.

use bytes::Bytes;
use quick_xml::escape::escape;
use sos_common::{media_types, namespaces, CodedException, Fault, FaultHint};

use crate::codec::FaultEncoder;
use crate::exceptions::exception_report_element;
use crate::requests::Extensions;
use crate::xml::XmlElement;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoapVersion {
    V11,
    V12,
}

impl SoapVersion {
    pub fn namespace(&self) -> &'static str {
        match self {
            SoapVersion::V11 => namespaces::SOAP_1_1,
            SoapVersion::V12 => namespaces::SOAP_1_2,
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            SoapVersion::V11 => media_types::TEXT_XML,
            SoapVersion::V12 => media_types::SOAP,
        }
    }

    pub fn from_namespace(namespace: &str) -> Option<Self> {
        match namespace {
            namespaces::SOAP_1_1 => Some(SoapVersion::V11),
            namespaces::SOAP_1_2 => Some(SoapVersion::V12),
            _ => None,
        }
    }
}

/// A parsed SOAP envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapEnvelope {
    pub version: SoapVersion,
    pub headers: Vec<XmlElement>,
    /// First element inside `Body`.
    pub payload: XmlElement,
}

fn bad_envelope(message: &str) -> Fault {
    CodedException::no_applicable_code(message)
        .with_hint(FaultHint::BadRequest)
        .into()
}

impl SoapEnvelope {
    /// Whether a root element is a SOAP envelope of either version.
    pub fn is_envelope(root: &XmlElement) -> bool {
        root.local_name == "Envelope"
            && root
                .namespace
                .as_deref()
                .and_then(SoapVersion::from_namespace)
                .is_some()
    }

    pub fn from_element(root: XmlElement) -> Result<Self, Fault> {
        let version = root
            .namespace
            .as_deref()
            .and_then(SoapVersion::from_namespace)
            .filter(|_| root.local_name == "Envelope")
            .ok_or_else(|| bad_envelope("The document is not a SOAP envelope"))?;

        let mut headers = Vec::new();
        let mut payload = None;
        for child in root.children {
            if child.namespace.as_deref() != Some(version.namespace()) {
                continue;
            }
            match child.local_name.as_str() {
                "Header" => headers.extend(child.children),
                "Body" => payload = child.children.into_iter().next(),
                _ => {}
            }
        }

        let payload = payload.ok_or_else(|| bad_envelope("The SOAP envelope has no body content"))?;
        Ok(Self {
            version,
            headers,
            payload,
        })
    }

    /// Header blocks as request extensions, keyed by local name.
    pub fn header_extensions(&self) -> Extensions {
        let mut extensions = Extensions::new();
        for header in &self.headers {
            let value = header
                .text()
                .map(str::to_string)
                .unwrap_or_else(|| header.to_xml());
            extensions.insert(header.local_name.clone(), value);
        }
        extensions
    }
}

/// Strip a leading XML declaration from a document.
fn strip_declaration(document: &str) -> &str {
    let trimmed = document.trim_start();
    if trimmed.starts_with("<?xml") {
        match trimmed.find("?>") {
            Some(end) => trimmed[end + 2..].trim_start(),
            None => trimmed,
        }
    } else {
        trimmed
    }
}

/// Wrap a response document into an envelope of the given version.
///
/// `relates_to` is the `wsa:MessageID` of the request, if it sent one.
pub fn wrap_response(document: &str, version: SoapVersion, relates_to: Option<&str>) -> String {
    let message_id = format!("urn:uuid:{}", uuid::Uuid::new_v4());
    let mut header = format!("    <wsa:MessageID>{}</wsa:MessageID>\n", message_id);
    if let Some(relates_to) = relates_to {
        header.push_str(&format!(
            "    <wsa:RelatesTo>{}</wsa:RelatesTo>\n",
            escape(relates_to)
        ));
    }

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<env:Envelope xmlns:env=\"{}\" xmlns:wsa=\"{}\">\n  <env:Header>\n{}  </env:Header>\n  <env:Body>\n{}\n  </env:Body>\n</env:Envelope>",
        version.namespace(),
        namespaces::WSA,
        header,
        strip_declaration(document)
    )
}

/// Writes faults as SOAP 1.2 `env:Fault` elements with an embedded
/// ExceptionReport.
#[derive(Debug, Default, Clone, Copy)]
pub struct SoapFaultEncoder;

impl FaultEncoder for SoapFaultEncoder {
    fn name(&self) -> &'static str {
        "SoapFaultEncoder"
    }

    fn media_types(&self) -> Vec<String> {
        vec![media_types::SOAP.to_string()]
    }

    fn encode(&self, fault: &Fault, status: u16) -> Result<Bytes, Fault> {
        let first = fault.first();
        let code = if (400..500).contains(&status) {
            "env:Sender"
        } else {
            "env:Receiver"
        };

        let document = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<env:Envelope xmlns:env=\"{env}\" xmlns:ows=\"{ows}\">\n  <env:Body>\n    <env:Fault>\n      <env:Code>\n        <env:Value>{code}</env:Value>\n        <env:Subcode>\n          <env:Value>ows:{subcode}</env:Value>\n        </env:Subcode>\n      </env:Code>\n      <env:Reason>\n        <env:Text xml:lang=\"en\">{reason}</env:Text>\n      </env:Reason>\n      <env:Detail>\n{report}\n      </env:Detail>\n    </env:Fault>\n  </env:Body>\n</env:Envelope>",
            env = namespaces::SOAP_1_2,
            ows = namespaces::OWS_1_1,
            code = code,
            subcode = first.code,
            reason = escape(first.text()),
            report = exception_report_element(fault, "        "),
        );
        Ok(Bytes::from(document))
    }
}

/// Writes faults as SOAP 1.1 `soap:Fault` elements with an embedded
/// ExceptionReport.
///
/// SOAP 1.1 shares `text/xml` with the plain ExceptionReport, so the encoder
/// is registered under [`media_types::SOAP_1_1_FAULT`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Soap11FaultEncoder;

impl FaultEncoder for Soap11FaultEncoder {
    fn name(&self) -> &'static str {
        "Soap11FaultEncoder"
    }

    fn media_types(&self) -> Vec<String> {
        vec![media_types::SOAP_1_1_FAULT.to_string()]
    }

    fn media_type(&self, _requested: &str) -> String {
        SoapVersion::V11.media_type().to_string()
    }

    fn encode(&self, fault: &Fault, status: u16) -> Result<Bytes, Fault> {
        let first = fault.first();
        let code = if (400..500).contains(&status) {
            "soap:Client"
        } else {
            "soap:Server"
        };

        let document = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<soap:Envelope xmlns:soap=\"{env}\">\n  <soap:Body>\n    <soap:Fault>\n      <faultcode>{code}</faultcode>\n      <faultstring>{reason}</faultstring>\n      <detail>\n{report}\n      </detail>\n    </soap:Fault>\n  </soap:Body>\n</soap:Envelope>",
            env = namespaces::SOAP_1_1,
            code = code,
            reason = escape(first.text()),
            report = exception_report_element(fault, "        "),
        );
        Ok(Bytes::from(document))
    }
}
