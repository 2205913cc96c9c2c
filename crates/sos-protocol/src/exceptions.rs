//! Fault documents: OWS ExceptionReport (XML) and its JSON rendering.

use bytes::Bytes;
use quick_xml::escape::escape;
use serde::Serialize;
use sos_common::{media_types, namespaces, CodedException, Fault};

use crate::codec::FaultEncoder;

/// Report returned when no fault encoder is available or encoding fails.
pub const FALLBACK_EXCEPTION_REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ows:ExceptionReport xmlns:ows="http://www.opengis.net/ows/1.1" version="2.0.0">
  <ows:Exception exceptionCode="NoApplicableCode">
    <ows:ExceptionText>An internal error occurred while reporting an exception</ows:ExceptionText>
  </ows:Exception>
</ows:ExceptionReport>"#;

const REPORT_VERSION: &str = "2.0.0";

fn write_exception(out: &mut String, exception: &CodedException, indent: &str) {
    out.push_str(&format!(
        "{}<ows:Exception exceptionCode=\"{}\"",
        indent, exception.code
    ));
    if let Some(locator) = &exception.locator {
        out.push_str(&format!(" locator=\"{}\"", escape(locator)));
    }
    out.push_str(">\n");
    out.push_str(&format!(
        "{}  <ows:ExceptionText>{}</ows:ExceptionText>\n",
        indent,
        escape(exception.text())
    ));
    if let Some(cause) = &exception.cause {
        out.push_str(&format!(
            "{}  <ows:ExceptionText>[Cause] {}</ows:ExceptionText>\n",
            indent,
            escape(&cause.to_string())
        ));
    }
    out.push_str(&format!("{}</ows:Exception>\n", indent));
}

/// `ows:ExceptionReport` element without XML declaration.
pub fn exception_report_element(fault: &Fault, indent: &str) -> String {
    let mut out = format!(
        "{}<ows:ExceptionReport xmlns:ows=\"{}\" version=\"{}\">\n",
        indent,
        namespaces::OWS_1_1,
        REPORT_VERSION
    );
    let inner = format!("{}  ", indent);
    for exception in fault.iter() {
        write_exception(&mut out, exception, &inner);
    }
    out.push_str(&format!("{}</ows:ExceptionReport>", indent));
    out
}

/// Full OWS ExceptionReport document.
pub fn exception_report(fault: &Fault) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}",
        exception_report_element(fault, "")
    )
}

/// Writes OWS ExceptionReport documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct OwsExceptionReportEncoder;

impl FaultEncoder for OwsExceptionReportEncoder {
    fn name(&self) -> &'static str {
        "OwsExceptionReportEncoder"
    }

    fn media_types(&self) -> Vec<String> {
        vec![media_types::XML.to_string(), media_types::TEXT_XML.to_string()]
    }

    fn media_type(&self, requested: &str) -> String {
        if requested == media_types::TEXT_XML {
            media_types::TEXT_XML.to_string()
        } else {
            media_types::XML.to_string()
        }
    }

    fn encode(&self, fault: &Fault, _status: u16) -> Result<Bytes, Fault> {
        Ok(Bytes::from(exception_report(fault)))
    }
}

#[derive(Serialize)]
struct JsonException<'a> {
    code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    locator: Option<&'a str>,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cause: Option<String>,
}

#[derive(Serialize)]
struct JsonExceptionReport<'a> {
    version: &'a str,
    status: u16,
    exceptions: Vec<JsonException<'a>>,
}

/// Writes exception reports as JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonExceptionEncoder;

impl FaultEncoder for JsonExceptionEncoder {
    fn name(&self) -> &'static str {
        "JsonExceptionEncoder"
    }

    fn media_types(&self) -> Vec<String> {
        vec![media_types::JSON.to_string()]
    }

    fn encode(&self, fault: &Fault, status: u16) -> Result<Bytes, Fault> {
        let report = JsonExceptionReport {
            version: REPORT_VERSION,
            status,
            exceptions: fault
                .iter()
                .map(|e| JsonException {
                    code: e.code.as_str(),
                    locator: e.locator.as_deref(),
                    text: e.text(),
                    cause: e.cause.as_ref().map(|c| c.to_string()),
                })
                .collect(),
        };
        Ok(Bytes::from(serde_json::to_vec(&report)?))
    }
}
