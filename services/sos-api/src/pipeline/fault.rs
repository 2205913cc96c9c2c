//! Fault translation: status code selection and fault document encoding.

use sos_common::{media_types, CodedException, ExceptionCode, Fault, FaultHint, FaultPhrases};
use sos_protocol::{SoapVersion, FALLBACK_EXCEPTION_REPORT};
use tracing::{error, warn};

use crate::binding::{Binding, OutboundMessage};
use crate::content_negotiation::negotiate;
use crate::registry::CodecRegistry;

const FALLBACK_STATUS: u16 = 500;

/// Maps faults to HTTP status codes.
///
/// Exceptions are examined in order and the first one matching a rule
/// decides. Rules are tried in table order; hinted exceptions match on their
/// hint, unhinted ones on the configured message phrases.
#[derive(Debug, Clone)]
pub struct FaultTranslator {
    phrases: FaultPhrases,
}

impl FaultTranslator {
    pub fn new(phrases: FaultPhrases) -> Self {
        Self { phrases }
    }

    pub fn status_for(&self, fault: &Fault) -> u16 {
        fault
            .iter()
            .find_map(|exception| self.classify(exception))
            .unwrap_or(FALLBACK_STATUS)
    }

    fn classify(&self, exception: &CodedException) -> Option<u16> {
        let message = exception.message.as_deref().unwrap_or_default();
        let hint = exception.hint;
        let phrases = &self.phrases;

        if hint == Some(FaultHint::ResourceNotFound) {
            return Some(404);
        }

        match exception.code {
            ExceptionCode::OperationNotSupported => {
                let by_text = message.contains(&phrases.operation_not_supported_start)
                    && message.contains(&phrases.operation_not_supported_end);
                (hint == Some(FaultHint::OperationDisabled) || by_text).then_some(400)
            }
            ExceptionCode::NoApplicableCode => {
                if hint == Some(FaultHint::MethodNotAllowed)
                    || message.contains(&phrases.method_not_allowed_for_resource_type)
                {
                    Some(405)
                } else if hint == Some(FaultHint::BadRequest) {
                    Some(400)
                } else if hint == Some(FaultHint::UnsupportedMediaType)
                    || message.contains(&phrases.wrong_content_type)
                {
                    Some(415)
                } else if hint == Some(FaultHint::NotAcceptable)
                    || message.contains(&phrases.wrong_content_type_in_accept)
                {
                    Some(406)
                } else if message.contains("HTTP method") && message.contains("not allowed") {
                    // Kept for faults raised with free text only; see DESIGN.md.
                    Some(405)
                } else {
                    None
                }
            }
            ExceptionCode::InvalidParameterValue
            | ExceptionCode::MissingParameterValue
            | ExceptionCode::VersionNegotiationFailed => Some(400),
        }
    }

    /// Fault media type for a binding.
    ///
    /// SOAP and JSON callers get their own fault format. The other bindings
    /// negotiate between the registered XML and JSON encoders.
    pub fn media_type_for(&self, codecs: &CodecRegistry, binding: Binding, accept: Option<&str>, rest_default: &str) -> String {
        match binding {
            Binding::Soap(SoapVersion::V12) => media_types::SOAP.to_string(),
            Binding::Soap(SoapVersion::V11) => media_types::SOAP_1_1_FAULT.to_string(),
            Binding::Json => media_types::JSON.to_string(),
            Binding::Kvp | Binding::Pox | Binding::Rest => {
                let default = if binding == Binding::Rest {
                    rest_default
                } else {
                    media_types::XML
                };
                let candidates = [media_types::XML, media_types::TEXT_XML, media_types::JSON];
                let supported: Vec<&str> = candidates
                    .iter()
                    .copied()
                    .filter(|m| codecs.has_fault_encoder(m))
                    .collect();
                negotiate(accept, &supported, default)
                    .unwrap_or(default)
                    .to_string()
            }
        }
    }

    /// Encode a fault. Never fails: a missing or failing fault encoder
    /// yields the fixed fallback report with status 500.
    pub fn translate(&self, codecs: &CodecRegistry, fault: &Fault, media_type: &str) -> OutboundMessage {
        let status = self.status_for(fault);
        if status >= 500 {
            error!(status = status, fault = %fault, "Request failed");
        } else {
            warn!(status = status, fault = %fault, "Request rejected");
        }

        let encoder = match codecs.lookup_fault_encoder(media_type) {
            Some(encoder) => encoder,
            None => {
                error!(media_type = media_type, "No fault encoder registered");
                return fallback();
            }
        };

        match encoder.encode(fault, status) {
            Ok(body) => OutboundMessage::new(status, encoder.media_type(media_type), body),
            Err(e) => {
                error!(encoder = encoder.name(), error = %e, "Fault encoding failed");
                fallback()
            }
        }
    }
}

/// Fixed minimal report used when fault encoding is impossible.
pub fn fallback() -> OutboundMessage {
    OutboundMessage::new(FALLBACK_STATUS, media_types::XML, FALLBACK_EXCEPTION_REPORT)
}
