//! Decode stage: transport message to typed request.
//!
//! The stage works out a decoder hint from the endpoint, the HTTP method,
//! the content type and (for documents) the root element, then hands the
//! payload to whatever decoder the registry resolves for that hint.

use sos_common::{media_types, CodedException, Fault, FaultHint, FaultPhrases};
use sos_protocol::{
    Decoder, DecoderHint, KvpParams, Payload, Request, RestCall, SoapEnvelope, XmlElement,
};

use crate::binding::{Binding, Endpoint, TransportMessage};
use crate::registry::CodecRegistry;

/// Output of the decode stage.
#[derive(Debug)]
pub struct Decoded {
    pub request: Request,
    /// Binding the request actually arrived in.
    pub binding: Binding,
    /// The REST call, kept for link generation.
    pub call: Option<RestCall>,
    /// `wsa:MessageID` of a SOAP request.
    pub message_id: Option<String>,
}

/// A decoding failure, with the binding known at the time it happened.
#[derive(Debug)]
pub struct Rejected {
    pub binding: Binding,
    pub fault: Fault,
}

pub fn decode(
    codecs: &CodecRegistry,
    phrases: &FaultPhrases,
    message: &TransportMessage,
) -> Result<Decoded, Rejected> {
    let binding = Binding::assumed(message);
    let reject = |fault: Fault| Rejected { binding, fault };

    if message.endpoint == Endpoint::Rest {
        let params = KvpParams::from_pairs(message.query.iter().cloned());
        let body = body_text(message).map_err(reject)?;
        let call = RestCall::new(message.method.as_str(), &message.path, params)
            .with_body(body, message.content_type.clone());
        let hint = DecoderHint::new(media_types::REST, None);
        let request = run(codecs, &hint, &Payload::Rest(&call)).map_err(reject)?;
        return Ok(Decoded {
            request: attach_context(request, message),
            binding,
            call: Some(call),
            message_id: None,
        });
    }

    match message.method.as_str() {
        "GET" => {
            let params = KvpParams::from_pairs(message.query.iter().cloned());
            let hint = DecoderHint::new(media_types::KVP, params.get("request").map(str::to_string));
            let request = run(codecs, &hint, &Payload::Kvp(&params)).map_err(reject)?;
            Ok(Decoded {
                request: attach_context(request, message),
                binding,
                call: None,
                message_id: None,
            })
        }
        "POST" => decode_post(codecs, phrases, message),
        other => Err(reject(
            CodedException::no_applicable_code(phrases.method_not_allowed(other, "service"))
                .with_hint(FaultHint::MethodNotAllowed)
                .into(),
        )),
    }
}

fn decode_post(
    codecs: &CodecRegistry,
    phrases: &FaultPhrases,
    message: &TransportMessage,
) -> Result<Decoded, Rejected> {
    let assumed = Binding::assumed(message);
    let essence = message.content_type_essence().unwrap_or_default();

    match essence.as_str() {
        media_types::JSON => {
            let value: serde_json::Value = serde_json::from_slice(&message.body)
                .map_err(|e| Rejected {
                    binding: assumed,
                    fault: e.into(),
                })?;
            let operation = value
                .get("request")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            let hint = DecoderHint::new(media_types::JSON, operation);
            let request = run(codecs, &hint, &Payload::Json(&value)).map_err(|fault| Rejected {
                binding: assumed,
                fault,
            })?;
            Ok(Decoded {
                request: attach_context(request, message),
                binding: Binding::Json,
                call: None,
                message_id: None,
            })
        }
        media_types::SOAP | media_types::XML | media_types::TEXT_XML => {
            let root = body_text(message)
                .and_then(XmlElement::parse)
                .map_err(|fault| Rejected {
                    binding: assumed,
                    fault,
                })?;

            if essence == media_types::SOAP || SoapEnvelope::is_envelope(&root) {
                decode_soap(codecs, message, root)
            } else {
                let hint = document_hint(&root);
                let request = run(codecs, &hint, &Payload::Xml(&root)).map_err(|fault| Rejected {
                    binding: Binding::Pox,
                    fault,
                })?;
                Ok(Decoded {
                    request: attach_context(request, message),
                    binding: Binding::Pox,
                    call: None,
                    message_id: None,
                })
            }
        }
        _ => {
            let shown = message.content_type.as_deref().unwrap_or("none");
            Err(Rejected {
                binding: assumed,
                fault: CodedException::no_applicable_code(phrases.unsupported_content_type(shown))
                    .with_hint(FaultHint::UnsupportedMediaType)
                    .into(),
            })
        }
    }
}

fn decode_soap(
    codecs: &CodecRegistry,
    message: &TransportMessage,
    root: XmlElement,
) -> Result<Decoded, Rejected> {
    let assumed = Binding::assumed(message);
    let envelope = SoapEnvelope::from_element(root).map_err(|fault| Rejected {
        binding: assumed,
        fault,
    })?;
    let binding = Binding::Soap(envelope.version);
    let headers = envelope.header_extensions();
    let message_id = headers.get("MessageID").map(str::to_string);

    let hint = document_hint(&envelope.payload);
    let mut request = run(codecs, &hint, &Payload::Xml(&envelope.payload))
        .map_err(|fault| Rejected { binding, fault })?;

    for header in headers.iter() {
        if request.extensions.get(&header.name).is_none() {
            request.extensions.insert(header.name.clone(), header.value.clone());
        }
    }

    Ok(Decoded {
        request: attach_context(request, message),
        binding,
        call: None,
        message_id,
    })
}

fn document_hint(root: &XmlElement) -> DecoderHint {
    DecoderHint::new(
        root.namespace.clone().unwrap_or_default(),
        Some(root.local_name.clone()),
    )
}

fn body_text(message: &TransportMessage) -> Result<&str, Fault> {
    std::str::from_utf8(&message.body).map_err(|e| {
        CodedException::no_applicable_code("The request body is not valid UTF-8")
            .with_hint(FaultHint::BadRequest)
            .with_cause(e)
            .into()
    })
}

fn attach_context(mut request: Request, message: &TransportMessage) -> Request {
    request.context = message.context.clone();
    request
}

/// Resolve a decoder for `hint` and run it.
fn run(codecs: &CodecRegistry, hint: &DecoderHint, payload: &Payload<'_>) -> Result<Request, Fault> {
    let decoder = codecs.lookup_decoder(hint).ok_or_else(|| {
        CodedException::no_applicable_code(format!("No decoder found for {}", hint))
    })?;

    decoder.decode(payload)?.ok_or_else(|| {
        CodedException::no_applicable_code(format!(
            "{} decoding failed but no exception was thrown",
            decoder.name()
        ))
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sos_common::{ExceptionCode, Operation};
    use sos_protocol::{RestVocabulary, SoapVersion};
    use std::sync::Arc;

    fn codecs() -> CodecRegistry {
        CodecRegistry::with_defaults(RestVocabulary::default(), FaultPhrases::default())
    }

    fn decode_message(message: TransportMessage) -> Result<Decoded, Rejected> {
        decode(&codecs(), &FaultPhrases::default(), &message)
    }

    #[test]
    fn test_kvp_get() {
        let decoded = decode_message(TransportMessage::kvp([
            ("service", "SOS"),
            ("request", "GetCapabilities"),
        ]))
        .unwrap();
        assert_eq!(decoded.binding, Binding::Kvp);
        assert_eq!(decoded.request.operation(), Operation::GetCapabilities);
    }

    #[test]
    fn test_kvp_without_request_reaches_decoder() {
        let rejected = decode_message(TransportMessage::kvp([("service", "SOS")])).unwrap_err();
        assert_eq!(rejected.fault.first().code, ExceptionCode::MissingParameterValue);
        assert_eq!(rejected.fault.first().locator.as_deref(), Some("request"));
    }

    #[test]
    fn test_pox_by_root_element() {
        let body = r#"<sos:GetCapabilities xmlns:sos="http://www.opengis.net/sos/2.0" service="SOS"/>"#;
        let decoded = decode_message(TransportMessage::post("application/xml", body)).unwrap();
        assert_eq!(decoded.binding, Binding::Pox);
        assert_eq!(decoded.request.operation(), Operation::GetCapabilities);
    }

    #[test]
    fn test_soap_envelope_under_text_xml() {
        let body = r#"<env:Envelope xmlns:env="http://schemas.xmlsoap.org/soap/envelope/">
  <env:Header><wsa:MessageID xmlns:wsa="http://www.w3.org/2005/08/addressing">urn:uuid:1</wsa:MessageID></env:Header>
  <env:Body><sos:GetCapabilities xmlns:sos="http://www.opengis.net/sos/2.0" service="SOS"/></env:Body>
</env:Envelope>"#;
        let decoded = decode_message(TransportMessage::post("text/xml", body)).unwrap();
        assert_eq!(decoded.binding, Binding::Soap(SoapVersion::V11));
        assert_eq!(decoded.message_id.as_deref(), Some("urn:uuid:1"));
        assert_eq!(decoded.request.extensions.get("MessageID"), Some("urn:uuid:1"));
    }

    #[test]
    fn test_soap_content_type_requires_envelope() {
        let body = r#"<sos:GetCapabilities xmlns:sos="http://www.opengis.net/sos/2.0"/>"#;
        let rejected = decode_message(TransportMessage::post("application/soap+xml", body)).unwrap_err();
        assert_eq!(rejected.binding, Binding::Soap(SoapVersion::V12));
        assert_eq!(rejected.fault.first().hint, Some(FaultHint::BadRequest));
    }

    #[test]
    fn test_unknown_namespace_has_no_decoder() {
        let body = r#"<x:GetCapabilities xmlns:x="urn:nothing"/>"#;
        let rejected = decode_message(TransportMessage::post("application/xml", body)).unwrap_err();
        assert_eq!(rejected.fault.first().code, ExceptionCode::NoApplicableCode);
        assert!(rejected.fault.first().text().starts_with("No decoder found for"));
    }

    #[test]
    fn test_unsupported_content_type() {
        let rejected = decode_message(TransportMessage::post("image/png", "x")).unwrap_err();
        assert_eq!(rejected.fault.first().hint, Some(FaultHint::UnsupportedMediaType));
        assert!(rejected.fault.first().text().contains("image/png"));
    }

    #[test]
    fn test_method_not_allowed_on_service_endpoint() {
        let rejected = decode_message(TransportMessage::new(Endpoint::Service, "DELETE")).unwrap_err();
        assert_eq!(rejected.fault.first().hint, Some(FaultHint::MethodNotAllowed));
    }

    #[test]
    fn test_json_syntax_error_is_bad_request() {
        let rejected = decode_message(TransportMessage::post("application/json", "{not json")).unwrap_err();
        assert_eq!(rejected.binding, Binding::Json);
        assert_eq!(rejected.fault.first().hint, Some(FaultHint::BadRequest));
    }

    #[test]
    fn test_rest_call_keeps_call() {
        let decoded = decode_message(TransportMessage::rest("GET", "sensors/urn:x")).unwrap();
        assert_eq!(decoded.binding, Binding::Rest);
        assert_eq!(decoded.request.operation(), Operation::DescribeSensor);
        assert_eq!(decoded.call.unwrap().id.as_deref(), Some("urn:x"));
    }

    struct SilentDecoder;

    impl Decoder for SilentDecoder {
        fn name(&self) -> &'static str {
            "SilentDecoder"
        }

        fn keys(&self) -> Vec<sos_common::FormatKey> {
            vec![sos_common::FormatKey::request(media_types::KVP, Operation::GetCapabilities)]
        }

        fn decode(&self, _payload: &Payload<'_>) -> Result<Option<Request>, Fault> {
            Ok(None)
        }
    }

    #[test]
    fn test_decoder_returning_nothing() {
        let codecs = codecs();
        codecs.add_decoder(Arc::new(SilentDecoder));
        let message = TransportMessage::kvp([("service", "SOS"), ("request", "GetCapabilities")]);
        let rejected = decode(&codecs, &FaultPhrases::default(), &message).unwrap_err();
        assert_eq!(
            rejected.fault.first().text(),
            "SilentDecoder decoding failed but no exception was thrown"
        );
    }
}
