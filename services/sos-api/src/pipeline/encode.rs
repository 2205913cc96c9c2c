//! Encode stage: typed response to outbound message.

use sos_common::{media_types, CodedException, Fault, FaultHint, Operation};
use sos_protocol::Response;

use super::PipelineSettings;
use crate::binding::{Binding, OutboundMessage};
use crate::content_negotiation::{parse_accept, refuses};
use crate::registry::CodecRegistry;

/// Pick the response format.
///
/// An explicit format in the request wins and must be encodable. Otherwise
/// the Accept header is consulted (except under SOAP, whose envelope fixes
/// the media type), then the binding's default.
pub fn select_format(
    codecs: &CodecRegistry,
    settings: &PipelineSettings,
    binding: Binding,
    accept: Option<&str>,
    requested: Option<&str>,
    operation: Operation,
) -> Result<String, Fault> {
    if let Some(format) = requested {
        if codecs.has_encoder(format, operation) {
            return Ok(format.to_string());
        }
        let locator = if operation == Operation::DescribeSensor {
            "procedureDescriptionFormat"
        } else {
            "responseFormat"
        };
        return Err(CodedException::invalid_parameter(
            locator,
            format!("The format '{}' is not supported for {}", format, operation),
        )
        .into());
    }

    // SOAP fixes the media type, so Accept is ignored there
    let ranges = match (binding, accept) {
        (Binding::Soap(_), _) | (_, None) => Vec::new(),
        (_, Some(accept)) => parse_accept(accept),
    };
    let not_acceptable = || -> Fault {
        CodedException::no_applicable_code(settings.phrases.unsupported_accept(accept.unwrap_or_default()))
            .with_hint(FaultHint::NotAcceptable)
            .into()
    };

    if !ranges.is_empty() {
        let mut wildcard = false;
        for range in ranges.iter().filter(|r| !r.is_refused()) {
            if range.is_wildcard() {
                wildcard = true;
                break;
            }
            if codecs.has_encoder(&range.media_type, operation) && !refuses(&ranges, &range.media_type) {
                return Ok(range.media_type.clone());
            }
        }
        if !wildcard {
            return Err(not_acceptable());
        }
    }

    let default = match binding {
        Binding::Json => media_types::JSON.to_string(),
        Binding::Rest => settings.rest.default_format.clone(),
        Binding::Kvp | Binding::Pox | Binding::Soap(_) => settings
            .default_formats
            .get(&operation)
            .cloned()
            .unwrap_or_else(|| media_types::XML.to_string()),
    };
    if refuses(&ranges, &default) {
        return Err(not_acceptable());
    }
    Ok(default)
}

/// Encode `response` in `format`.
pub fn encode(
    codecs: &CodecRegistry,
    binding: Binding,
    format: &str,
    response: &Response,
) -> Result<OutboundMessage, Fault> {
    let operation = response.operation();
    let encoder = codecs.lookup_encoder(format, operation).ok_or_else(|| {
        CodedException::no_applicable_code(format!(
            "No encoder found for {}@{} (response type {})",
            operation,
            format,
            response.type_name()
        ))
    })?;

    let media_type = encoder.media_type(format);
    if matches!(binding, Binding::Soap(_)) && !media_type.ends_with("xml") {
        return Err(CodedException::invalid_parameter(
            "responseFormat",
            format!("The format '{}' cannot be carried in a SOAP envelope", format),
        )
        .into());
    }

    let body = encoder.encode(response, format)?.ok_or_else(|| {
        CodedException::no_applicable_code(format!(
            "{} encoding failed but no exception was thrown",
            encoder.name()
        ))
    })?;

    Ok(OutboundMessage::new(200, media_type, body))
}
