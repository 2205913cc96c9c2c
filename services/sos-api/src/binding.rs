//! Transport-facing message types.
//!
//! The HTTP layer fills a [`TransportMessage`]; the pipeline answers with an
//! [`OutboundMessage`]. Neither carries axum types, so the pipeline can be
//! driven directly from tests.

use bytes::Bytes;
use sos_common::media_types;
use sos_protocol::{RequestContext, SoapVersion};

/// HTTP endpoint that received a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// The operation endpoint taking KVP queries and POST bodies.
    Service,
    /// The REST resource tree below the configured URL pattern.
    Rest,
}

/// Wire binding a request was (or is assumed to be) encoded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Kvp,
    Pox,
    Soap(SoapVersion),
    Json,
    Rest,
}

impl Binding {
    /// Binding implied by the endpoint, method and declared content type,
    /// before the body has been looked at.
    pub fn assumed(message: &TransportMessage) -> Self {
        if message.endpoint == Endpoint::Rest {
            return Binding::Rest;
        }
        if message.method.eq_ignore_ascii_case("GET") {
            return Binding::Kvp;
        }
        match message.content_type_essence().as_deref() {
            Some(media_types::SOAP) => Binding::Soap(SoapVersion::V12),
            Some(media_types::JSON) => Binding::Json,
            Some(media_types::XML) | Some(media_types::TEXT_XML) => Binding::Pox,
            _ => Binding::Kvp,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Binding::Kvp => "kvp",
            Binding::Pox => "pox",
            Binding::Soap(_) => "soap",
            Binding::Json => "json",
            Binding::Rest => "rest",
        }
    }
}

/// A raw inbound request.
#[derive(Debug, Clone)]
pub struct TransportMessage {
    pub endpoint: Endpoint,
    pub method: String,
    /// Path below the REST URL pattern; empty for the service endpoint.
    pub path: String,
    /// Query parameters in arrival order.
    pub query: Vec<(String, String)>,
    pub content_type: Option<String>,
    pub accept: Option<String>,
    pub body: Bytes,
    pub context: RequestContext,
}

impl TransportMessage {
    pub fn new(endpoint: Endpoint, method: impl Into<String>) -> Self {
        Self {
            endpoint,
            method: method.into().to_ascii_uppercase(),
            path: String::new(),
            query: Vec::new(),
            content_type: None,
            accept: None,
            body: Bytes::new(),
            context: RequestContext::default(),
        }
    }

    /// KVP GET on the service endpoint.
    pub fn kvp<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(Endpoint::Service, "GET").with_query(pairs)
    }

    /// POST on the service endpoint.
    pub fn post(content_type: &str, body: impl Into<Bytes>) -> Self {
        Self::new(Endpoint::Service, "POST").with_body(content_type, body)
    }

    /// Call on the REST endpoint.
    pub fn rest(method: &str, path: &str) -> Self {
        let mut message = Self::new(Endpoint::Rest, method);
        message.path = path.to_string();
        message
    }

    pub fn with_query<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query = pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    pub fn with_body(mut self, content_type: &str, body: impl Into<Bytes>) -> Self {
        self.content_type = Some(content_type.to_string());
        self.body = body.into();
        self
    }

    pub fn with_accept(mut self, accept: &str) -> Self {
        self.accept = Some(accept.to_string());
        self
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    /// Content type without parameters, lower-cased.
    pub fn content_type_essence(&self) -> Option<String> {
        self.content_type.as_deref().map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }
}

/// The pipeline's answer.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub status: u16,
    pub media_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl OutboundMessage {
    pub fn new(status: u16, media_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            media_type: Some(media_type.into()),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body as text, for logging and tests.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assumed_binding() {
        assert_eq!(Binding::assumed(&TransportMessage::kvp([("a", "b")])), Binding::Kvp);
        assert_eq!(
            Binding::assumed(&TransportMessage::post("application/json; charset=utf-8", "{}")),
            Binding::Json
        );
        assert_eq!(
            Binding::assumed(&TransportMessage::post("application/soap+xml", "")),
            Binding::Soap(SoapVersion::V12)
        );
        assert_eq!(Binding::assumed(&TransportMessage::post("TEXT/XML", "")), Binding::Pox);
        assert_eq!(Binding::assumed(&TransportMessage::rest("post", "sensors")), Binding::Rest);
    }

    #[test]
    fn test_content_type_essence() {
        let message = TransportMessage::post("Application/XML; charset=UTF-8", "");
        assert_eq!(message.content_type_essence().as_deref(), Some("application/xml"));
    }
}
