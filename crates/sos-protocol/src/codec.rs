//! Codec traits and the payload shapes decoders consume.

use bytes::Bytes;
use sos_common::{Fault, FormatKey, Operation};

use crate::requests::Request;
use crate::responses::Response;
use crate::rest::RestCall;
use crate::xml::XmlElement;

/// Query parameters of a KVP request.
///
/// Names are matched case-insensitively; values are kept verbatim. When a
/// name occurs more than once, the first occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KvpParams {
    params: Vec<(String, String)>,
}

impl KvpParams {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut params: Vec<(String, String)> = Vec::new();
        for (key, value) in pairs {
            let key = key.into();
            if !params.iter().any(|(k, _)| k.eq_ignore_ascii_case(&key)) {
                params.push((key, value.into()));
            }
        }
        Self { params }
    }

    /// Raw value, including empty strings.
    pub fn get_raw(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Trimmed value; empty values count as absent.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_raw(name)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Comma-separated list value, empty entries dropped.
    pub fn get_list(&self, name: &str) -> Vec<String> {
        self.get(name)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get_raw(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Input handed to a decoder.
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    Kvp(&'a KvpParams),
    Xml(&'a XmlElement),
    Json(&'a serde_json::Value),
    Rest(&'a RestCall),
}

/// What the decoding stage knows about an incoming payload before a decoder
/// is chosen: its format (namespace URI or media type) and, when visible,
/// the operation name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderHint {
    pub format: String,
    pub operation: Option<String>,
}

impl DecoderHint {
    pub fn new(format: impl Into<String>, operation: Option<String>) -> Self {
        Self {
            format: format.into(),
            operation,
        }
    }

    /// Exact lookup key, when the operation name is a known operation.
    pub fn key(&self) -> Option<FormatKey> {
        let operation: Operation = self.operation.as_deref()?.parse().ok()?;
        Some(FormatKey::request(self.format.clone(), operation))
    }
}

impl std::fmt::Display for DecoderHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.operation {
            Some(op) => write!(f, "{} [{}]", op, self.format),
            None => write!(f, "[{}]", self.format),
        }
    }
}

/// Turns a transport payload into a typed request.
pub trait Decoder: Send + Sync {
    fn name(&self) -> &'static str;

    /// Keys this decoder is registered under.
    fn keys(&self) -> Vec<FormatKey>;

    /// Compatibility check used when no decoder matches the hint exactly.
    fn accepts(&self, _hint: &DecoderHint) -> bool {
        false
    }

    /// `Ok(None)` means the decoder produced nothing without raising a fault.
    fn decode(&self, payload: &Payload<'_>) -> Result<Option<Request>, Fault>;
}

/// Turns a typed response into bytes.
pub trait Encoder: Send + Sync {
    fn name(&self) -> &'static str;

    fn keys(&self) -> Vec<FormatKey>;

    /// Media type of the output when encoding for `format`.
    fn media_type(&self, format: &str) -> String;

    /// `Ok(None)` means the encoder produced nothing without raising a fault.
    fn encode(&self, response: &Response, format: &str) -> Result<Option<Bytes>, Fault>;
}

/// Writes a fault document.
pub trait FaultEncoder: Send + Sync {
    fn name(&self) -> &'static str;

    /// Media types this encoder is registered under.
    fn media_types(&self) -> Vec<String>;

    fn media_type(&self, requested: &str) -> String {
        requested.to_string()
    }

    fn encode(&self, fault: &Fault, status: u16) -> Result<Bytes, Fault>;
}
