//! Fault types for SOS operations.
//!
//! A [`Fault`] is an ordered, never-empty list of [`CodedException`]s. Each
//! exception carries an OWS exception code and, optionally, the parameter it
//! refers to, a message, the lower-level cause and a [`FaultHint`] that tells
//! the transport layer which HTTP status applies.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using Fault.
pub type SosResult<T> = Result<T, Fault>;

/// OWS exception codes reported by this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExceptionCode {
    MissingParameterValue,
    InvalidParameterValue,
    VersionNegotiationFailed,
    OperationNotSupported,
    NoApplicableCode,
}

impl ExceptionCode {
    /// Get the OWS exception code string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExceptionCode::MissingParameterValue => "MissingParameterValue",
            ExceptionCode::InvalidParameterValue => "InvalidParameterValue",
            ExceptionCode::VersionNegotiationFailed => "VersionNegotiationFailed",
            ExceptionCode::OperationNotSupported => "OperationNotSupported",
            ExceptionCode::NoApplicableCode => "NoApplicableCode",
        }
    }

    /// Parse an exception code from its OWS name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "MissingParameterValue" => Some(ExceptionCode::MissingParameterValue),
            "InvalidParameterValue" => Some(ExceptionCode::InvalidParameterValue),
            "VersionNegotiationFailed" => Some(ExceptionCode::VersionNegotiationFailed),
            "OperationNotSupported" => Some(ExceptionCode::OperationNotSupported),
            "NoApplicableCode" => Some(ExceptionCode::NoApplicableCode),
            _ => None,
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-code attached by whoever raises an exception, used to pick the HTTP
/// status without inspecting the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FaultHint {
    /// The operation is registered but switched off.
    OperationDisabled,
    /// The HTTP method is not allowed for the addressed resource.
    MethodNotAllowed,
    /// The request could not be parsed.
    BadRequest,
    /// The request body has a content type no decoder handles.
    UnsupportedMediaType,
    /// None of the media types in the Accept header can be produced.
    NotAcceptable,
    /// The addressed resource type does not exist.
    ResourceNotFound,
}

/// A single coded exception.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodedException {
    pub code: ExceptionCode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<FaultHint>,

    #[serde(skip)]
    pub cause: Option<Arc<dyn StdError + Send + Sync>>,
}

impl CodedException {
    pub fn new(code: ExceptionCode) -> Self {
        Self {
            code,
            locator: None,
            message: None,
            hint: None,
            cause: None,
        }
    }

    pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
        self.locator = Some(locator.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: FaultHint) -> Self {
        self.hint = Some(hint);
        self
    }

    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// A required parameter is absent or empty.
    pub fn missing_parameter(locator: impl Into<String>) -> Self {
        let locator = locator.into();
        let message = format!("The value for the mandatory parameter '{}' is missing", locator);
        Self::new(ExceptionCode::MissingParameterValue)
            .with_locator(locator)
            .with_message(message)
    }

    /// A parameter is present but its value is not acceptable.
    pub fn invalid_parameter(locator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ExceptionCode::InvalidParameterValue)
            .with_locator(locator)
            .with_message(message)
    }

    /// Catch-all for decoding, encoding and configuration failures.
    pub fn no_applicable_code(message: impl Into<String>) -> Self {
        Self::new(ExceptionCode::NoApplicableCode).with_message(message)
    }

    pub fn version_negotiation_failed(locator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ExceptionCode::VersionNegotiationFailed)
            .with_locator(locator)
            .with_message(message)
    }

    pub fn operation_not_supported(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ExceptionCode::OperationNotSupported)
            .with_locator(operation)
            .with_message(message)
    }

    /// Message text, or the exception code when no message was given.
    pub fn text(&self) -> &str {
        self.message.as_deref().unwrap_or(self.code.as_str())
    }
}

impl PartialEq for CodedException {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
            && self.locator == other.locator
            && self.message == other.message
            && self.hint == other.hint
    }
}

impl fmt::Display for CodedException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)?;
        if let Some(locator) = &self.locator {
            write!(f, " [{}]", locator)?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

impl StdError for CodedException {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

/// A structured failure: one or more coded exceptions, in the order raised.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{}", summarize(.exceptions))]
pub struct Fault {
    exceptions: Vec<CodedException>,
}

fn summarize(exceptions: &[CodedException]) -> String {
    exceptions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Fault {
    pub fn new(first: CodedException) -> Self {
        Self {
            exceptions: vec![first],
        }
    }

    /// Build a fault from a list of exceptions; `None` when the list is empty.
    pub fn from_exceptions(exceptions: Vec<CodedException>) -> Option<Self> {
        if exceptions.is_empty() {
            None
        } else {
            Some(Self { exceptions })
        }
    }

    pub fn push(&mut self, exception: CodedException) {
        self.exceptions.push(exception);
    }

    pub fn with(mut self, exception: CodedException) -> Self {
        self.push(exception);
        self
    }

    pub fn first(&self) -> &CodedException {
        &self.exceptions[0]
    }

    pub fn exceptions(&self) -> &[CodedException] {
        &self.exceptions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CodedException> {
        self.exceptions.iter()
    }

    pub fn len(&self) -> usize {
        self.exceptions.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether any exception carries the given code.
    pub fn has_code(&self, code: ExceptionCode) -> bool {
        self.exceptions.iter().any(|e| e.code == code)
    }
}

impl From<CodedException> for Fault {
    fn from(exception: CodedException) -> Self {
        Fault::new(exception)
    }
}

// Conversion from common error types

impl From<std::io::Error> for Fault {
    fn from(err: std::io::Error) -> Self {
        let message = format!("I/O error: {}", err);
        CodedException::no_applicable_code(message)
            .with_cause(err)
            .into()
    }
}

impl From<serde_json::Error> for Fault {
    fn from(err: serde_json::Error) -> Self {
        let message = format!("JSON error: {}", err);
        let exception = CodedException::no_applicable_code(message);
        let exception = if err.is_syntax() || err.is_eof() || err.is_data() {
            exception.with_hint(FaultHint::BadRequest)
        } else {
            exception
        };
        exception.with_cause(err).into()
    }
}

impl From<quick_xml::Error> for Fault {
    fn from(err: quick_xml::Error) -> Self {
        let message = format!("XML error: {}", err);
        CodedException::no_applicable_code(message)
            .with_hint(FaultHint::BadRequest)
            .with_cause(err)
            .into()
    }
}
