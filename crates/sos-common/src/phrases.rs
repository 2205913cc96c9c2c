//! Configurable message fragments used to build and classify faults.
//!
//! Faults raised by this crate carry a [`FaultHint`](crate::FaultHint), but
//! handlers written elsewhere may only set a message. The fault translator
//! falls back to these phrases for such faults, so the same values must be
//! used when raising and when classifying.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised by [`FaultPhrases::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhraseError {
    #[error("fault phrase '{0}' must not be empty")]
    Empty(&'static str),

    #[error("fault phrases '{0}' and '{1}' overlap")]
    Overlap(&'static str, &'static str),
}

fn default_operation_not_supported_start() -> String {
    "The requested operation '".to_string()
}

fn default_operation_not_supported_end() -> String {
    "' is not supported by this service".to_string()
}

fn default_method_not_allowed_for_resource_type() -> String {
    "is not allowed for the resource type".to_string()
}

fn default_wrong_content_type() -> String {
    "The requested content type is not supported".to_string()
}

fn default_wrong_content_type_in_accept() -> String {
    "None of the media types in the Accept header are supported".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultPhrases {
    #[serde(default = "default_operation_not_supported_start")]
    pub operation_not_supported_start: String,

    #[serde(default = "default_operation_not_supported_end")]
    pub operation_not_supported_end: String,

    #[serde(default = "default_method_not_allowed_for_resource_type")]
    pub method_not_allowed_for_resource_type: String,

    #[serde(default = "default_wrong_content_type")]
    pub wrong_content_type: String,

    #[serde(default = "default_wrong_content_type_in_accept")]
    pub wrong_content_type_in_accept: String,
}

impl Default for FaultPhrases {
    fn default() -> Self {
        Self {
            operation_not_supported_start: default_operation_not_supported_start(),
            operation_not_supported_end: default_operation_not_supported_end(),
            method_not_allowed_for_resource_type: default_method_not_allowed_for_resource_type(),
            wrong_content_type: default_wrong_content_type(),
            wrong_content_type_in_accept: default_wrong_content_type_in_accept(),
        }
    }
}

impl FaultPhrases {
    /// Message for a registered but disabled operation.
    pub fn operation_not_supported(&self, operation: &str) -> String {
        format!(
            "{}{}{}",
            self.operation_not_supported_start, operation, self.operation_not_supported_end
        )
    }

    /// Message for a REST resource addressed with an unmapped method.
    pub fn method_not_allowed(&self, method: &str, resource_type: &str) -> String {
        format!(
            "HTTP method '{}' {} '{}'",
            method, self.method_not_allowed_for_resource_type, resource_type
        )
    }

    /// Message for an unsupported request content type.
    pub fn unsupported_content_type(&self, content_type: &str) -> String {
        format!("{}: '{}'", self.wrong_content_type, content_type)
    }

    /// Message for an Accept header with no producible media type.
    pub fn unsupported_accept(&self, accept: &str) -> String {
        format!("{}: '{}'", self.wrong_content_type_in_accept, accept)
    }

    /// Check that no phrase contains another one.
    ///
    /// Overlapping phrases would let one fault match two translator rules.
    pub fn validate(&self) -> Result<(), PhraseError> {
        let phrases: [(&'static str, &String); 5] = [
            ("operation_not_supported_start", &self.operation_not_supported_start),
            ("operation_not_supported_end", &self.operation_not_supported_end),
            (
                "method_not_allowed_for_resource_type",
                &self.method_not_allowed_for_resource_type,
            ),
            ("wrong_content_type", &self.wrong_content_type),
            ("wrong_content_type_in_accept", &self.wrong_content_type_in_accept),
        ];

        if let Some((name, _)) = phrases.iter().find(|(_, phrase)| phrase.trim().is_empty()) {
            return Err(PhraseError::Empty(*name));
        }

        for (i, (a_name, a)) in phrases.iter().enumerate() {
            for (b_name, b) in phrases.iter().skip(i + 1) {
                if a.contains(b.as_str()) || b.contains(a.as_str()) {
                    return Err(PhraseError::Overlap(*a_name, *b_name));
                }
            }
        }
        Ok(())
    }
}
