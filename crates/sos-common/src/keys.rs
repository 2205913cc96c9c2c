//! Lookup keys for codecs and operation handlers.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Operation;

/// Identifies an operation handler: (service, version, operation name).
///
/// All three parts compare case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationKey {
    pub service: String,
    pub version: String,
    pub operation: String,
}

impl OperationKey {
    pub fn new(
        service: impl Into<String>,
        version: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            version: version.into(),
            operation: operation.into(),
        }
    }

    /// Key for one of the operations this crate names.
    pub fn sos(version: &str, operation: Operation) -> Self {
        Self::new(crate::SOS, version, operation.as_str())
    }

    /// Parse the `service/version/operation` form used in configuration files.
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.split('/');
        let service = parts.next()?.trim();
        let version = parts.next()?.trim();
        let operation = parts.next()?.trim();
        if parts.next().is_some()
            || service.is_empty()
            || version.is_empty()
            || operation.is_empty()
        {
            return None;
        }
        Some(Self::new(service, version, operation))
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.service, self.version, self.operation)
    }
}

/// What a codec reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "operation", rename_all = "camelCase")]
pub enum PayloadKind {
    Request(Operation),
    Response(Operation),
    Exception,
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadKind::Request(op) => write!(f, "{}Request", op),
            PayloadKind::Response(op) => write!(f, "{}Response", op),
            PayloadKind::Exception => f.write_str("ExceptionReport"),
        }
    }
}

/// Identifies a codec: a format identifier (namespace URI or media type)
/// paired with the payload kind it handles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormatKey {
    pub format: String,
    pub kind: PayloadKind,
}

impl FormatKey {
    pub fn new(format: impl Into<String>, kind: PayloadKind) -> Self {
        Self {
            format: format.into(),
            kind,
        }
    }

    pub fn request(format: impl Into<String>, operation: Operation) -> Self {
        Self::new(format, PayloadKind::Request(operation))
    }

    pub fn response(format: impl Into<String>, operation: Operation) -> Self {
        Self::new(format, PayloadKind::Response(operation))
    }
}

impl fmt::Display for FormatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.kind, self.format)
    }
}

/// Compare dotted version strings numerically, component by component.
///
/// Non-numeric components compare as strings; missing trailing components
/// count as zero, so `2.0` equals `2.0.0`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left: Vec<&str> = a.split('.').collect();
    let right: Vec<&str> = b.split('.').collect();
    let len = left.len().max(right.len());

    for i in 0..len {
        let l = left.get(i).copied().unwrap_or("0");
        let r = right.get(i).copied().unwrap_or("0");
        let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
            (Ok(l), Ok(r)) => l.cmp(&r),
            _ => l.cmp(r),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
