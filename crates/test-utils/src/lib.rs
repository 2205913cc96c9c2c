//! Shared test utilities for the sensor-sos workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Request documents for every binding (KVP, POX, SOAP, JSON)
//! - Builders for typed requests and stub responses
//! - Fault assertion macros
//! - Temporary configuration files
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{assert_fault, fixtures};
//! ```

pub mod builders;
pub mod fixtures;

// Re-export commonly used items at the crate root
pub use builders::*;
pub use fixtures::*;

/// Macro asserting the code (and optionally the locator) of a fault's first
/// exception.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_fault;
/// use sos_common::ExceptionCode;
///
/// assert_fault!(fault, ExceptionCode::MissingParameterValue, "service");
/// assert_fault!(fault, ExceptionCode::NoApplicableCode);
/// ```
#[macro_export]
macro_rules! assert_fault {
    ($fault:expr, $code:expr) => {{
        let fault = &$fault;
        let first = fault.first();
        if first.code != $code {
            panic!(
                "assertion failed: fault code\n  expected: `{:?}`,\n    actual: `{:?}`\n     fault: `{}`",
                $code, first.code, fault
            );
        }
    }};
    ($fault:expr, $code:expr, $locator:expr) => {{
        $crate::assert_fault!($fault, $code);
        let first = $fault.first();
        if first.locator.as_deref() != Some($locator) {
            panic!(
                "assertion failed: fault locator\n  expected: `{:?}`,\n    actual: `{:?}`",
                $locator, first.locator
            );
        }
    }};
}

/// Macro asserting that a body contains a substring, printing the body on
/// failure.
#[macro_export]
macro_rules! assert_body_contains {
    ($body:expr, $needle:expr) => {{
        let body: &str = &$body;
        if !body.contains($needle) {
            panic!(
                "assertion failed: body does not contain `{}`\n  body: {}",
                $needle, body
            );
        }
    }};
}

#[cfg(test)]
mod tests {
    use sos_common::{CodedException, ExceptionCode, Fault};

    #[test]
    fn test_assert_fault_passes() {
        let fault: Fault = CodedException::missing_parameter("service").into();
        assert_fault!(fault, ExceptionCode::MissingParameterValue);
        assert_fault!(fault, ExceptionCode::MissingParameterValue, "service");
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_fault_fails_on_locator() {
        let fault: Fault = CodedException::missing_parameter("service").into();
        assert_fault!(fault, ExceptionCode::MissingParameterValue, "version");
    }

    #[test]
    fn test_assert_body_contains() {
        assert_body_contains!(String::from("<ows:ExceptionReport/>"), "ExceptionReport");
    }
}
