//! Common types shared across the SOS protocol and service crates.

pub mod error;
pub mod keys;
pub mod operation;
pub mod phrases;

pub use error::{CodedException, ExceptionCode, Fault, FaultHint, SosResult};
pub use keys::{compare_versions, FormatKey, OperationKey, PayloadKind};
pub use operation::{Operation, UnknownOperation};
pub use phrases::{FaultPhrases, PhraseError};

/// Service type identifier of the Sensor Observation Service.
pub const SOS: &str = "SOS";

/// Protocol versions served by this implementation.
pub mod versions {
    pub const V1_0_0: &str = "1.0.0";
    pub const V2_0_0: &str = "2.0.0";
}

/// XML namespaces used to select request decoders and to write responses.
pub mod namespaces {
    pub const SOS_1_0: &str = "http://www.opengis.net/sos/1.0";
    pub const SOS_2_0: &str = "http://www.opengis.net/sos/2.0";
    pub const SWES_2_0: &str = "http://www.opengis.net/swes/2.0";
    pub const OWS_1_1: &str = "http://www.opengis.net/ows/1.1";
    pub const OM_2_0: &str = "http://www.opengis.net/om/2.0";
    pub const GML_3_2: &str = "http://www.opengis.net/gml/3.2";
    pub const FES_2_0: &str = "http://www.opengis.net/fes/2.0";
    pub const SAMS_2_0: &str = "http://www.opengis.net/samplingSpatial/2.0";
    pub const SENSORML_2_0: &str = "http://www.opengis.net/sensorml/2.0";
    pub const SENSORML_1_0_1: &str = "http://www.opengis.net/sensorML/1.0.1";
    pub const XLINK: &str = "http://www.w3.org/1999/xlink";
    pub const XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
    pub const SOAP_1_1: &str = "http://schemas.xmlsoap.org/soap/envelope/";
    pub const SOAP_1_2: &str = "http://www.w3.org/2003/05/soap-envelope";
    pub const WSA: &str = "http://www.w3.org/2005/08/addressing";
}

/// Media types and format identifiers.
pub mod media_types {
    /// Marker format for requests that arrive as URL query parameters.
    pub const KVP: &str = "application/x-kvp";
    /// Marker format for requests that arrive through the REST binding.
    pub const REST: &str = "application/x-sos-rest";
    pub const XML: &str = "application/xml";
    pub const TEXT_XML: &str = "text/xml";
    pub const JSON: &str = "application/json";
    pub const SOAP: &str = "application/soap+xml";
    /// Marker key for SOAP 1.1 faults, which go out as `text/xml`.
    pub const SOAP_1_1_FAULT: &str = "application/x-soap11-fault";
    /// O&M 2.0 observation encoding (default GetObservation response format).
    pub const OM_2_0: &str = "http://www.opengis.net/om/2.0";
    /// SensorML 2.0 procedure description format.
    pub const SENSORML_2_0: &str = "http://www.opengis.net/sensorml/2.0";
    /// SensorML 1.0.1 procedure description format.
    pub const SENSORML_1_0_1: &str = "http://www.opengis.net/sensorML/1.0.1";
}
