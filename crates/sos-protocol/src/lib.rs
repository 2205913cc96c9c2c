//! OGC Sensor Observation Service protocol implementation.
//!
//! Supports:
//! - SOS 2.0.0 (all operations) and SOS 1.0.0 (core operations)
//! - KVP, POX, SOAP 1.1/1.2, JSON and REST bindings
//! - OWS ExceptionReport, SOAP Fault and JSON exception documents

pub mod codec;
pub mod encoders;
pub mod exceptions;
pub mod json;
pub mod kvp;
pub mod observation;
pub mod pox;
pub mod requests;
pub mod responses;
pub mod rest;
pub mod soap;
pub mod xml;

pub use codec::{Decoder, DecoderHint, Encoder, FaultEncoder, KvpParams, Payload};
pub use encoders::SosXmlEncoder;
pub use exceptions::{JsonExceptionEncoder, OwsExceptionReportEncoder, FALLBACK_EXCEPTION_REPORT};
pub use json::{JsonDecoder, JsonEncoder};
pub use kvp::KvpDecoder;
pub use observation::{Feature, Observation, ObservationValue, Point, TemporalFilter};
pub use pox::PoxDecoder;
pub use requests::{Extension, Extensions, Request, RequestBody, RequestContext};
pub use responses::{Response, ResponseBody};
pub use rest::{Link, RestCall, RestDecoder, RestVocabulary};
pub use soap::{Soap11FaultEncoder, SoapEnvelope, SoapFaultEncoder, SoapVersion};
pub use xml::XmlElement;
