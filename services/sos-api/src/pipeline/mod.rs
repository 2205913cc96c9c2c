//! Request processing pipeline.
//!
//! A [`TransportMessage`] goes through four stages: decode, dispatch, encode
//! and (on any failure) fault translation. [`Pipeline::process`] is total:
//! every input yields an [`OutboundMessage`].

pub mod decode;
pub mod dispatch;
pub mod encode;
pub mod fault;

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde_json::json;
use sos_common::{media_types, Fault, FaultPhrases, Operation};
use sos_protocol::soap::wrap_response;
use sos_protocol::{ResponseBody, RestDecoder, RestVocabulary};
use tracing::{debug, instrument};

pub use decode::{Decoded, Rejected};
pub use dispatch::{BatchExecutor, Dispatcher};
pub use fault::FaultTranslator;

use crate::binding::{Binding, Endpoint, OutboundMessage, TransportMessage};
use crate::metrics::{MetricsCollector, Timer};
use crate::registry::CodecRegistry;

/// Per-operation response formats used by the KVP, POX and SOAP bindings
/// when the request names none.
pub fn default_response_formats() -> HashMap<Operation, String> {
    HashMap::from([
        (Operation::GetObservation, media_types::OM_2_0.to_string()),
        (Operation::GetObservationById, media_types::OM_2_0.to_string()),
        (Operation::DescribeSensor, media_types::SENSORML_2_0.to_string()),
    ])
}

/// Settings that can change on configuration reload.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub phrases: FaultPhrases,
    pub default_formats: HashMap<Operation, String>,
    pub rest: RestVocabulary,
    /// Public base URL used in links and capabilities.
    pub base_url: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            phrases: FaultPhrases::default(),
            default_formats: default_response_formats(),
            rest: RestVocabulary::default(),
            base_url: "http://localhost:8080".to_string(),
        }
    }
}

struct Active {
    settings: PipelineSettings,
    translator: FaultTranslator,
}

impl Active {
    fn new(settings: PipelineSettings) -> Self {
        let translator = FaultTranslator::new(settings.phrases.clone());
        Self {
            settings,
            translator,
        }
    }
}

pub struct Pipeline {
    codecs: Arc<CodecRegistry>,
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<MetricsCollector>,
    active: ArcSwap<Active>,
}

impl Pipeline {
    pub fn new(
        codecs: Arc<CodecRegistry>,
        dispatcher: Arc<Dispatcher>,
        metrics: Arc<MetricsCollector>,
        settings: PipelineSettings,
    ) -> Self {
        let pipeline = Self {
            codecs,
            dispatcher,
            metrics,
            active: ArcSwap::from_pointee(Active::new(settings.clone())),
        };
        pipeline.apply_settings(settings);
        pipeline
    }

    pub fn codecs(&self) -> &Arc<CodecRegistry> {
        &self.codecs
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn settings(&self) -> PipelineSettings {
        self.active.load().settings.clone()
    }

    /// Install new settings. The REST decoder is rebuilt so that resource
    /// names and fault phrases change together.
    pub fn apply_settings(&self, settings: PipelineSettings) {
        self.dispatcher.set_phrases(settings.phrases.clone());
        self.codecs.add_decoder(Arc::new(RestDecoder::new(
            settings.rest.clone(),
            settings.phrases.clone(),
        )));
        self.active.store(Arc::new(Active::new(settings)));
        debug!("Pipeline settings applied");
    }

    #[instrument(skip(self, message), fields(method = %message.method, endpoint = ?message.endpoint))]
    pub fn process(&self, message: TransportMessage) -> OutboundMessage {
        let timer = Timer::start();
        let active = self.active.load();
        let accept = message.accept.as_deref();

        if message.endpoint == Endpoint::Rest
            && message.method == "OPTIONS"
            && message.path.trim_matches('/').is_empty()
        {
            let out = match endpoint_options(&active.settings.rest) {
                Ok(out) => out,
                Err(fault) => self.fail(&active, Binding::Rest, accept, &fault),
            };
            self.metrics.record_duration(Binding::Rest, &timer);
            return out;
        }

        let (binding, result) = match decode::decode(&self.codecs, &active.settings.phrases, &message) {
            Ok(decoded) => {
                let binding = decoded.binding;
                (binding, self.respond(&active, decoded, accept))
            }
            Err(rejected) => (rejected.binding, Err(rejected.fault)),
        };

        let out = match result {
            Ok(out) => out,
            Err(fault) => self.fail(&active, binding, accept, &fault),
        };
        self.metrics.record_duration(binding, &timer);
        out
    }

    /// Dispatch and encode a decoded request.
    fn respond(&self, active: &Active, decoded: Decoded, accept: Option<&str>) -> Result<OutboundMessage, Fault> {
        let settings = &active.settings;
        let binding = decoded.binding;
        let operation = decoded.request.operation();
        self.metrics.record_request(binding, operation);

        let requested = decoded.request.response_format().map(str::to_string);
        let format = encode::select_format(
            &self.codecs,
            settings,
            binding,
            accept,
            requested.as_deref(),
            operation,
        )?;

        let mut response = self.dispatcher.dispatch(decoded.request)?;
        if let Some(call) = &decoded.call {
            response.links = settings.rest.links_for(&settings.base_url, call, &response);
        }

        let allow = match &response.body {
            ResponseBody::Options(options) => Some(options.allow()),
            _ => None,
        };

        let mut out = encode::encode(&self.codecs, binding, &format, &response)?;
        if let Some(allow) = allow {
            out = out.with_header("Allow", allow);
        }
        match binding {
            Binding::Soap(version) => {
                let document = wrap_response(&out.text(), version, decoded.message_id.as_deref());
                Ok(OutboundMessage::new(out.status, version.media_type(), document))
            }
            _ => Ok(out),
        }
    }

    fn fail(&self, active: &Active, binding: Binding, accept: Option<&str>, fault: &Fault) -> OutboundMessage {
        let media_type = active.translator.media_type_for(
            &self.codecs,
            binding,
            accept,
            &active.settings.rest.default_format,
        );
        let out = active.translator.translate(&self.codecs, fault, &media_type);
        self.metrics.record_fault(out.status);
        out
    }

    /// Encode a fault raised outside the pipeline, e.g. by a failed worker.
    pub fn fault_response(&self, fault: &Fault, binding: Binding, accept: Option<&str>) -> OutboundMessage {
        let active = self.active.load();
        self.fail(&active, binding, accept, fault)
    }
}

/// `OPTIONS` on the bare REST endpoint: every resource with its methods.
///
/// Resources themselves answer through the `Options` operation.
fn endpoint_options(rest: &RestVocabulary) -> Result<OutboundMessage, Fault> {
    let resources: serde_json::Map<String, serde_json::Value> = rest
        .resource_methods()
        .into_iter()
        .map(|(segment, mut methods)| {
            methods.push("OPTIONS");
            (segment, json!(methods))
        })
        .collect();
    let body = serde_json::to_vec(&json!({ "resources": resources }))?;
    Ok(OutboundMessage::new(200, media_types::JSON, body).with_header("Allow", "GET, OPTIONS"))
}
