//! Codec registry.
//!
//! Decoders and encoders are keyed by [`FormatKey`]; fault encoders by media
//! type. The tables are published as an immutable snapshot through
//! [`ArcSwap`]: lookups never block, and every registration builds a new
//! snapshot with read-copy-update so concurrent readers see either the old
//! or the new table in full.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use sos_common::{FaultPhrases, FormatKey, Operation};
use sos_protocol::{
    Decoder, DecoderHint, Encoder, FaultEncoder, JsonDecoder, JsonEncoder, JsonExceptionEncoder,
    KvpDecoder, OwsExceptionReportEncoder, PoxDecoder, RestDecoder, RestVocabulary,
    Soap11FaultEncoder, SoapFaultEncoder, SosXmlEncoder,
};
use tracing::debug;

#[derive(Clone, Default)]
struct CodecTable {
    decoders: HashMap<FormatKey, Arc<dyn Decoder>>,
    /// Distinct decoders in first-registration order, for compatibility lookup.
    decoder_order: Vec<Arc<dyn Decoder>>,
    encoders: HashMap<FormatKey, Arc<dyn Encoder>>,
    fault_encoders: HashMap<String, Arc<dyn FaultEncoder>>,
}

fn same_codec<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl CodecTable {
    fn insert_decoder(&mut self, key: FormatKey, decoder: Arc<dyn Decoder>) -> Option<Arc<dyn Decoder>> {
        if !self.decoder_order.iter().any(|d| same_codec(d, &decoder)) {
            self.decoder_order.push(Arc::clone(&decoder));
        }
        let previous = self.decoders.insert(key, decoder);
        if let Some(old) = &previous {
            self.forget_unreferenced(old);
        }
        previous
    }

    fn remove_decoder(&mut self, key: &FormatKey) -> Option<Arc<dyn Decoder>> {
        let removed = self.decoders.remove(key);
        if let Some(old) = &removed {
            self.forget_unreferenced(old);
        }
        removed
    }

    /// Drop a decoder from the compatibility order once no key refers to it.
    fn forget_unreferenced(&mut self, decoder: &Arc<dyn Decoder>) {
        if !self.decoders.values().any(|d| same_codec(d, decoder)) {
            self.decoder_order.retain(|d| !same_codec(d, decoder));
        }
    }
}

/// Registry of request decoders, response encoders and fault encoders.
pub struct CodecRegistry {
    table: ArcSwap<CodecTable>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            table: ArcSwap::from_pointee(CodecTable::default()),
        }
    }

    /// A registry holding every codec of the KVP, POX, SOAP, JSON and REST
    /// bindings.
    pub fn with_defaults(vocabulary: RestVocabulary, phrases: FaultPhrases) -> Self {
        let registry = Self::new();
        registry.add_decoder(Arc::new(KvpDecoder::new()));
        registry.add_decoder(Arc::new(PoxDecoder::new()));
        registry.add_decoder(Arc::new(JsonDecoder::new()));
        registry.add_decoder(Arc::new(RestDecoder::new(vocabulary, phrases)));
        registry.add_encoder(Arc::new(SosXmlEncoder::new()));
        registry.add_encoder(Arc::new(JsonEncoder::new()));
        registry.add_fault_encoder(Arc::new(OwsExceptionReportEncoder));
        registry.add_fault_encoder(Arc::new(SoapFaultEncoder));
        registry.add_fault_encoder(Arc::new(Soap11FaultEncoder));
        registry.add_fault_encoder(Arc::new(JsonExceptionEncoder));
        registry
    }

    pub fn register_decoder(&self, key: FormatKey, decoder: Arc<dyn Decoder>) {
        let name = decoder.name();
        let mut replaced = None;
        self.table.rcu(|current| {
            let mut next = CodecTable::clone(current);
            replaced = next
                .insert_decoder(key.clone(), Arc::clone(&decoder))
                .map(|old| old.name());
            next
        });
        if let Some(old) = replaced {
            debug!(key = %key, old = old, new = name, "Replaced decoder");
        }
    }

    /// Register a decoder under every key it declares.
    pub fn add_decoder(&self, decoder: Arc<dyn Decoder>) {
        for key in decoder.keys() {
            self.register_decoder(key, Arc::clone(&decoder));
        }
    }

    pub fn unregister_decoder(&self, key: &FormatKey) -> bool {
        let mut removed = false;
        self.table.rcu(|current| {
            let mut next = CodecTable::clone(current);
            removed = next.remove_decoder(key).is_some();
            next
        });
        removed
    }

    pub fn register_encoder(&self, key: FormatKey, encoder: Arc<dyn Encoder>) {
        let name = encoder.name();
        let mut replaced = None;
        self.table.rcu(|current| {
            let mut next = CodecTable::clone(current);
            replaced = next
                .encoders
                .insert(key.clone(), Arc::clone(&encoder))
                .map(|old| old.name());
            next
        });
        if let Some(old) = replaced {
            debug!(key = %key, old = old, new = name, "Replaced encoder");
        }
    }

    /// Register an encoder under every key it declares.
    pub fn add_encoder(&self, encoder: Arc<dyn Encoder>) {
        for key in encoder.keys() {
            self.register_encoder(key, Arc::clone(&encoder));
        }
    }

    pub fn unregister_encoder(&self, key: &FormatKey) -> bool {
        let mut removed = false;
        self.table.rcu(|current| {
            let mut next = CodecTable::clone(current);
            removed = next.encoders.remove(key).is_some();
            next
        });
        removed
    }

    pub fn register_fault_encoder(&self, media_type: &str, encoder: Arc<dyn FaultEncoder>) {
        let name = encoder.name();
        let mut replaced = None;
        self.table.rcu(|current| {
            let mut next = CodecTable::clone(current);
            replaced = next
                .fault_encoders
                .insert(media_type.to_string(), Arc::clone(&encoder))
                .map(|old| old.name());
            next
        });
        if let Some(old) = replaced {
            debug!(media_type = media_type, old = old, new = name, "Replaced fault encoder");
        }
    }

    /// Register a fault encoder under every media type it writes.
    pub fn add_fault_encoder(&self, encoder: Arc<dyn FaultEncoder>) {
        for media_type in encoder.media_types() {
            self.register_fault_encoder(&media_type, Arc::clone(&encoder));
        }
    }

    /// Decoder for a hint: the exact key first, then the first decoder in
    /// registration order that accepts the hint.
    pub fn lookup_decoder(&self, hint: &DecoderHint) -> Option<Arc<dyn Decoder>> {
        let table = self.table.load();
        if let Some(decoder) = hint.key().and_then(|key| table.decoders.get(&key)) {
            return Some(Arc::clone(decoder));
        }
        table
            .decoder_order
            .iter()
            .find(|decoder| decoder.accepts(hint))
            .cloned()
    }

    /// Encoder for an exact (format, response) key.
    pub fn lookup_encoder(&self, format: &str, operation: Operation) -> Option<Arc<dyn Encoder>> {
        self.table
            .load()
            .encoders
            .get(&FormatKey::response(format, operation))
            .cloned()
    }

    pub fn has_encoder(&self, format: &str, operation: Operation) -> bool {
        self.table
            .load()
            .encoders
            .contains_key(&FormatKey::response(format, operation))
    }

    pub fn lookup_fault_encoder(&self, media_type: &str) -> Option<Arc<dyn FaultEncoder>> {
        self.table.load().fault_encoders.get(media_type).cloned()
    }

    pub fn has_fault_encoder(&self, media_type: &str) -> bool {
        self.table.load().fault_encoders.contains_key(media_type)
    }
}
