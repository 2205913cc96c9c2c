//! OGC Sensor Observation Service API.
//!
//! Codec registries, operation dispatch and the request pipeline behind the
//! HTTP endpoints. The library is exposed for integration testing.

pub mod backend;
pub mod binding;
pub mod config;
pub mod content_negotiation;
pub mod handlers;
pub mod metrics;
pub mod operation_table;
pub mod pipeline;
pub mod registry;
pub mod routes;
pub mod state;

pub use binding::{Binding, Endpoint, OutboundMessage, TransportMessage};
pub use config::SosConfig;
pub use pipeline::Pipeline;
pub use state::AppState;
