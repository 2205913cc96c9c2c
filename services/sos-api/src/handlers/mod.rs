//! HTTP request handlers for the SOS API.
//!
//! - `service`: the operation endpoint (KVP, POX, SOAP, JSON)
//! - `rest`: the REST resource tree
//! - `admin`: operation toggles, config reload and stats
//! - `health`: health, readiness and Prometheus metrics
//! - `common`: shared helpers

pub mod admin;
pub mod common;
pub mod health;
pub mod rest;
pub mod service;

pub use admin::{
    list_operations_handler, reload_config_handler, stats_handler, toggle_operation_handler,
};
pub use health::{health_handler, metrics_handler, ready_handler};
pub use rest::rest_handler;
pub use service::service_handler;
