//! Server internals for the `orderinfo-server` binary.
//!
//! - [`config`] - CLI/environment configuration.
//! - [`store`] - In-memory record store.
//! - [`idgen`] - Server-side identifier generation.
//! - [`service`] - gRPC service implementations and shutdown tracking.
//! - [`streaming`] - Per-call stream processing.
//! - [`telemetry`] - Logging, tracing and metrics setup.

pub mod config;
pub mod idgen;
pub mod service;
pub mod store;
pub mod streaming;
pub mod telemetry;
