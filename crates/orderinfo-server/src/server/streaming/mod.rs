//! Per-call stream handling.
//!
//! - [`inbound`] - Tagged reads over a client stream (item, end, or failure).
//! - [`search`] - Server-streamed order search.
//! - [`ingest`] - Client-streamed order ingest.
//! - [`batch`] - Combined-shipment accumulation for one stream.
//! - [`processor`] - Bidirectional shipment batching loop.
//! - [`outbound`] - Cancellable sends onto a response stream.

pub mod batch;
pub mod inbound;
pub mod ingest;
pub mod outbound;
pub mod processor;
pub mod search;
