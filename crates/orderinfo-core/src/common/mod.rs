//! Shared contract used by both the server and client binaries.
//!
//! - [`error`] - Service error type and its mapping onto gRPC status codes.
//! - [`types`] - Identifier type aliases and service-wide constants.
//! - [`proto`] - Generated protobuf messages, service traits and clients.

pub mod error;
pub mod types;

pub use error::{Error, Result};

/// gRPC service and message definitions generated from
/// `proto/orderinfo.proto`.
pub mod proto {
    tonic::include_proto!("orderinfo");

    /// Encoded descriptor set consumed by the reflection service.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("orderinfo_descriptor");
}
