//! Error types for the order management service.
//!
//! This module defines the central `Error` enum, which captures every
//! reportable failure of the product catalog, order query, order ingest and
//! shipment batching calls. It implements `From<Error>` for `tonic::Status` so
//! each failure reaches the caller with a distinct, stable status code.
//!
//! ## Error Cases
//! - `NotFound`: A lookup referenced an identifier that is not stored.
//! - `IdGeneration`: The identifier generator failed (via `ferroid`).
//! - `ChannelError`: A response could not be handed to the transport.
//! - `InvalidRequest`: The request was malformed.
//! - `RequestCancelled`: The caller aborted the call or its deadline expired.
//! - `ServiceShutdown`: A call arrived while the service was shutting down.
//! - `Stream`: The inbound stream failed; the status is passed through as-is.

use core::fmt;
use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// The kind of record a lookup was looking for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordKind {
    Product,
    Order,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Product => f.write_str("Product"),
            Self::Order => f.write_str("Order"),
        }
    }
}

/// Unified error type for the order management service.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// No record is stored under the requested identifier.
    #[error("{kind} {id} does not exist")]
    NotFound { kind: RecordKind, id: String },

    /// Underlying ULID generation failed.
    #[error("ID error: {0:?}")]
    IdGeneration(#[from] ferroid::generator::Error),

    /// Internal channel send failure (the response stream was closed).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// The client request was invalid.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The client aborted the request.
    #[error("Request cancelled by client")]
    RequestCancelled,

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,

    /// Receiving from the client stream failed.
    #[error("Stream error: {0}")]
    Stream(Status),
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound { kind, id } => Status::not_found(format!("{kind} {id} does not exist")),
            Error::IdGeneration(e) => Status::internal(format!("ID generation error: {e:?}")),
            Error::ChannelError { context } => {
                Status::internal(format!("error sending message to stream: {context}"))
            }
            Error::InvalidRequest { reason } => Status::invalid_argument(reason),
            Error::RequestCancelled => Status::cancelled("Request was cancelled"),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
            Error::Stream(status) => status,
        }
    }
}
