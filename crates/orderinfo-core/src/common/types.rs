//! # Common Identifier Types and Constants
//!
//! Every record the service creates (products, orders, combined shipments) is
//! keyed by a ULID rendered as a 26 character Crockford base32 string. This
//! module pins the concrete ID layout, clock and generator so the server and
//! any client agree on the format.
//!
//! ## Type Aliases
//!
//! - [`RecordId`] - The ULID type backing every server-assigned identifier
//! - [`Clock`] - The monotonic clock used for timestamp embedding
//! - [`Rng`] - Randomness source for the ULID random component
//! - [`Generator`] - The thread-safe generator shared by all calls
//!
//! ## Constants
//!
//! - [`EPOCH`] - Epoch offset used for timestamp generation
//! - [`DEFAULT_BATCH_SIZE`] - Default shipment batching threshold

use ferroid::{generator::LockMonoUlidGenerator, id::ULID, rand::ThreadRandom, time::MonotonicClock};

/// The ULID type used for every server-assigned identifier.
pub type RecordId = ULID;

/// The system clock used by the generator for timestamp encoding.
pub type Clock = MonotonicClock;

/// Random source for the 80-bit random component.
pub type Rng = ThreadRandom;

/// The epoch ULID timestamps are measured from (the Unix epoch), so encoded
/// identifiers stay comparable with ULIDs minted elsewhere.
pub const EPOCH: core::time::Duration = core::time::Duration::ZERO;

/// The generator shared by all calls.
///
/// Lock based so a single instance can be used from many tasks at once, and
/// monotonic so identifiers minted in the same millisecond still sort in
/// creation order.
pub type Generator = LockMonoUlidGenerator<RecordId, Clock, Rng>;

/// Number of order identifiers accumulated before a combined shipment is
/// flushed.
pub const DEFAULT_BATCH_SIZE: usize = 3;
