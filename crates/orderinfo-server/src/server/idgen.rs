//! Server-side identifier assignment.
//!
//! [`IdGenerator`] wraps a single lock-based monotonic ULID generator shared by
//! every call. Identifiers are handed out as Crockford base32 strings.

use orderinfo_core::{
    Error, Result,
    ferroid::generator::IdGenStatus,
    types::{Clock, EPOCH, Generator, Rng},
};

/// Produces unique record identifiers.
pub struct IdGenerator {
    generator: Generator,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self {
            generator: Generator::new(Clock::with_epoch(EPOCH), Rng::default()),
        }
    }

    /// Returns the next identifier.
    ///
    /// When the generator is throttled (random component exhausted within the
    /// current millisecond, or the clock stepped backwards) the task yields to
    /// the scheduler and retries. Nothing is retried on error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IdGeneration`] if the generator's lock is poisoned.
    pub async fn next_id(&self) -> Result<String> {
        loop {
            match self.generator.try_next_id() {
                Ok(IdGenStatus::Ready { id }) => return Ok(id.to_string()),
                Ok(IdGenStatus::Pending { .. }) => {
                    // Yield to the scheduler to avoid busy looping.
                    tokio::task::yield_now().await;
                }
                Err(e) => {
                    tracing::error!("Identifier generation failed: {e:?}");
                    return Err(Error::IdGeneration(e));
                }
            }
        }
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IdGenerator").finish_non_exhaustive()
    }
}
