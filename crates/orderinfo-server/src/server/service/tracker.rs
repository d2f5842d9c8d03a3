//! In-flight call accounting and coordinated shutdown.
//!
//! Every streaming call holds a [`StreamGuard`] for as long as its handling
//! task runs. Shutdown first refuses new calls, then waits for the guards to
//! drain, and finally cancels whatever is still running through the shared
//! [`CancellationToken`].

use crate::server::telemetry::{
    decrement_streams_inflight, increment_streams_inflight, record_stream_duration,
};
use core::time::Duration;
use orderinfo_core::{Error, Result};
use portable_atomic::{AtomicBool, AtomicUsize, Ordering};
use std::{sync::Arc, time::Instant};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct StreamTracker {
    inflight: AtomicUsize,
    shutting_down: AtomicBool,
    shutdown_token: CancellationToken,
    shutdown_timeout: Duration,
}

impl StreamTracker {
    pub fn new(shutdown_timeout: Duration) -> Self {
        Self {
            inflight: AtomicUsize::new(0),
            shutting_down: AtomicBool::new(false),
            shutdown_token: CancellationToken::new(),
            shutdown_timeout,
        }
    }

    /// Fails once shutdown has started.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] if the service is shutting down.
    pub fn ensure_accepting(&self) -> Result<()> {
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(Error::ServiceShutdown);
        }
        Ok(())
    }

    /// Registers a new streaming call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] if the service is shutting down.
    pub fn begin(self: &Arc<Self>) -> Result<StreamGuard> {
        self.ensure_accepting()?;
        self.inflight.fetch_add(1, Ordering::AcqRel);
        increment_streams_inflight();
        Ok(StreamGuard {
            tracker: Arc::clone(self),
            started: Instant::now(),
        })
    }

    /// Token that fires when in-flight calls must stop.
    pub fn token(&self) -> CancellationToken {
        self.shutdown_token.child_token()
    }

    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Acquire)
    }

    /// Gracefully drains in-flight streams.
    ///
    /// - Refuses new calls.
    /// - Waits up to the configured timeout for running streams to finish.
    /// - Cancels the shared token so the rest unwind, dropping any
    ///   unflushed accumulation.
    pub async fn shutdown(&self) {
        // === Phase 0: Stop accepting new requests ===
        tracing::info!("Refusing new requests");
        self.shutting_down.store(true, Ordering::Release);

        // === Phase 1: Wait for in-flight streams to drain ===
        tracing::info!("Draining in-flight streams ({} active)", self.inflight());
        let drain_result = timeout(self.shutdown_timeout, async {
            while self.inflight() > 0 {
                sleep(Duration::from_millis(100)).await;
            }
        })
        .await;

        match drain_result {
            Ok(()) => tracing::debug!("All in-flight streams drained successfully"),
            Err(_) => tracing::warn!(
                "Graceful drain timed out ({} streams still active)",
                self.inflight()
            ),
        }

        // === Phase 2: Cancel any remaining work ===
        tracing::debug!("Cancelling remaining work via shutdown token");
        self.shutdown_token.cancel();
    }
}

/// Keeps a streaming call counted as in flight until dropped.
#[derive(Debug)]
pub struct StreamGuard {
    tracker: Arc<StreamTracker>,
    started: Instant,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.tracker.inflight.fetch_sub(1, Ordering::AcqRel);
        decrement_streams_inflight();
        record_stream_duration(self.started.elapsed().as_secs_f64() * 1000.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_track_inflight_calls() {
        let tracker = Arc::new(StreamTracker::new(Duration::from_secs(1)));
        let a = tracker.begin().unwrap();
        let b = tracker.begin().unwrap();
        assert_eq!(tracker.inflight(), 2);

        drop(a);
        assert_eq!(tracker.inflight(), 1);
        drop(b);
        assert_eq!(tracker.inflight(), 0);
    }

    #[tokio::test]
    async fn shutdown_refuses_new_calls_and_cancels_stragglers() {
        let tracker = Arc::new(StreamTracker::new(Duration::from_millis(200)));
        let token = tracker.token();
        let straggler = tracker.begin().unwrap();

        tracker.shutdown().await;

        assert!(token.is_cancelled());
        assert!(matches!(tracker.begin(), Err(Error::ServiceShutdown)));
        assert!(matches!(tracker.ensure_accepting(), Err(Error::ServiceShutdown)));
        drop(straggler);
        assert_eq!(tracker.inflight(), 0);
    }

    #[tokio::test]
    async fn shutdown_waits_for_streams_to_finish() {
        let tracker = Arc::new(StreamTracker::new(Duration::from_secs(5)));
        let guard = tracker.begin().unwrap();
        let token = tracker.token();

        let finisher = tokio::spawn(async move {
            sleep(Duration::from_millis(150)).await;
            drop(guard);
        });

        tracker.shutdown().await;
        finisher.await.unwrap();
        assert_eq!(tracker.inflight(), 0);
        assert!(token.is_cancelled());
    }
}
