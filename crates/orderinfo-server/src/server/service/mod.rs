//! gRPC service implementations.
//!
//! - [`catalog`] - `ProductInfo`: unary product add/get.
//! - [`orders`] - `OrderManager`: order add/get, search (server streaming),
//!   update (client streaming) and shipment batching (bidirectional).
//! - [`tracker`] - In-flight stream accounting and graceful shutdown.
//!
//! Both services share one [`ServiceState`]: the record store, the
//! identifier generator and the stream tracker.

pub mod catalog;
pub mod orders;
pub mod tracker;

use crate::server::{config::ServerConfig, idgen::IdGenerator, store::RecordStore};
use core::time::Duration;
use std::sync::Arc;
use tracker::StreamTracker;

/// State injected into every service instance.
#[derive(Clone, Debug)]
pub struct ServiceState {
    pub config: ServerConfig,
    pub store: Arc<RecordStore>,
    pub ids: Arc<IdGenerator>,
    pub tracker: Arc<StreamTracker>,
}

impl ServiceState {
    pub fn new(config: ServerConfig) -> Self {
        let tracker = StreamTracker::new(Duration::from_secs(config.shutdown_timeout));
        Self {
            config,
            store: Arc::new(RecordStore::new()),
            ids: Arc::new(IdGenerator::new()),
            tracker: Arc::new(tracker),
        }
    }

    /// Initiates a graceful shutdown of every in-flight call.
    pub async fn shutdown(&self) {
        self.tracker.shutdown().await;
    }
}

#[cfg(test)]
mod tests;
