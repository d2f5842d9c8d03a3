//! In-memory record storage shared by every call.
//!
//! [`RecordStore`] owns one map per key-space. Each map sits behind its own
//! [`parking_lot::RwLock`], so product writes never contend with order reads
//! and vice versa. Guards are never held across an `.await`; streaming calls
//! copy what they need out of the store before suspending.
//!
//! The store is volatile: it lives for the lifetime of the process and is
//! injected into each service as an `Arc<RecordStore>`.

mod orders;
mod products;

pub use orders::OrderTable;
pub use products::ProductTable;

/// Owned store for every record key-space.
#[derive(Debug, Default)]
pub struct RecordStore {
    products: ProductTable,
    orders: OrderTable,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn products(&self) -> &ProductTable {
        &self.products
    }

    pub fn orders(&self) -> &OrderTable {
        &self.orders
    }
}
