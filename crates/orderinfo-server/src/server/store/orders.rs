use orderinfo_core::{Error, Result, error::RecordKind, proto::Order};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Order key-space. The last write for an identifier wins.
#[derive(Debug, Default)]
pub struct OrderTable {
    inner: RwLock<HashMap<String, Order>>,
}

impl OrderTable {
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no order is stored under `id`.
    pub fn get(&self, id: &str) -> Result<Order> {
        self.inner
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                kind: RecordKind::Order,
                id: id.to_string(),
            })
    }

    /// Inserts or overwrites a single order keyed by its own `id`.
    pub fn upsert(&self, order: Order) {
        self.inner.write().insert(order.id.clone(), order);
    }

    /// Applies every order in one exclusive section, in iteration order.
    ///
    /// Readers observe either none or all of `orders`.
    pub fn upsert_all(&self, orders: impl IntoIterator<Item = Order>) -> usize {
        let mut map = self.inner.write();
        let mut applied = 0;
        for order in orders {
            map.insert(order.id.clone(), order);
            applied += 1;
        }
        applied
    }

    /// Snapshot of the identifiers currently stored, in map iteration order.
    pub fn ids(&self) -> Vec<String> {
        self.inner.read().keys().cloned().collect()
    }

    /// Returns the order under `id` if any of its items contains `substring`.
    ///
    /// Orders removed or rewritten since [`Self::ids`] was taken are tested
    /// against their current contents.
    pub fn get_matching(&self, id: &str, substring: &str) -> Option<Order> {
        let orders = self.inner.read();
        let order = orders.get(id)?;
        order
            .items
            .iter()
            .any(|item| item.contains(substring))
            .then(|| order.clone())
    }

    /// The destination of the stored order, if there is one.
    pub fn destination_of(&self, id: &str) -> Option<String> {
        self.inner.read().get(id).map(|o| o.destination.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
