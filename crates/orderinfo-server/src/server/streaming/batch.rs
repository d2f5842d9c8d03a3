use core::num::NonZeroUsize;
use std::collections::BTreeMap;

/// Order identifiers grouped under one shipment key, ready to be flushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipmentGroup {
    pub destination: String,
    pub order_ids: Vec<String>,
}

/// Accumulation state for one `ProcessOrders` stream.
///
/// Counts every identifier pushed since the last flush. Identifiers are
/// grouped by key; within a group they keep arrival order.
#[derive(Debug)]
pub struct ShipmentBatch {
    batch_size: usize,
    count: usize,
    groups: BTreeMap<String, Vec<String>>,
}

impl ShipmentBatch {
    pub fn new(batch_size: NonZeroUsize) -> Self {
        Self {
            batch_size: batch_size.get(),
            count: 0,
            groups: BTreeMap::new(),
        }
    }

    /// Adds `order_id` to the group for `destination`.
    ///
    /// Returns `true` once the batch threshold is reached.
    pub fn push(&mut self, destination: String, order_id: String) -> bool {
        self.groups.entry(destination).or_default().push(order_id);
        self.count += 1;
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.count >= self.batch_size
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn len(&self) -> usize {
        self.count
    }

    /// Drains every group and resets the counter.
    pub fn take(&mut self) -> Vec<ShipmentGroup> {
        self.count = 0;
        core::mem::take(&mut self.groups)
            .into_iter()
            .map(|(destination, order_ids)| ShipmentGroup {
                destination,
                order_ids,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(size: usize) -> ShipmentBatch {
        ShipmentBatch::new(NonZeroUsize::new(size).unwrap())
    }

    #[test]
    fn fills_at_the_threshold() {
        let mut batch = batch(3);
        assert!(!batch.push(String::new(), "1".into()));
        assert!(!batch.push(String::new(), "2".into()));
        assert!(batch.push(String::new(), "3".into()));
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn take_resets_accumulation() {
        let mut batch = batch(2);
        batch.push(String::new(), "1".into());
        batch.push(String::new(), "2".into());

        let groups = batch.take();
        assert_eq!(
            groups,
            vec![ShipmentGroup {
                destination: String::new(),
                order_ids: vec!["1".into(), "2".into()],
            }]
        );
        assert!(batch.is_empty());
        assert!(batch.take().is_empty());
    }

    #[test]
    fn groups_by_key_and_keeps_arrival_order() {
        let mut batch = batch(10);
        batch.push("Mountain View, CA".into(), "102".into());
        batch.push("San Jose, CA".into(), "103".into());
        batch.push("Mountain View, CA".into(), "104".into());

        let groups = batch.take();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].destination, "Mountain View, CA");
        assert_eq!(groups[0].order_ids, vec!["102", "104"]);
        assert_eq!(groups[1].order_ids, vec!["103"]);
    }

    #[test]
    fn batch_of_one_fills_on_every_push() {
        let mut batch = batch(1);
        assert!(batch.push(String::new(), "1".into()));
        batch.take();
        assert!(batch.push(String::new(), "2".into()));
    }

    #[test]
    fn repeated_ids_count_every_time() {
        let mut batch = batch(2);
        batch.push(String::new(), "7".into());
        assert!(batch.push(String::new(), "7".into()));
        assert_eq!(batch.take()[0].order_ids, vec!["7", "7"]);
    }
}
