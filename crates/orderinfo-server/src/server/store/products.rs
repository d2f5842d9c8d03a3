use orderinfo_core::{Error, Result, error::RecordKind, proto::Product};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Product key-space. Products are insert-only.
#[derive(Debug, Default)]
pub struct ProductTable {
    inner: RwLock<HashMap<String, Product>>,
}

impl ProductTable {
    /// Stores `product` under `id`, overriding whatever `id` the caller put in
    /// the message.
    ///
    /// Identifiers come from the generator and are unique, so an existing
    /// entry is never replaced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if `id` is already taken.
    pub fn insert(&self, id: String, mut product: Product) -> Result<()> {
        let mut products = self.inner.write();
        if products.contains_key(&id) {
            return Err(Error::InvalidRequest {
                reason: format!("Product {id} already exists"),
            });
        }
        product.id.clone_from(&id);
        products.insert(id, product);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no product is stored under `id`.
    pub fn get(&self, id: &str) -> Result<Product> {
        self.inner
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                kind: RecordKind::Product,
                id: id.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phone() -> Product {
        Product {
            id: "client-chosen".to_string(),
            name: "Apple iPhone 11".to_string(),
            description: "Dual-camera system".to_string(),
            price: 1000.0,
        }
    }

    #[test]
    fn insert_then_get_returns_stored_fields() {
        let table = ProductTable::default();
        table.insert("p1".to_string(), phone()).unwrap();

        let stored = table.get("p1").unwrap();
        assert_eq!(stored.id, "p1");
        assert_eq!(stored.name, "Apple iPhone 11");
        assert_eq!(stored.description, "Dual-camera system");
        assert_eq!(stored.price, 1000.0);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let table = ProductTable::default();
        table.insert("p1".to_string(), phone()).unwrap();
        assert!(matches!(
            table.insert("p1".to_string(), phone()),
            Err(Error::InvalidRequest { .. })
        ));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn unknown_id_is_not_found() {
        let table = ProductTable::default();
        assert!(table.is_empty());
        assert!(matches!(
            table.get("missing"),
            Err(Error::NotFound {
                kind: RecordKind::Product,
                ..
            })
        ));
    }
}
