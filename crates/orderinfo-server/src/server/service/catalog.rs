//! Product catalog service.
//!
//! [`ProductCatalogService`] implements the `ProductInfo` gRPC service: unary
//! add and lookup over the product key-space of the record store.

use super::ServiceState;
use crate::server::telemetry::{increment_requests, increment_stream_errors};
use orderinfo_core::{
    Error,
    proto::{Product, ProductId, product_info_server::ProductInfo},
};
use tonic::{Request, Response, Status};

#[derive(Clone, Debug)]
pub struct ProductCatalogService {
    state: ServiceState,
}

impl ProductCatalogService {
    pub fn new(state: ServiceState) -> Self {
        Self { state }
    }
}

#[tonic::async_trait]
impl ProductInfo for ProductCatalogService {
    /// Assigns a fresh identifier, stores the product under it and returns the
    /// identifier. Any `id` sent by the caller is ignored.
    #[tracing::instrument(skip_all, fields(name = %req.get_ref().name))]
    async fn add_product(&self, req: Request<Product>) -> Result<Response<ProductId>, Status> {
        increment_requests("AddProduct");
        self.state.tracker.ensure_accepting()?;

        let product = req.into_inner();
        if !product.price.is_finite() || product.price < 0.0 {
            increment_stream_errors();
            return Err(Error::InvalidRequest {
                reason: format!("Price must be a non-negative number, got {}", product.price),
            }
            .into());
        }

        let id = self.state.ids.next_id().await.inspect_err(|_| {
            increment_stream_errors();
        })?;
        self.state.store.products().insert(id.clone(), product)?;

        tracing::info!(
            "Product {id} added successfully, {} stored",
            self.state.store.products().len()
        );
        Ok(Response::new(ProductId { value: id }))
    }

    #[tracing::instrument(skip_all, fields(id = %req.get_ref().value))]
    async fn get_product(&self, req: Request<ProductId>) -> Result<Response<Product>, Status> {
        increment_requests("GetProduct");
        self.state.tracker.ensure_accepting()?;

        let ProductId { value } = req.into_inner();
        let product = self.state.store.products().get(&value).inspect_err(|_| {
            tracing::debug!("Product {value} does not exist");
        })?;
        Ok(Response::new(product))
    }
}
