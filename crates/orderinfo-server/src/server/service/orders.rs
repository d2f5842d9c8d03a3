//! Order management service.
//!
//! [`OrderManagerService`] implements the `OrderManager` gRPC service and
//! exercises all four call shapes:
//!
//! - `AddOrder` / `GetOrder` - unary.
//! - `SearchOrders` - server streaming via [`feed_matches`].
//! - `UpdateOrders` - client streaming via [`ingest_orders`].
//! - `ProcessOrders` - bidirectional via [`process_orders`].
//!
//! Server-streamed responses are produced by a spawned task writing into a
//! bounded channel, the receiving half of which is handed to tonic. Each
//! spawned task owns a [`StreamGuard`] and a shutdown token.
//!
//! [`StreamGuard`]: super::tracker::StreamGuard

use super::ServiceState;
use crate::server::{
    streaming::{
        ingest::ingest_orders,
        outbound::report_failure,
        processor::{BatchingContext, process_orders},
        search::feed_matches,
    },
    telemetry::{increment_requests, increment_stream_errors},
};
use core::pin::Pin;
use futures::TryStreamExt;
use orderinfo_core::{
    Error,
    proto::{
        CombinedShipment, Order, OrderId, SearchQuery, UpdateSummary,
        order_manager_server::OrderManager,
    },
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::{Stream, wrappers::ReceiverStream};
use tonic::{Request, Response, Status, Streaming};
use tracing::Instrument;

type ResponseStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

#[derive(Clone, Debug)]
pub struct OrderManagerService {
    state: ServiceState,
}

impl OrderManagerService {
    pub fn new(state: ServiceState) -> Self {
        Self { state }
    }

    fn batching_context(&self) -> BatchingContext {
        BatchingContext {
            store: Arc::clone(&self.state.store),
            ids: Arc::clone(&self.state.ids),
            batch_size: self.state.config.batch_size,
            grouping: self.state.config.grouping,
        }
    }
}

/// Wraps the receiving half of a response channel, counting errors on the way
/// out.
fn into_response_stream<T: Send + 'static>(
    resp_rx: mpsc::Receiver<Result<T, Status>>,
) -> ResponseStream<T> {
    let stream = ReceiverStream::new(resp_rx).inspect_err(|_e| {
        increment_stream_errors();
    });
    Box::pin(stream)
}

#[tonic::async_trait]
impl OrderManager for OrderManagerService {
    type SearchOrdersStream = ResponseStream<Order>;
    type ProcessOrdersStream = ResponseStream<CombinedShipment>;

    /// Stores a new order under a server-assigned identifier.
    #[tracing::instrument(skip_all)]
    async fn add_order(&self, req: Request<Order>) -> Result<Response<OrderId>, Status> {
        increment_requests("AddOrder");
        self.state.tracker.ensure_accepting()?;

        let mut order = req.into_inner();
        let id = self.state.ids.next_id().await.inspect_err(|_| {
            increment_stream_errors();
        })?;
        order.id.clone_from(&id);
        self.state.store.orders().upsert(order);

        tracing::info!("Order {id} added successfully");
        Ok(Response::new(OrderId { value: id }))
    }

    #[tracing::instrument(skip_all, fields(id = %req.get_ref().value))]
    async fn get_order(&self, req: Request<OrderId>) -> Result<Response<Order>, Status> {
        increment_requests("GetOrder");
        self.state.tracker.ensure_accepting()?;

        let OrderId { value } = req.into_inner();
        let order = self.state.store.orders().get(&value)?;
        Ok(Response::new(order))
    }

    /// Streams every order with an item containing the query substring.
    #[tracing::instrument(skip_all, fields(substring = %req.get_ref().substring))]
    async fn search_orders(
        &self,
        req: Request<SearchQuery>,
    ) -> Result<Response<Self::SearchOrdersStream>, Status> {
        increment_requests("SearchOrders");
        let guard = self.state.tracker.begin()?;

        let SearchQuery { substring } = req.into_inner();
        let (resp_tx, resp_rx) = mpsc::channel(self.state.config.stream_buffer_size.get());
        let store = Arc::clone(&self.state.store);
        let shutdown = self.state.tracker.token();

        let fut = async move {
            let _guard = guard;
            match feed_matches(store, substring, resp_tx.clone(), shutdown).await {
                Ok(sent) => tracing::info!("Search complete, {sent} orders matched"),
                Err(e) => {
                    tracing::warn!("Search aborted: {e}");
                    report_failure(&resp_tx, e).await;
                }
            }
        };
        tokio::spawn(fut.instrument(tracing::info_span!("search_stream")));

        Ok(Response::new(into_response_stream(resp_rx)))
    }

    /// Reads orders until the caller closes its side, then upserts them all
    /// and replies once with the processed identifiers.
    #[tracing::instrument(skip_all)]
    async fn update_orders(
        &self,
        req: Request<Streaming<Order>>,
    ) -> Result<Response<UpdateSummary>, Status> {
        increment_requests("UpdateOrders");
        let _guard = self.state.tracker.begin()?;

        let inbound = req.into_inner();
        let summary = ingest_orders(&self.state.store, inbound, self.state.tracker.token())
            .await
            .inspect_err(|e| {
                increment_stream_errors();
                tracing::warn!("Update aborted: {e}");
            })?;

        tracing::info!("{}", summary.message);
        Ok(Response::new(summary))
    }

    /// Batches the incoming order identifiers into combined shipments.
    #[tracing::instrument(skip_all)]
    async fn process_orders(
        &self,
        req: Request<Streaming<OrderId>>,
    ) -> Result<Response<Self::ProcessOrdersStream>, Status> {
        increment_requests("ProcessOrders");
        let guard = self.state.tracker.begin()?;

        let inbound = req.into_inner();
        let (resp_tx, resp_rx) = mpsc::channel(self.state.config.stream_buffer_size.get());
        let ctx = self.batching_context();
        let shutdown = self.state.tracker.token();

        let fut = async move {
            let _guard = guard;
            match process_orders(ctx, inbound, resp_tx.clone(), shutdown).await {
                Ok(shipments) => tracing::info!("Order stream complete, {shipments} shipments"),
                Err(Error::RequestCancelled) => tracing::info!("Order stream cancelled by caller"),
                Err(e) => {
                    tracing::warn!("Order stream aborted: {e}");
                    report_failure(&resp_tx, e).await;
                }
            }
        };
        tokio::spawn(fut.instrument(tracing::info_span!("process_stream")));

        Ok(Response::new(into_response_stream(resp_rx)))
    }
}
