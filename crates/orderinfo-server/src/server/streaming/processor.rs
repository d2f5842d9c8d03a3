use super::{
    batch::ShipmentBatch,
    inbound::{Inbound, next_inbound},
    outbound::send_or_shutdown,
};
use crate::server::{
    config::ShipmentGrouping, idgen::IdGenerator, store::RecordStore,
    telemetry::increment_shipments_flushed,
};
use futures::Stream;
use orderinfo_core::{
    Error,
    proto::{CombinedShipment, OrderId, ShipmentStatus},
};
use core::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Everything a `ProcessOrders` stream needs besides its two directions.
#[derive(Clone, Debug)]
pub struct BatchingContext {
    pub store: Arc<RecordStore>,
    pub ids: Arc<IdGenerator>,
    pub batch_size: NonZeroUsize,
    pub grouping: ShipmentGrouping,
}

impl BatchingContext {
    fn grouping_key(&self, order_id: &str) -> String {
        match self.grouping {
            ShipmentGrouping::Single => String::new(),
            ShipmentGrouping::Destination => self
                .store
                .orders()
                .destination_of(order_id)
                .unwrap_or_default(),
        }
    }
}

/// Runs the shipment batching loop for one bidirectional stream.
///
/// Order identifiers are accumulated as they arrive. Every `batch_size`
/// identifiers the accumulated groups are flushed to `resp_tx` as
/// [`ShipmentStatus::BatchFull`] shipments; when the caller closes its side
/// whatever remains is flushed as [`ShipmentStatus::StreamEnd`] and the stream
/// completes.
///
/// Reads and sends are independent: sends are buffered by `resp_tx`, so the
/// caller may keep writing identifiers while earlier shipments are still in
/// flight.
///
/// Returns the number of shipments emitted.
///
/// # Errors
///
/// Any error abandons the unflushed accumulation:
/// - [`Error::RequestCancelled`] if the caller went away mid-stream.
/// - [`Error::ServiceShutdown`] if the service shut down mid-stream.
/// - [`Error::Stream`] if reading from the caller failed.
/// - [`Error::IdGeneration`] or [`Error::ChannelError`] while flushing.
pub async fn process_orders<S>(
    ctx: BatchingContext,
    mut inbound: S,
    resp_tx: mpsc::Sender<Result<CombinedShipment, Status>>,
    shutdown: CancellationToken,
) -> Result<usize, Error>
where
    S: Stream<Item = Result<OrderId, Status>> + Unpin,
{
    let mut batch = ShipmentBatch::new(ctx.batch_size);
    let mut emitted = 0;

    loop {
        let next = tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                tracing::debug!("Shutdown with {} unflushed orders", batch.len());
                return Err(Error::ServiceShutdown);
            }
            () = resp_tx.closed() => {
                tracing::debug!("Caller hung up with {} unflushed orders", batch.len());
                return Err(Error::RequestCancelled);
            }
            next = next_inbound(&mut inbound) => next,
        };

        match next {
            Inbound::Item(OrderId { value }) => {
                let key = ctx.grouping_key(&value);
                tracing::debug!("Order ID {value}: Accumulated");
                if batch.push(key, value) {
                    emitted += flush(&ctx, &mut batch, ShipmentStatus::BatchFull, &resp_tx, &shutdown)
                        .await?;
                }
            }
            Inbound::End => {
                emitted += flush(&ctx, &mut batch, ShipmentStatus::StreamEnd, &resp_tx, &shutdown)
                    .await?;
                return Ok(emitted);
            }
            Inbound::Failed(status) => {
                tracing::warn!(
                    "Receive failed with {} unflushed orders: {}",
                    batch.len(),
                    status.message()
                );
                return Err(Error::Stream(status));
            }
        }
    }
}

/// Emits one [`CombinedShipment`] per accumulated group and resets the batch.
async fn flush(
    ctx: &BatchingContext,
    batch: &mut ShipmentBatch,
    status: ShipmentStatus,
    resp_tx: &mpsc::Sender<Result<CombinedShipment, Status>>,
    shutdown: &CancellationToken,
) -> Result<usize, Error> {
    if batch.is_empty() {
        return Ok(0);
    }
    let groups = batch.take();
    let count = groups.len();

    for group in groups {
        let shipment = CombinedShipment {
            id: ctx.ids.next_id().await?,
            destination: group.destination,
            order_ids: group.order_ids,
            status: status.into(),
        };
        tracing::info!(
            "Shipment {} flushed with {} orders ({})",
            shipment.id,
            shipment.order_ids.len(),
            status.as_str_name()
        );
        send_or_shutdown(resp_tx, shipment, shutdown).await?;
    }

    increment_shipments_flushed(count as u64);
    Ok(count)
}
