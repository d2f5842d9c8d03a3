use super::inbound::{Inbound, next_inbound};
use crate::server::{store::RecordStore, telemetry::increment_orders_ingested};
use futures::Stream;
use orderinfo_core::{
    Error,
    proto::{Order, UpdateSummary},
};
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Reads every order from `inbound` and upserts them into the store.
///
/// Orders are staged until the caller closes its side of the stream and are
/// then applied in one exclusive section, so the call either lands in full or
/// not at all. Within one call the last write for an identifier wins.
///
/// # Errors
///
/// - [`Error::InvalidRequest`] for an order without an identifier.
/// - [`Error::Stream`] if the inbound stream fails.
/// - [`Error::ServiceShutdown`] if the service shuts down mid-stream.
///
/// Nothing is written to the store on error.
pub async fn ingest_orders<S>(
    store: &RecordStore,
    mut inbound: S,
    shutdown: CancellationToken,
) -> Result<UpdateSummary, Error>
where
    S: Stream<Item = Result<Order, Status>> + Unpin,
{
    let mut staged = Vec::new();

    loop {
        let next = tokio::select! {
            biased;
            () = shutdown.cancelled() => return Err(Error::ServiceShutdown),
            next = next_inbound(&mut inbound) => next,
        };

        match next {
            Inbound::Item(order) => {
                if order.id.is_empty() {
                    return Err(Error::InvalidRequest {
                        reason: format!("Order #{} in stream has no id", staged.len() + 1),
                    });
                }
                tracing::debug!("Order ID {}: Staged", order.id);
                staged.push(order);
            }
            Inbound::End => break,
            Inbound::Failed(status) => return Err(Error::Stream(status)),
        }
    }

    let order_ids: Vec<String> = staged.iter().map(|o| o.id.clone()).collect();
    let applied = store.orders().upsert_all(staged);
    increment_orders_ingested(applied as u64);
    tracing::info!(
        "Updated {applied} orders, {} stored",
        store.orders().len()
    );

    let message = if order_ids.is_empty() {
        "Updated Order IDs: none".to_string()
    } else {
        format!("Updated Order IDs: {}", order_ids.join(", "))
    };

    Ok(UpdateSummary { message, order_ids })
}
