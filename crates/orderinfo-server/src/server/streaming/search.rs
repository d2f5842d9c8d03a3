use super::outbound::send_or_shutdown;
use crate::server::{store::RecordStore, telemetry::increment_search_matches};
use orderinfo_core::{Error, proto::Order};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Streams every order with an item containing `substring` to `resp_tx`.
///
/// The identifier set is snapshotted up front; each order is then re-read and
/// tested just before it is sent, so matches go out as soon as they are found
/// and no store lock is held while waiting on the transport. Iteration follows
/// the order map and is therefore unordered.
///
/// Returns the number of orders sent.
///
/// # Errors
///
/// Stops at the first failed send. Orders already delivered stay delivered.
pub async fn feed_matches(
    store: Arc<RecordStore>,
    substring: String,
    resp_tx: mpsc::Sender<Result<Order, Status>>,
    shutdown: CancellationToken,
) -> Result<usize, Error> {
    let mut sent = 0;

    for id in store.orders().ids() {
        let Some(order) = store.orders().get_matching(&id, &substring) else {
            continue;
        };

        send_or_shutdown(&resp_tx, order, &shutdown).await?;
        increment_search_matches();
        tracing::debug!("Matching Order Found: {id}");
        sent += 1;
    }

    Ok(sent)
}
