use orderinfo_core::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Hands `item` to the response stream, waiting for channel capacity.
///
/// The wait is abandoned as soon as `shutdown` fires.
///
/// # Errors
///
/// - [`Error::ServiceShutdown`] if the service began shutting down first.
/// - [`Error::ChannelError`] if the response stream is gone (the caller hung
///   up or the transport dropped it).
pub async fn send_or_shutdown<T>(
    resp_tx: &mpsc::Sender<Result<T, Status>>,
    item: T,
    shutdown: &CancellationToken,
) -> Result<(), Error> {
    tokio::select! {
        biased;
        () = shutdown.cancelled() => Err(Error::ServiceShutdown),
        sent = resp_tx.send(Ok(item)) => sent.map_err(|e| Error::ChannelError {
            context: format!("response stream closed: {e}"),
        }),
    }
}

/// Best effort delivery of a terminal error to the caller.
///
/// Cancellation and closed-stream errors are not forwarded: nobody is left to
/// read them.
pub async fn report_failure<T>(resp_tx: &mpsc::Sender<Result<T, Status>>, err: Error) {
    if matches!(err, Error::RequestCancelled | Error::ChannelError { .. }) || resp_tx.is_closed() {
        return;
    }
    if let Err(e) = resp_tx.send(Err(err.into())).await {
        tracing::warn!("Failed to forward err: {e}");
    }
}
