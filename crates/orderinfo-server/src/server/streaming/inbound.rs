use futures::{Stream, StreamExt};
use tonic::Status;

/// The outcome of one read from a client stream.
#[derive(Debug)]
pub enum Inbound<T> {
    /// The next message, in the order the caller sent it.
    Item(T),
    /// The caller closed its side of the stream.
    End,
    /// The transport reported an error; the call must be aborted.
    Failed(Status),
}

/// Waits for the next message on `stream`.
///
/// Accepts any stream of `Result<T, Status>`, which covers
/// `tonic::Streaming<T>` as well as channel-backed streams in tests.
pub async fn next_inbound<T, S>(stream: &mut S) -> Inbound<T>
where
    S: Stream<Item = Result<T, Status>> + Unpin,
{
    match stream.next().await {
        Some(Ok(item)) => Inbound::Item(item),
        Some(Err(status)) => Inbound::Failed(status),
        None => Inbound::End,
    }
}
