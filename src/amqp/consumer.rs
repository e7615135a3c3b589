use super::transport::{MessageHandler, Subscription};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::fmt::Display;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runs `handler` over `deliveries` on a spawned task until the stream
/// ends, yields an error, or the returned subscription is cancelled.
pub(crate) fn spawn_consumer<S, E>(
    queue: &str,
    deliveries: S,
    mut handler: MessageHandler,
) -> Subscription
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let token = CancellationToken::new();
    let cancelled = token.clone();
    let queue_name = queue.to_string();

    let handle = tokio::spawn(async move {
        let mut deliveries = Box::pin(deliveries);
        let mut received: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => {
                    info!(queue = %queue_name, received, "Consumer cancelled");
                    break;
                }
                next = deliveries.next() => match next {
                    Some(Ok(body)) => {
                        received += 1;
                        debug!(queue = %queue_name, bytes = body.len(), "Received message");
                        handler(body);
                    }
                    Some(Err(e)) => {
                        warn!(queue = %queue_name, "Delivery stream failed: {}", e);
                        break;
                    }
                    None => {
                        info!(queue = %queue_name, received, "Delivery stream closed");
                        break;
                    }
                },
            }
        }
    });

    Subscription::new(queue.to_string(), token, handle)
}
