use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Callback invoked once per delivered message body.
///
/// Deliveries are acknowledged before the handler runs, so a message whose
/// handler fails or panics is gone for good.
pub type MessageHandler = Box<dyn FnMut(Bytes) + Send + 'static>;

/// Properties used when declaring a queue.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueOptions {
    pub durable: bool,
    pub auto_delete: bool,
    pub exclusive: bool,
    pub no_wait: bool,
    /// Extra `x-*` queue arguments, e.g. `x-message-ttl`.
    pub arguments: BTreeMap<String, serde_json::Value>,
}

impl QueueOptions {
    pub fn durable() -> Self {
        Self {
            durable: true,
            ..Self::default()
        }
    }

    pub fn with_auto_delete(mut self, auto_delete: bool) -> Self {
        self.auto_delete = auto_delete;
        self
    }

    pub fn with_argument(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.arguments.insert(key.into(), value);
        self
    }

    /// Whether a queue declared with `self` may be redeclared with `other`.
    ///
    /// `no_wait` only affects the client side of the declaration and is
    /// ignored.
    pub fn is_equivalent(&self, other: &QueueOptions) -> bool {
        self.durable == other.durable
            && self.auto_delete == other.auto_delete
            && self.exclusive == other.exclusive
            && self.arguments == other.arguments
    }

    /// The `x-max-length` argument, if set to a non-negative integer.
    pub fn max_length(&self) -> Option<usize> {
        self.arguments
            .get("x-max-length")
            .and_then(serde_json::Value::as_u64)
            .map(|n| n as usize)
    }
}

/// One connection and one channel to a message broker.
///
/// Lifecycle is `Connected -> Closed`, one way. After [`Transport::close`]
/// every operation fails with [`crate::Error::NotConnected`]; build a new
/// transport to reconnect. Implementations serialize all channel
/// operations internally, so a transport can be shared behind an `Arc`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Ensures `name` exists with `options`. Repeating an identical
    /// declaration is a no-op.
    async fn declare_queue(&self, name: &str, options: &QueueOptions) -> Result<()>;

    /// Sends `payload` with routing key `queue` through `exchange` (`""` is
    /// the default exchange). Returns once the write is handed to the
    /// client; no broker confirmation is awaited and unroutable messages
    /// are dropped by the broker without an error.
    async fn publish(&self, queue: &str, exchange: &str, payload: &[u8]) -> Result<()>;

    /// Subscribes to `queue` and feeds every delivery to `handler` on a
    /// single background task, in delivery order.
    async fn consume(&self, queue: &str, handler: MessageHandler) -> Result<Subscription>;

    /// Releases the channel, then the connection. Both are attempted even
    /// when the first fails.
    async fn close(&self) -> Result<()>;
}

/// Handle to a background consume loop.
///
/// Dropping the handle leaves the loop running until its delivery stream
/// ends, i.e. until the transport is closed.
#[derive(Debug)]
pub struct Subscription {
    queue: String,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn new(queue: String, token: CancellationToken, handle: JoinHandle<()>) -> Self {
        Self {
            queue,
            token,
            handle,
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Stops the loop after the message currently being handled, if any.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the loop to end.
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            warn!(queue = %self.queue, "Consumer task ended abnormally: {}", e);
        }
    }
}
