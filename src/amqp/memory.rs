//! In-process broker emulation.
//!
//! [`MemoryTransport`] behaves like a single RabbitMQ vhost reached over the
//! default exchange:
//! - declaring a queue twice with the same properties is a no-op, with
//!   different properties it fails
//! - publishing to a queue nobody declared drops the message silently
//! - messages published before anyone consumes are held in the queue, up
//!   to `x-max-length` or the transport's limit; the oldest are dropped
//!   first
//! - multiple consumers on one queue receive messages round-robin
//! - deliveries are auto-acknowledged as they are handed to the consumer
//! - an `auto_delete` queue disappears once its last consumer is gone, and
//!   later publishes to it are dropped
//!
//! Closing the transport ends every consume loop it started.

use super::consumer::spawn_consumer;
use super::transport::{MessageHandler, QueueOptions, Subscription, Transport};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info};

/// Messages a queue holds without consumers unless told otherwise.
pub const DEFAULT_MAX_READY: usize = 1000;

#[derive(Debug)]
struct MemoryQueue {
    options: QueueOptions,
    limit: usize,
    ready: VecDeque<Bytes>,
    consumers: Vec<mpsc::UnboundedSender<Bytes>>,
    next_consumer: usize,
    had_consumer: bool,
}

impl MemoryQueue {
    fn new(options: QueueOptions, max_ready: usize) -> Self {
        let limit = options.max_length().map_or(max_ready, |n| n.min(max_ready));
        Self {
            options,
            limit,
            ready: VecDeque::new(),
            consumers: Vec::new(),
            next_consumer: 0,
            had_consumer: false,
        }
    }

    fn deliver(&mut self, mut body: Bytes) {
        while !self.consumers.is_empty() {
            let index = self.next_consumer % self.consumers.len();
            match self.consumers[index].send(body) {
                Ok(()) => {
                    self.next_consumer = index + 1;
                    return;
                }
                Err(mpsc::error::SendError(returned)) => {
                    // Consumer loop ended; forget it and try the next one.
                    self.consumers.remove(index);
                    body = returned;
                }
            }
        }
        self.ready.push_back(body);
        while self.ready.len() > self.limit {
            self.ready.pop_front();
        }
    }
}

#[derive(Debug, Default)]
struct Broker {
    closed: bool,
    queues: HashMap<String, MemoryQueue>,
}

impl Broker {
    /// Forgets consumers whose loop has ended and removes `auto_delete`
    /// queues left without any.
    fn reap(&mut self) {
        self.queues.retain(|name, queue| {
            queue.consumers.retain(|consumer| !consumer.is_closed());
            let unused =
                queue.options.auto_delete && queue.had_consumer && queue.consumers.is_empty();
            if unused {
                info!("Queue deleted after last consumer left: {}", name);
            }
            !unused
        });
    }
}

/// [`Transport`] backed by in-memory queues.
#[derive(Debug)]
pub struct MemoryTransport {
    broker: Mutex<Broker>,
    max_ready: usize,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::with_max_ready(DEFAULT_MAX_READY)
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps every queue at `max_ready` waiting messages. A smaller
    /// `x-max-length` argument on a queue still applies.
    pub fn with_max_ready(max_ready: usize) -> Self {
        Self {
            broker: Mutex::new(Broker::default()),
            max_ready,
        }
    }

    /// Removes and returns the messages waiting in `queue`, oldest first.
    /// Messages already handed to a consumer are not included.
    pub async fn drain(&self, queue: &str) -> Vec<Bytes> {
        let mut broker = self.broker.lock().await;
        broker.reap();
        broker
            .queues
            .get_mut(queue)
            .map(|q| q.ready.drain(..).collect())
            .unwrap_or_default()
    }

    /// Number of messages waiting in `queue`, or `None` if it does not exist.
    pub async fn queue_depth(&self, queue: &str) -> Option<usize> {
        let mut broker = self.broker.lock().await;
        broker.reap();
        broker.queues.get(queue).map(|q| q.ready.len())
    }

    pub async fn is_closed(&self) -> bool {
        self.broker.lock().await.closed
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn declare_queue(&self, name: &str, options: &QueueOptions) -> Result<()> {
        let mut broker = self.broker.lock().await;
        if broker.closed {
            return Err(Error::NotConnected);
        }
        broker.reap();

        match broker.queues.get(name) {
            Some(existing) if !existing.options.is_equivalent(options) => {
                return Err(Error::declaration(
                    name,
                    format!(
                        "PRECONDITION_FAILED - inequivalent arguments \
                         (existing {:?}, requested {:?})",
                        existing.options, options
                    ),
                ));
            }
            Some(_) => {}
            None => {
                broker
                    .queues
                    .insert(name.to_string(), MemoryQueue::new(options.clone(), self.max_ready));
            }
        }

        info!("Queue declared: {}", name);
        Ok(())
    }

    async fn publish(&self, queue: &str, exchange: &str, payload: &[u8]) -> Result<()> {
        let mut broker = self.broker.lock().await;
        if broker.closed {
            return Err(Error::NotConnected);
        }

        if !exchange.is_empty() {
            debug!(
                queue = %queue,
                exchange = %exchange,
                "No binding for exchange, message dropped"
            );
            return Ok(());
        }

        broker.reap();
        match broker.queues.get_mut(queue) {
            Some(target) => {
                target.deliver(Bytes::copy_from_slice(payload));
                debug!(queue = %queue, bytes = payload.len(), "Published message");
            }
            None => {
                debug!(queue = %queue, "Unroutable message dropped");
            }
        }
        Ok(())
    }

    async fn consume(&self, queue: &str, handler: MessageHandler) -> Result<Subscription> {
        let mut broker = self.broker.lock().await;
        if broker.closed {
            return Err(Error::NotConnected);
        }
        broker.reap();

        let target = broker
            .queues
            .get_mut(queue)
            .ok_or_else(|| Error::consume(queue, "NOT_FOUND - no queue"))?;

        let (tx, rx) = mpsc::unbounded_channel();
        for body in target.ready.drain(..) {
            // Receiver is alive in this scope.
            let _ = tx.send(body);
        }
        target.consumers.push(tx);
        target.had_consumer = true;

        info!("Consuming from queue: {}", queue);

        let deliveries = UnboundedReceiverStream::new(rx).map(Ok::<_, Infallible>);
        Ok(spawn_consumer(queue, deliveries, handler))
    }

    async fn close(&self) -> Result<()> {
        let mut broker = self.broker.lock().await;
        if broker.closed {
            return Err(Error::NotConnected);
        }
        broker.closed = true;
        for queue in broker.queues.values_mut() {
            queue.consumers.clear();
        }
        info!("Closed in-memory transport");
        Ok(())
    }
}
