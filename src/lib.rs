pub mod amqp;
pub mod config;
pub mod error;
pub mod logger;
pub mod order;
pub mod record;

pub use amqp::{AmqpTransport, MemoryTransport, QueueOptions, Subscription, Transport};
pub use crate::config::{Config, LoggerConfig};
pub use error::{Error, Result};
pub use logger::Logger;
pub use order::{OrderNotification, OrderRelayBatch};
pub use record::{LogRecord, LogRequest, RequestPayload, Severity};
