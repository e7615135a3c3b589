pub mod connection;
mod consumer;
pub mod memory;
pub mod transport;


pub use connection::AmqpTransport;
pub use memory::{MemoryTransport, DEFAULT_MAX_READY};
pub use transport::{MessageHandler, QueueOptions, Subscription, Transport};
