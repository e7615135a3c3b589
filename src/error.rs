//! Error types and result handling for mq-logger.
//!
//! This module defines the main error type [`Error`] and a convenience
//! [`Result`] type alias used throughout the crate. Nothing in the crate
//! retries on error: every failure is handed straight back to the caller.
//!
//! # Example
//!
//! ```rust
//! use mq_logger::{Error, Result};
//!
//! fn publish_somewhere() -> Result<()> {
//!     // Simulating a transport that was already closed
//!     Err(Error::NotConnected)
//! }
//!
//! match publish_somewhere() {
//!     Ok(()) => println!("Published"),
//!     Err(Error::NotConnected) => eprintln!("Transport is closed"),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

use crate::record::ValidationError;
use thiserror::Error;

/// The main error type for mq-logger operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error, from a missing file, a bad value or an
    /// empty required setting.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The broker could not be reached or rejected the credentials.
    ///
    /// Fatal for the transport instance that produced it.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Queue declaration failed, usually because the queue already exists
    /// with different properties or the channel is gone.
    #[error("Failed to declare queue '{queue}': {message}")]
    Declaration {
        /// Name of the queue being declared
        queue: String,
        /// Description of the failure
        message: String,
    },

    /// Local publish failure. Unroutable messages never produce this; the
    /// broker drops them silently.
    #[error("Failed to publish to '{queue}': {message}")]
    Publish {
        /// Routing key (queue name) of the publish
        queue: String,
        /// Description of the failure
        message: String,
    },

    /// Subscribing to a queue failed.
    #[error("Failed to consume from '{queue}': {message}")]
    Consume {
        /// Name of the queue
        queue: String,
        /// Description of the failure
        message: String,
    },

    /// A log request is missing a required field.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A payload could not be turned into JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The transport was used after `close`.
    #[error("Transport is not connected")]
    NotConnected,

    /// Releasing the channel and/or the connection failed.
    ///
    /// Both releases are always attempted; the message lists every failure.
    #[error("Close error: {0}")]
    Close(String),
}

impl Error {
    pub(crate) fn declaration(queue: &str, message: impl ToString) -> Self {
        Error::Declaration {
            queue: queue.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn publish(queue: &str, message: impl ToString) -> Self {
        Error::Publish {
            queue: queue.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn consume(queue: &str, message: impl ToString) -> Self {
        Error::Consume {
            queue: queue.to_string(),
            message: message.to_string(),
        }
    }
}

/// A convenient Result type alias for mq-logger operations.
///
/// This is equivalent to `std::result::Result<T, mq_logger::Error>`.
pub type Result<T> = std::result::Result<T, Error>;
