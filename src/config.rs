use crate::amqp::QueueOptions;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub broker: BrokerConfig,
    pub logger: LoggerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrokerConfig {
    pub url: String,
    #[serde(default)]
    pub connection_name: Option<String>,
}

/// Settings of a [`crate::Logger`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggerConfig {
    /// Queue receiving every log record. Declared when the logger is built.
    pub queue: String,
    /// Stamped into every record as `function_name`.
    pub function_name: String,
    /// Fallback for records that do not name an endpoint.
    pub api_endpoint: String,
    #[serde(default)]
    pub order_queue: Option<String>,
    #[serde(default)]
    pub order_relay_queue: Option<String>,
    #[serde(default = "default_log_queue_options")]
    pub queue_options: QueueOptions,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("MQ_LOGGER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.broker.url.trim().is_empty() {
            return Err(Error::Config("broker.url is required".to_string()));
        }
        self.logger.validate()
    }
}

impl LoggerConfig {
    pub fn new(
        queue: impl Into<String>,
        function_name: impl Into<String>,
        api_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            queue: queue.into(),
            function_name: function_name.into(),
            api_endpoint: api_endpoint.into(),
            order_queue: None,
            order_relay_queue: None,
            queue_options: default_log_queue_options(),
        }
    }

    pub fn with_order_queue(mut self, queue: impl Into<String>) -> Self {
        self.order_queue = Some(queue.into());
        self
    }

    pub fn with_order_relay_queue(mut self, queue: impl Into<String>) -> Self {
        self.order_relay_queue = Some(queue.into());
        self
    }

    pub fn with_queue_options(mut self, options: QueueOptions) -> Self {
        self.queue_options = options;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("logger.queue", &self.queue),
            ("logger.function_name", &self.function_name),
            ("logger.api_endpoint", &self.api_endpoint),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{} is required", name)));
            }
        }
        Ok(())
    }
}

fn default_log_queue_options() -> QueueOptions {
    QueueOptions {
        durable: true,
        auto_delete: true,
        ..QueueOptions::default()
    }
}
