use crate::amqp::Transport;
use crate::config::LoggerConfig;
use crate::order::{OrderNotification, OrderRelayBatch};
use crate::record::{LogRecord, LogRequest, RecordBuilder, Severity};
use crate::{Error, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Publishes log records and order notifications through a shared
/// [`Transport`].
///
/// Every call is a single publish with no retry: errors go straight back
/// to the caller, which decides whether a lost log event matters.
pub struct Logger {
    transport: Arc<dyn Transport>,
    builder: RecordBuilder,
    queue: String,
    order_queue: Option<String>,
    order_relay_queue: Option<String>,
}

impl Logger {
    /// Declares the log queue and returns a logger publishing to it.
    ///
    /// The order and relay queues are not declared here; declare them on
    /// the transport if they may not exist yet.
    pub async fn new(transport: Arc<dyn Transport>, config: LoggerConfig) -> Result<Self> {
        config.validate()?;

        transport
            .declare_queue(&config.queue, &config.queue_options)
            .await?;

        info!(
            queue = %config.queue,
            function_name = %config.function_name,
            "Logger ready"
        );

        Ok(Self {
            transport,
            builder: RecordBuilder::new(config.function_name, config.api_endpoint),
            queue: config.queue,
            order_queue: config.order_queue.filter(|q| !q.is_empty()),
            order_relay_queue: config.order_relay_queue.filter(|q| !q.is_empty()),
        })
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub async fn info(&self, request: LogRequest) -> Result<()> {
        self.log(Severity::Info, request).await
    }

    pub async fn warn(&self, request: LogRequest) -> Result<()> {
        self.log(Severity::Warning, request).await
    }

    pub async fn error(&self, request: LogRequest) -> Result<()> {
        self.log(Severity::Error, request).await
    }

    pub async fn critical(&self, request: LogRequest) -> Result<()> {
        self.log(Severity::Critical, request).await
    }

    /// Builds a record at `severity` and publishes it to the log queue.
    #[instrument(skip(self, request), fields(queue = %self.queue, error_code = request.error_code))]
    pub async fn log(&self, severity: Severity, request: LogRequest) -> Result<()> {
        let record = self.builder.build(request, severity)?;
        self.publish_record(&record).await
    }

    /// Publishes an already built record as is.
    pub async fn publish_record(&self, record: &LogRecord) -> Result<()> {
        let body = record.to_json()?;
        self.transport.publish(&self.queue, "", &body).await?;
        debug!(severity = %record.error_level, "Log record published");
        Ok(())
    }

    pub async fn order_notification(&self, order: &OrderNotification) -> Result<()> {
        let queue = self.order_queue.as_deref();
        self.publish_json(queue, "order queue", order).await
    }

    pub async fn send_order_relay(&self, batch: &OrderRelayBatch) -> Result<()> {
        let queue = self.order_relay_queue.as_deref();
        self.publish_json(queue, "order relay queue", batch).await
    }

    async fn publish_json<T: Serialize>(
        &self,
        queue: Option<&str>,
        label: &str,
        payload: &T,
    ) -> Result<()> {
        let queue =
            queue.ok_or_else(|| Error::publish("", format!("{} is not configured", label)))?;
        let body = serde_json::to_vec(payload)?;
        self.transport.publish(queue, "", &body).await
    }
}
