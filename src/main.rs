use anyhow::Context;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use mq_logger::record::LogRecord;
use mq_logger::{
    AmqpTransport, Config, LogRequest, Logger, OrderNotification, OrderRelayBatch, Severity,
    Transport,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "mq-logger")]
#[command(about = "Publish structured log records to an AMQP broker", long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "mq-logger.toml")]
    config: PathBuf,

    #[arg(short, long, help = "Enable JSON output for logs")]
    json_logs: bool,

    #[arg(short, long, help = "Verbose logging")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Publish one log record
    Send {
        #[arg(long, default_value = "info")]
        level: Severity,
        #[arg(long)]
        code: u32,
        #[arg(long, default_value = "")]
        message_uz: String,
        #[arg(long, default_value = "")]
        message_ru: String,
        #[arg(long, default_value = "")]
        error_message: String,
        #[arg(long, default_value = "")]
        endpoint: String,
        #[arg(long, default_value = "")]
        method: String,
        #[arg(long, default_value_t = 0)]
        status: u16,
        #[arg(long, default_value = "")]
        payload: String,
        #[arg(long, default_value = "")]
        event_type: String,
    },
    /// Publish an order notification
    Order {
        #[arg(long)]
        text: String,
        #[arg(long)]
        merchant_id: String,
    },
    /// Publish a batch of order ids to the relay queue
    Relay {
        #[arg(required = true)]
        order_ids: Vec<String>,
    },
    /// Print records arriving on the log queue until interrupted
    Tail,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(args.json_logs, args.verbose);

    info!("Loading configuration from {:?}", args.config);
    let config = Config::from_file(&args.config)
        .with_context(|| format!("failed to load configuration from {:?}", args.config))?;

    info!(
        log_queue = %config.logger.queue,
        function_name = %config.logger.function_name,
        order_queue = ?config.logger.order_queue,
        order_relay_queue = ?config.logger.order_relay_queue,
        "Configuration summary"
    );

    let transport: Arc<dyn Transport> = Arc::new(
        AmqpTransport::connect_named(&config.broker.url, config.broker.connection_name.as_deref())
            .await
            .context("failed to connect to broker")?,
    );
    let logger = Logger::new(transport.clone(), config.logger.clone())
        .await
        .context("failed to set up logger")?;

    let outcome = run(&logger, args.command).await;

    if let Err(e) = transport.close().await {
        warn!("Failed to close transport cleanly: {}", e);
    }

    outcome
}

async fn run(logger: &Logger, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Send {
            level,
            code,
            message_uz,
            message_ru,
            error_message,
            endpoint,
            method,
            status,
            payload,
            event_type,
        } => {
            let request = LogRequest {
                error_code: code,
                client_message_uz: message_uz,
                client_message_ru: message_ru,
                error_message,
                api_endpoint: endpoint,
                method,
                status_code: status,
                request_payload: payload.into(),
                event_type,
                ..Default::default()
            };
            logger
                .log(level, request)
                .await
                .context("failed to publish log record")?;
            info!("Published {} record to {}", level, logger.queue());
        }
        Command::Order { text, merchant_id } => {
            logger
                .order_notification(&OrderNotification::new(text, merchant_id))
                .await
                .context("failed to publish order notification")?;
            info!("Published order notification");
        }
        Command::Relay { order_ids } => {
            let count = order_ids.len();
            logger
                .send_order_relay(&OrderRelayBatch { order_ids })
                .await
                .context("failed to publish order relay batch")?;
            info!("Published relay batch of {} orders", count);
        }
        Command::Tail => tail(logger).await?,
    }
    Ok(())
}

async fn tail(logger: &Logger) -> anyhow::Result<()> {
    let subscription = logger
        .transport()
        .consume(
            logger.queue(),
            Box::new(|body: Bytes| match LogRecord::from_json(&body) {
                Ok(record) => println!(
                    "{} [{}] {} {} {}: {}",
                    record.timestamp.to_rfc3339(),
                    record.error_level,
                    record.error_code,
                    record.function_name,
                    record.api_endpoint,
                    if record.error_message.is_empty() {
                        &record.client_message_ru
                    } else {
                        &record.error_message
                    }
                ),
                Err(e) => error!("Skipping malformed record: {}", e),
            }),
        )
        .await
        .context("failed to consume log queue")?;

    info!("Tailing {}, press Ctrl+C to stop", logger.queue());
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;

    info!("Shutdown requested");
    subscription.cancel();
    subscription.join().await;
    Ok(())
}

fn init_logging(json: bool, verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("mq_logger=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mq_logger=info,warn"))
    };

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
