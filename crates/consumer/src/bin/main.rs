use anyhow::Result;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use usersync_consumer::handlers::{
    ConversationStartedHandler, ExaminerOnboardedHandler, InstitutionUserHandler,
};
use usersync_consumer::metrics::init_prometheus_exporter;
use usersync_consumer::{
    ConsumerRuntime, ExamUsageService, HandlerRegistry, KafkaEventReader,
};
use usersync_core::topics;
use usersync_datastore::{PostgresUserStore, UserStore};

#[derive(Parser, Debug)]
#[command(name = "usersync-consumer")]
#[command(about = "Consumes cross-service user events and applies them to the local store")]
struct Args {
    #[arg(long, env = "KAFKA_BOOTSTRAP_SERVERS", default_value = "localhost:9092")]
    kafka_brokers: String,

    #[arg(long, env = "KAFKA_CONSUMER_GROUP", default_value = "user-consumer")]
    kafka_group_id: String,

    /// Comma-separated list of inbound topics to subscribe to
    #[arg(
        long,
        env = "KAFKA_TOPICS",
        default_value = "institution.user.updated,conversation.started,examiner_onboarded"
    )]
    kafka_topics: String,

    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Bounded wait per poll iteration, in milliseconds
    #[arg(long, env = "CONSUMER_POLL_INTERVAL_MS", default_value = "1000")]
    poll_interval_ms: u64,

    /// Optional wall-clock budget after which the loop exits (used for
    /// batch draining)
    #[arg(long, env = "CONSUMER_RUN_DURATION_SECS")]
    run_duration_secs: Option<u64>,

    #[arg(long, env = "METRICS_ADDRESS", default_value = "0.0.0.0:9090")]
    metrics_address: SocketAddr,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => {
            warn!(
                "Invalid log level '{}', defaulting to 'info'",
                args.log_level
            );
            tracing::Level::INFO
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = init_prometheus_exporter(args.metrics_address) {
        warn!(error = %e, "Failed to start metrics exporter, continuing without it");
    }

    let inbound: Vec<String> = args
        .kafka_topics
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect();
    let inbound_refs: Vec<&str> = inbound.iter().map(String::as_str).collect();

    info!(
        kafka_brokers = %args.kafka_brokers,
        kafka_group_id = %args.kafka_group_id,
        topics = ?inbound,
        "Starting usersync consumer"
    );

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&args.database_url)
        .await?;
    let store = PostgresUserStore::new(pool);
    store.run_migrations().await?;
    let store: Arc<dyn UserStore> = Arc::new(store);

    let usage = Arc::new(ExamUsageService::new(Arc::clone(&store)));
    let registry = HandlerRegistry::new()
        .register(
            topics::INSTITUTION_USER_UPDATED,
            Arc::new(InstitutionUserHandler::new(Arc::clone(&store))),
        )
        .register(
            topics::EXAMINER_ONBOARDED,
            Arc::new(ExaminerOnboardedHandler::new(Arc::clone(&store))),
        )
        .register(
            topics::CONVERSATION_STARTED,
            Arc::new(ConversationStartedHandler::new(usage)),
        );

    let reader = KafkaEventReader::new(&args.kafka_brokers, &args.kafka_group_id, &inbound_refs)?;

    let mut runtime = ConsumerRuntime::new(reader, registry, store)
        .with_poll_interval(Duration::from_millis(args.poll_interval_ms));
    if let Some(secs) = args.run_duration_secs {
        runtime = runtime.with_run_duration(Duration::from_secs(secs));
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT"),
            _ = sigterm.recv() => info!("Received SIGTERM"),
        }
        let _ = shutdown_tx.send(true);
    });

    runtime.run(shutdown_rx).await
}
