use async_nats::connection::State as ConnectionState;
use clap::Parser;
use kumawise_engine::cache::{MemoryCache, NatsKvCache, StateCache};
use kumawise_engine::config::{
    CacheBackend, CacheConfig, ConnectWiseConfig, EngineConfig, NatsConfig, RetryConfig,
    WorkerConfig,
};
use kumawise_engine::queue::worker_consumer;
use kumawise_engine::{
    telemetry, ConnectWiseClient, EngineSettings, ReconciliationEngine, RetryPolicy, TaskRunner,
};
use kumawise_worker::metrics_server;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "kumawise-worker", about = "Turns queued Uptime Kuma alerts into ConnectWise tickets")]
struct Cli {
    #[arg(long = "metrics-addr", env = "METRICS_ADDR", default_value = "0.0.0.0:9100")]
    metrics_addr: SocketAddr,

    #[command(flatten)]
    nats: NatsConfig,

    #[command(flatten)]
    worker: WorkerConfig,

    #[command(flatten)]
    retry: RetryConfig,

    #[command(flatten)]
    cache: CacheConfig,

    #[command(flatten)]
    engine: EngineConfig,

    #[command(flatten)]
    connectwise: ConnectWiseConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    cli.worker.validate()?;
    cli.connectwise.validate()?;

    let prometheus = PrometheusBuilder::new().install_recorder()?;
    telemetry::describe();

    //connect to NATS
    info!(url = %cli.nats.url, "Connecting to NATS...");
    let nats = async_nats::connect(cli.nats.url.as_str()).await?;
    let jetstream = async_nats::jetstream::new(nats.clone());
    info!("Connected to NATS!");

    let cache: Arc<dyn StateCache> = match cli.cache.backend {
        CacheBackend::Nats => Arc::new(
            NatsKvCache::open(&jetstream, &cli.cache.bucket, cli.cache.ttl(), cli.cache.timeout())
                .await?,
        ),
        CacheBackend::Memory => {
            warn!("Using a process-local ticket cache; do not run more than one worker");
            Arc::new(MemoryCache::new())
        }
    };

    let tickets = Arc::new(ConnectWiseClient::new(&cli.connectwise)?);
    let settings = EngineSettings::from_config(&cli.engine, &cli.cache);
    info!(prefix = %settings.ticket_prefix, "Ticket naming configured");
    let engine = Arc::new(ReconciliationEngine::new(tickets, cache, settings));

    let consumer = worker_consumer(&jetstream, &cli.nats, &cli.worker, &cli.retry).await?;
    let runner = TaskRunner::new(
        engine,
        RetryPolicy::from(&cli.retry),
        cli.worker.concurrency,
    );

    let health_client = nats.clone();
    let app = metrics_server::build_router(prometheus, move || {
        matches!(health_client.connection_state(), ConnectionState::Connected)
    });
    let listener = tokio::net::TcpListener::bind(cli.metrics_addr).await?;
    info!("Serving metrics on {}", cli.metrics_addr);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Metrics server stopped");
        }
    });

    tokio::select! {
        result = runner.run(consumer) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
    }

    // in-flight units are redelivered after ack_wait
    info!("Worker stopped");
    Ok(())
}
