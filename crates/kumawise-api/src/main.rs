use clap::Parser;
use kumawise_api::config::ApiConfig;
use kumawise_api::state::AppState;
use kumawise_engine::config::NatsConfig;
use kumawise_engine::{telemetry, JetStreamQueue};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "kumawise-api", about = "Accepts Uptime Kuma webhooks and queues them")]
struct Cli {
    #[command(flatten)]
    api: ApiConfig,

    #[command(flatten)]
    nats: NatsConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let allow_list = cli.api.allow_list()?;

    let prometheus = PrometheusBuilder::new().install_recorder()?;
    telemetry::describe();

    info!(url = %cli.nats.url, "Connecting to NATS...");
    let nats = async_nats::connect(cli.nats.url.as_str()).await?;
    let queue = JetStreamQueue::connect(nats, &cli.nats).await?;
    info!("Connected to NATS!");

    if cli.api.webhook_token().is_none() {
        info!("WEBHOOK_TOKEN not set, webhook accepts unauthenticated calls");
    }

    let state = Arc::new(AppState {
        publisher: Arc::new(queue),
        prometheus: Some(prometheus),
        webhook_token: cli.api.webhook_token().map(String::from),
        allow_list,
    });

    let app = kumawise_api::router(state);

    let listener = tokio::net::TcpListener::bind(cli.api.bind_addr).await?;
    info!("Starting server on {}", cli.api.bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
