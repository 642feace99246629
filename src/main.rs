use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use webhook_sensor::config::AppConfig;
use webhook_sensor::server::{AppState, build_router};
use webhook_sensor::store::FileStore;
use webhook_sensor::transport::Connection;
use webhook_sensor::types::GitHost;
use webhook_sensor::webhooks::WebhookPipeline;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "webhook_sensor=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("loading configuration")?;

    let store = Arc::new(
        FileStore::open(&config.state_dir)
            .with_context(|| format!("opening state in {}", config.state_dir.display()))?,
    );

    let connection = Connection::connect(&config.transport)
        .await
        .context("connecting to broker")?;
    let context = Arc::new(connection.streaming_context());
    context
        .ensure_streams()
        .await
        .context("provisioning streams")?;

    let pipeline = WebhookPipeline::new(GitHost::Github, store, context);
    let app = build_router(AppState::new(pipeline));

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!("listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    connection.close().await.context("closing broker connection")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
