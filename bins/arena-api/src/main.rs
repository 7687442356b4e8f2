mod error;
mod handlers;
mod metrics;
mod routes;

use anyhow::Context;
use arena_common::config::AppConfig;
use arena_common::redis::RedisStore;
use arena_judge::{Executor, Judge0Client, LanguageResolver, PollPolicy, Stores};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub struct AppState {
    pub executor: Executor,
    pub stores: Stores,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    init_tracing(config.json_logs);

    info!("Arena API booting...");

    let languages = LanguageResolver::load_or_default(&config.languages_config)
        .with_context(|| format!("loading languages from {}", config.languages_config))?;
    info!(count = languages.languages().len(), "Languages loaded");

    let store = RedisStore::connect(&config.redis_url)
        .await
        .context("connecting to Redis")?;
    info!("Connected to Redis: {}", config.redis_url);

    let backend = Judge0Client::new(&config.backend).context("building Judge0 client")?;
    info!(backend = %config.backend.base_url, "Execution backend configured");

    let stores = Stores::shared(store);
    let executor = Executor::new(
        Arc::new(backend),
        stores.clone(),
        languages,
        PollPolicy::from(config.poll),
    );

    let state = Arc::new(AppState { executor, stores });

    let app = Router::new().merge(routes::routes()).with_state(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;

    info!("HTTP server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Arena API stopped");
    Ok(())
}
