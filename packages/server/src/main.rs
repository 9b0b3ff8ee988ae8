// Main entry point for the extraction server

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pipeline::{Bot, MemoryStore, PipelineConfig, Runner};
use server_core::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug,pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting listing extraction server");

    let config = PipelineConfig::from_env();
    tracing::info!(model = %config.model, mock_mode = config.mock_mode, "Configuration loaded");

    let store = Arc::new(MemoryStore::new());
    seed_bots(&store);

    let runner = Runner::new(store.clone(), store.clone(), config)
        .context("Failed to build pipeline runner")?;
    let app = build_router(AppState::new(runner, store));

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let addr = format!("0.0.0.0:{port}");
    tracing::info!("Listening on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", port);
    tracing::info!("Observer stream: ws://localhost:{}/ws", port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Seed a first bot from the environment so a fresh deployment has
/// something to run (`SEED_BOT_URL`, optionally `SEED_BOT_NAME`).
fn seed_bots(store: &MemoryStore) {
    if let Ok(url) = std::env::var("SEED_BOT_URL") {
        let name = std::env::var("SEED_BOT_NAME").unwrap_or_else(|_| "seed".to_string());
        let bot = Bot::new(&name, &url);
        tracing::info!(bot = %name, id = %bot.id, url = %url, "Seeded bot from environment");
        store.add_bot(bot);
    }
}
