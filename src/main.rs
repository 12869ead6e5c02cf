use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trend_press::config::Config;
use trend_press::db::Database;
use trend_press::fetcher::FeedFetcher;
use trend_press::generator::OpenAiGenerator;
use trend_press::ingest::TrendIngestor;
use trend_press::routes::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trend_press=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path =
        std::env::var("TREND_PRESS_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path))?
        .with_env_overrides();
    info!("Loaded configuration, trends feed: {}", config.feed_url);
    if config.admin_token.is_empty() {
        warn!("No admin token configured; /api routes will reject every request");
    }
    if config.ai.api_key.is_empty() {
        warn!("No AI API key configured; article generation will fail");
    }

    // Initialize database
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:trend_press.db?mode=rwc".to_string());
    let db = Database::new(&database_url).await?;
    db.initialize().await?;
    info!("Database initialized");

    let db = Arc::new(db);

    let ingestor = Arc::new(TrendIngestor::new(
        db.clone(),
        FeedFetcher::new(config.feed_url.clone())?,
    ));
    let generator = Arc::new(OpenAiGenerator::new(&config.ai)?);

    let state = Arc::new(AppState {
        db,
        ingestor,
        generator,
        admin_token: config.admin_token.clone(),
    });

    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("Server starting on http://{}", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
