//! # Teamline API Server
//!
//! REST backend for projects, tasks, comments, attachments, users and
//! a chat assistant, with an activity/notification pipeline fanning
//! committed mutations out to project members over Redis.
//!
//! ## Startup sequence
//!
//! 1. Tracing and configuration
//! 2. Database: create if missing, migrate, pool
//! 3. Redis notifier and the activity pipeline task
//! 4. External clients: identity provider, object store, generation API
//! 5. Router and HTTP server; ctrl-c shuts down gracefully
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p teamline-api
//! ```

use std::sync::Arc;
use teamline_api::app::{build_router, AppState};
use teamline_api::config::Config;
use teamline_shared::assistant::{GeminiClient, GeminiConfig};
use teamline_shared::db::migrations::{ensure_database_exists, run_migrations};
use teamline_shared::db::pool::{create_pool, DatabaseConfig};
use teamline_shared::events::{ActivityPipeline, EventBus};
use teamline_shared::identity::{KeycloakClient, KeycloakConfig};
use teamline_shared::notify::{RedisNotifier, RedisNotifierConfig};
use teamline_shared::storage::{S3Config, S3ObjectStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "teamline_api=debug,teamline_shared=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Teamline API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;

    // Database
    ensure_database_exists(&config.database.url).await?;
    let pool = create_pool(DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..Default::default()
    })
    .await?;
    run_migrations(&pool).await?;

    // Notification transport and the activity pipeline
    let notifier = RedisNotifier::connect(RedisNotifierConfig::from_env()?).await?;
    let (events, events_rx) = EventBus::new();
    let pipeline = ActivityPipeline::new(pool.clone(), Arc::new(notifier));
    let pipeline_handle = pipeline.spawn(events_rx);

    // External collaborators
    let identity = Arc::new(KeycloakClient::new(KeycloakConfig::from_env()?));
    let storage = Arc::new(S3ObjectStore::new(S3Config::from_env()?));
    let assistant = Arc::new(GeminiClient::new(GeminiConfig::from_env()?));

    let state = AppState::new(pool, config.clone(), events, storage, identity, assistant);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    tracing::info!("Server listening on http://{}", config.bind_address());

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received, exiting...");
        })
        .await?;

    // Dropping the last EventBus clone ends the pipeline loop.
    pipeline_handle.abort();

    Ok(())
}
