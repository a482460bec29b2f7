use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast;

mod auth;
mod config;
mod db;
mod engine;
mod error;
mod handlers;
mod models;
mod routes;
mod services;
mod store;

use config::Config;
use services::ConsistencyService;
use store::{EntityStore, MemoryStore, PgStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EntityStore>,
    pub consistency: ConsistencyService,
    pub config: Arc<Config>,
    pub ws_tx: Option<broadcast::Sender<String>>,
}

impl AppState {
    pub fn new(store: Arc<dyn EntityStore>, config: Arc<Config>) -> Self {
        let (ws_tx, _) = broadcast::channel::<String>(256);
        Self {
            consistency: ConsistencyService::from_config(store.clone(), &config),
            store,
            config,
            ws_tx: Some(ws_tx),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logbook_api=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    let config = Arc::new(Config::from_env().context("Invalid configuration")?);

    let store: Arc<dyn EntityStore> = match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url, config.database_max_connections)
                .await
                .context("Failed to create database pool")?;
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run database migrations")?;
            tracing::info!("Database migrations applied");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    tracing::info!(
        day_zone = ?config.day_zone,
        lookback_days = config.streak_lookback_days,
        max_history_days = config.max_history_days,
        "Consistency engine configured"
    );

    let state = AppState::new(store, config.clone());
    let app = routes::router(state);

    let addr = config.listen_addr();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
