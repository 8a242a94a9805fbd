mod auth;
mod config;
mod credits;
mod db;
mod errors;
mod models;
mod plans;
mod routes;
mod state;
mod users;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::JwtVerifier;
use crate::config::{Config, StoreBackend};
use crate::credits::memory::MemoryCreditStore;
use crate::credits::postgres::PgCreditStore;
use crate::credits::store::CreditStore;
use crate::db::{create_pool, run_migrations};
use crate::routes::build_router;
use crate::state::AppState;

/// Balance given to the demo user seeded into the in-memory store.
const DEMO_USER_CREDITS: i64 = 10;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting credits API v{}", env!("CARGO_PKG_VERSION"));

    let store = build_store(&config).await?;
    info!("Credit store initialized (backend: {})", store.backend_name());

    let verifier = JwtVerifier::new(&config.jwt_secret);

    let state = AppState {
        store,
        verifier,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins to the web front end's domain

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_store(config: &Config) -> Result<Arc<dyn CreditStore>> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres backend")?;
            let pool = create_pool(url, config.db_max_connections).await?;
            if config.run_migrations {
                run_migrations(&pool).await?;
            }
            Ok(Arc::new(PgCreditStore::new(pool)))
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory credit store; balances are lost on restart and not shared between instances");
            let store = MemoryCreditStore::new();
            store.insert_user("demo@localhost", DEMO_USER_CREDITS);
            Ok(Arc::new(store))
        }
    }
}
