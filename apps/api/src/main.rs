mod auth;
mod config;
mod db;
mod email;
mod errors;
mod farmers;
mod models;
mod routes;
mod state;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::SessionValidator;
use crate::config::Config;
use crate::email::{Mailer, SendGridClient};
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{FarmerStore, MemoryFarmerStore, MongoFarmerStore};

#[tokio::main]
async fn main() -> Result<()> {
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

    info!("Starting Jasmic API v{}", env!("CARGO_PKG_VERSION"));

    let store = build_store(&config).await?;
    info!("Record store: {}", store.backend());

    let mailer = build_mailer(&config)?;

    if config.session_tokens.is_empty() {
        warn!("SESSION_TOKENS is empty; every email request will be rejected");
    }

    let state = AppState {
        store,
        mailer,
        sessions: SessionValidator::new(config.session_tokens.clone()),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the UI host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// MongoDB when configured, otherwise an in-memory store that lives as long as the process.
async fn build_store(config: &Config) -> Result<Arc<dyn FarmerStore>> {
    match &config.mongodb_uri {
        Some(uri) => {
            let db = db::connect(uri, &config.mongodb_database).await?;
            let store: Arc<dyn FarmerStore> = Arc::new(MongoFarmerStore::new(&db).await?);
            Ok(store)
        }
        None => {
            warn!("MONGODB_URI not set; records are kept in memory and lost on restart");
            let store: Arc<dyn FarmerStore> = Arc::new(MemoryFarmerStore::new());
            Ok(store)
        }
    }
}

fn build_mailer(config: &Config) -> Result<Option<Arc<dyn Mailer>>> {
    let Some(api_key) = config.sendgrid_api_key.clone() else {
        warn!("SENDGRID_API_KEY not set; the email endpoint will answer 502");
        return Ok(None);
    };

    let client: Arc<dyn Mailer> =
        Arc::new(SendGridClient::new(api_key, config.sendgrid_api_url.clone())?);
    info!("Email client initialized ({})", config.sendgrid_api_url);
    Ok(Some(client))
}
