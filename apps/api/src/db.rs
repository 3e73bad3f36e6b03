use std::time::Duration;

use anyhow::{Context, Result};
use bson::doc;
use mongodb::{options::ClientOptions, Client, Database};
use tracing::info;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Connects to MongoDB and verifies the connection with a ping.
pub async fn connect(uri: &str, db_name: &str) -> Result<Database> {
    info!("Connecting to MongoDB...");

    let mut options = ClientOptions::parse(uri)
        .await
        .context("Invalid MONGODB_URI")?;
    // Fail fast instead of hanging when the server is unreachable
    options.server_selection_timeout = Some(CONNECT_TIMEOUT);
    options.connect_timeout = Some(CONNECT_TIMEOUT);
    options.app_name = Some(env!("CARGO_PKG_NAME").to_string());

    let client = Client::with_options(options).context("Failed to build MongoDB client")?;

    let db = client.database(db_name);
    db.run_command(doc! { "ping": 1 })
        .await
        .context("MongoDB ping failed")?;

    info!("Connected to MongoDB database '{db_name}'");
    Ok(db)
}
