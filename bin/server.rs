// Credit Plans - Web Server
// REST API with Axum

use anyhow::{Context, Result};
use rusqlite::Connection;

use credit_plans::api::{app, AppState};
use credit_plans::config::Config;
use credit_plans::logging::init_tracing;
use credit_plans::setup_database;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let conn = Connection::open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path))?;
    setup_database(&conn)?;
    tracing::info!("Database opened: {}", config.db_path);

    let router = app(AppState::new(conn), &config);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.listen_addr))?;
    tracing::info!("Listening on {}", config.listen_addr);

    axum::serve(listener, router).await?;
    Ok(())
}
