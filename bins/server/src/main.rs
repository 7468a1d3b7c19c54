//! Ledgerline API Server
//!
//! Main entry point for the posting and approval service.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use ledgerline_api::{AppState, create_router};
use ledgerline_core::{GlEngine, LedgerPolicy};
use ledgerline_db::{PgStore, collaborators, connect};
use ledgerline_shared::{AppConfig, jwt::JwtService, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = connect(&config.database).await?;
    let policy = LedgerPolicy::from(&config);
    info!(
        base_currency = %policy.base_currency,
        auto_post_on_approval = policy.auto_post_on_approval,
        max_lines = policy.max_lines,
        "Posting policy loaded"
    );

    let engine = GlEngine::new(policy, Arc::new(PgStore::new(db.clone())), collaborators(&db));
    let state = AppState {
        engine: Arc::new(engine),
        jwt_service: Arc::new(JwtService::new(&config.jwt)),
    };

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
