//! Liveness check.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use ledgerline_shared::types::CurrencyCode;

use crate::AppState;

/// Body of `GET /health`.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always `healthy` when the process answers.
    pub status: &'static str,
    /// Crate version.
    pub version: &'static str,
    /// Functional currency the engine books in.
    pub base_currency: CurrencyCode,
    /// Whether final approval posts immediately.
    pub auto_post_on_approval: bool,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let policy = state.engine.policy();
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        base_currency: policy.base_currency,
        auto_post_on_approval: policy.auto_post_on_approval,
    })
}

/// Creates the public routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
