//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST routes over the ledger engine
//! - Bearer-token authentication middleware
//! - The JSON error envelope

pub mod error;
pub mod middleware;
pub mod routes;

use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use ledgerline_core::GlEngine;
use ledgerline_shared::jwt::JwtService;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Posting and approval engine.
    pub engine: Arc<GlEngine>,
    /// JWT service for token validation.
    pub jwt_service: Arc<JwtService>,
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::api_routes_with_state(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
