//! FX routes: period-end revaluation and settlement of open items.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use ledgerline_core::engine::{RevaluationCommand, SettlementCommand};
use ledgerline_shared::types::OpenItemId;

use super::{json, parse_id};
use crate::error::ApiResult;
use crate::{AppState, middleware::AuthUser};

/// Creates the FX routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/fx-revaluations", post(run_revaluation))
        .route("/fx-open-items/{id}/settle", post(settle_item))
}

/// Body of settle.
#[derive(Debug, Deserialize)]
pub struct SettleRequest {
    /// Base-currency units per unit of the item's currency.
    pub rate: Decimal,
    /// Settlement date.
    pub date: NaiveDate,
}

/// POST `/fx-revaluations` - Preview by default; `"preview": false` posts
/// and needs the ledger admin role.
async fn run_revaluation(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let command: RevaluationCommand = json(&body)?;
    let batch = state
        .engine
        .run_fx_revaluation(auth.claims().tenant_id(), auth.actor(), &command)
        .await?;

    if command.preview {
        return Ok((StatusCode::OK, Json(batch)));
    }
    info!(
        batch_id = %batch.id,
        entries = batch.entries.len(),
        total_gain_loss = %batch.total_gain_loss,
        "FX revaluation posted"
    );
    Ok((StatusCode::CREATED, Json(batch)))
}

/// POST `/fx-open-items/{id}/settle` - Ledger admins only.
async fn settle_item(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let open_item_id: OpenItemId = parse_id(&id, "open item")?;
    let request: SettleRequest = json(&body)?;
    let command = SettlementCommand {
        open_item_id,
        rate: request.rate,
        date: request.date,
    };
    let batch = state
        .engine
        .settle_fx_position(auth.claims().tenant_id(), auth.actor(), &command)
        .await?;
    Ok((StatusCode::CREATED, Json(batch)))
}
