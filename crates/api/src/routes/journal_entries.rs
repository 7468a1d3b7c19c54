//! Journal entry routes: drafting, the posting lifecycle and reversal.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use ledgerline_core::journal::{EntryKind, JournalEntryDraft, JournalLineInput};
use ledgerline_shared::types::{
    CurrencyCode, FiscalPeriodId, JournalEntryId, SubScopeId,
};

use super::{json, optional_json, parse_id};
use crate::error::ApiResult;
use crate::{AppState, middleware::AuthUser};

/// Creates the journal entry routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/journal-entries", post(create_entry))
        .route("/journal-entries/{id}", get(get_entry).put(update_entry))
        .route("/journal-entries/{id}/submit", post(submit_entry))
        .route("/journal-entries/{id}/post", post(post_entry))
        .route("/journal-entries/{id}/reverse", post(reverse_entry))
        .route("/journal-entries/{id}/void", post(void_entry))
        .route("/journal-entries/{id}/recall", post(recall_entry))
}

// ============================================================================
// Request Types
// ============================================================================

/// Body of create and update.
#[derive(Debug, Deserialize)]
pub struct JournalEntryRequest {
    /// Target fiscal period.
    pub fiscal_period_id: FiscalPeriodId,
    /// Entry date.
    pub entry_date: NaiveDate,
    /// Classification.
    #[serde(default = "default_kind")]
    pub kind: EntryKind,
    /// Sub-scope; defaults to the token's.
    #[serde(default)]
    pub sub_scope_id: Option<SubScopeId>,
    /// Originating module.
    #[serde(default = "default_source_module")]
    pub source_module: String,
    /// Originating document reference.
    #[serde(default)]
    pub source_document: Option<String>,
    /// Description.
    pub description: String,
    /// Notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Transaction currency.
    pub currency: CurrencyCode,
    /// Base-currency units per transaction-currency unit.
    #[serde(default = "default_rate")]
    pub exchange_rate: Decimal,
    /// Lines in order.
    pub lines: Vec<JournalLineInput>,
    /// Expected version, checked on update.
    #[serde(default)]
    pub version: Option<i64>,
}

const fn default_kind() -> EntryKind {
    EntryKind::Normal
}

fn default_source_module() -> String {
    "gl".to_string()
}

const fn default_rate() -> Decimal {
    Decimal::ONE
}

impl JournalEntryRequest {
    fn into_draft(self, auth: &AuthUser) -> JournalEntryDraft {
        JournalEntryDraft {
            tenant_id: auth.claims().tenant_id(),
            sub_scope_id: self.sub_scope_id.or_else(|| auth.scope()),
            fiscal_period_id: self.fiscal_period_id,
            entry_date: self.entry_date,
            kind: self.kind,
            source_module: self.source_module,
            source_document: self.source_document,
            description: self.description,
            notes: self.notes,
            currency: self.currency,
            exchange_rate: self.exchange_rate,
            lines: self.lines,
            created_by: auth.actor(),
        }
    }
}

/// Optional body of submit and post.
#[derive(Debug, Default, Deserialize)]
pub struct VersionRequest {
    /// Expected version.
    #[serde(default)]
    pub version: Option<i64>,
}

/// Body of void and recall.
#[derive(Debug, Default, Deserialize)]
pub struct ReasonRequest {
    /// Why.
    #[serde(default)]
    pub reason: String,
    /// Expected version.
    #[serde(default)]
    pub version: Option<i64>,
}

/// Body of reverse.
#[derive(Debug, Deserialize)]
pub struct ReverseRequest {
    /// Date of the mirror entry.
    pub reversal_date: NaiveDate,
    /// Why.
    #[serde(default)]
    pub reason: String,
    /// Expected version.
    #[serde(default)]
    pub version: Option<i64>,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/journal-entries` - Create a DRAFT entry.
async fn create_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let request: JournalEntryRequest = json(&body)?;
    let entry = state
        .engine
        .create_journal_entry(auth.caller(), request.into_draft(&auth))
        .await?;
    info!(entry_id = %entry.id, tenant_id = %entry.tenant_id, "Journal entry created");
    Ok((StatusCode::CREATED, Json(entry)))
}

/// GET `/journal-entries/{id}` - Load an entry with its lines.
async fn get_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id: JournalEntryId = parse_id(&id, "journal entry")?;
    let entry = state.engine.get_journal_entry(auth.caller(), id).await?;
    Ok(Json(entry))
}

/// PUT `/journal-entries/{id}` - Replace a DRAFT entry's contents.
async fn update_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let id: JournalEntryId = parse_id(&id, "journal entry")?;
    let request: JournalEntryRequest = json(&body)?;
    let version = request.version;
    let entry = state
        .engine
        .update_journal_entry(auth.caller(), id, request.into_draft(&auth), version)
        .await?;
    Ok(Json(entry))
}

/// POST `/journal-entries/{id}/submit` - Submit for approval.
async fn submit_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let id: JournalEntryId = parse_id(&id, "journal entry")?;
    let request: VersionRequest = optional_json(&body)?;
    let submission = state
        .engine
        .submit_journal_entry(auth.caller(), id, request.version)
        .await?;
    Ok(Json(submission))
}

/// POST `/journal-entries/{id}/post` - Post an APPROVED entry.
async fn post_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let id: JournalEntryId = parse_id(&id, "journal entry")?;
    let request: VersionRequest = optional_json(&body)?;
    let entry = state
        .engine
        .post_journal_entry(auth.caller(), id, request.version)
        .await?;
    Ok(Json(entry))
}

/// POST `/journal-entries/{id}/reverse` - Post the mirror of a POSTED entry.
async fn reverse_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let id: JournalEntryId = parse_id(&id, "journal entry")?;
    let request: ReverseRequest = json(&body)?;
    let reversed = state
        .engine
        .reverse_journal_entry(
            auth.caller(),
            id,
            request.reversal_date,
            &request.reason,
            request.version,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(reversed)))
}

/// POST `/journal-entries/{id}/void` - Void an unposted entry.
async fn void_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let id: JournalEntryId = parse_id(&id, "journal entry")?;
    let request: ReasonRequest = optional_json(&body)?;
    let entry = state
        .engine
        .void_journal_entry(auth.caller(), id, &request.reason, request.version)
        .await?;
    Ok(Json(entry))
}

/// POST `/journal-entries/{id}/recall` - Withdraw a pending submission.
async fn recall_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let id: JournalEntryId = parse_id(&id, "journal entry")?;
    let request: ReasonRequest = optional_json(&body)?;
    let entry = state
        .engine
        .recall_journal_entry(auth.caller(), id, &request.reason, request.version)
        .await?;
    Ok(Json(entry))
}
