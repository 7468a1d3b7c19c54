//! Approval routes: decisions on requests and workflow definitions.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use ledgerline_core::approval::{ApprovalStep, ApprovalWorkflow, ApproverSpec, EscalationAction, RuleType};
use ledgerline_core::engine::JOURNAL_DOCUMENT;
use ledgerline_shared::types::{
    ApprovalRequestId, ApprovalStepId, ApprovalWorkflowId, CurrencyCode, UserId,
};

use super::{json, optional_json, parse_id};
use crate::error::ApiResult;
use crate::{AppState, middleware::AuthUser};

/// Creates the approval routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/approval-requests/{id}", get(get_request))
        .route("/approval-requests/{id}/approve", post(approve_request))
        .route("/approval-requests/{id}/reject", post(reject_request))
        .route("/approval-requests/{id}/delegate", post(delegate_request))
        .route("/approval-requests/{id}/history", get(request_history))
        .route("/approval-workflows", post(define_workflow))
}

// ============================================================================
// Request Types
// ============================================================================

/// Optional body of approve.
#[derive(Debug, Default, Deserialize)]
pub struct ApproveRequest {
    /// Free-text notes.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Body of reject.
#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    /// Why; required.
    #[serde(default)]
    pub reason: String,
}

/// Body of delegate.
#[derive(Debug, Deserialize)]
pub struct DelegateRequest {
    /// New approver.
    pub to: UserId,
    /// Why.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Body of workflow definition.
#[derive(Debug, Deserialize)]
pub struct WorkflowRequest {
    /// Display name, unique among active workflows.
    pub name: String,
    /// Document type the workflow governs.
    #[serde(default = "default_document_type")]
    pub document_type: String,
    /// How steps combine.
    pub rule_type: RuleType,
    /// Lower amount bound, inclusive.
    #[serde(default)]
    pub min_amount: Option<Decimal>,
    /// Upper amount bound, exclusive.
    #[serde(default)]
    pub max_amount: Option<Decimal>,
    /// Currency the bounds are expressed in.
    #[serde(default)]
    pub currency: Option<CurrencyCode>,
    /// Lowest value wins when several workflows match.
    #[serde(default)]
    pub priority: i32,
    /// Inactive workflows are never selected.
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Requests expire after this many hours.
    #[serde(default)]
    pub expiry_hours: Option<u32>,
    /// Steps in order.
    pub steps: Vec<StepRequest>,
}

/// One step of a workflow definition.
#[derive(Debug, Deserialize)]
pub struct StepRequest {
    /// 1-based position.
    pub step_order: u32,
    /// Display name.
    pub name: String,
    /// Who may decide.
    pub approvers: ApproverSpec,
    /// Quorum; `None` means every resolved approver.
    #[serde(default)]
    pub required_approvals: Option<u32>,
    /// Lower amount bound, inclusive.
    #[serde(default)]
    pub min_amount: Option<Decimal>,
    /// Upper amount bound, exclusive.
    #[serde(default)]
    pub max_amount: Option<Decimal>,
    /// Currency the bounds are expressed in.
    #[serde(default)]
    pub currency: Option<CurrencyCode>,
    /// Hours before the escalation action applies.
    #[serde(default)]
    pub escalation_hours: Option<u32>,
    /// What the sweep does with an overdue step.
    #[serde(default)]
    pub escalation_action: Option<EscalationAction>,
}

fn default_document_type() -> String {
    JOURNAL_DOCUMENT.to_string()
}

const fn default_active() -> bool {
    true
}

impl WorkflowRequest {
    fn into_workflow(self, auth: &AuthUser) -> ApprovalWorkflow {
        ApprovalWorkflow {
            id: ApprovalWorkflowId::new(),
            tenant_id: auth.claims().tenant_id(),
            name: self.name,
            document_type: self.document_type,
            rule_type: self.rule_type,
            min_amount: self.min_amount,
            max_amount: self.max_amount,
            currency: self.currency,
            priority: self.priority,
            is_active: self.is_active,
            expiry_hours: self.expiry_hours,
            steps: self
                .steps
                .into_iter()
                .map(|s| ApprovalStep {
                    id: ApprovalStepId::new(),
                    step_order: s.step_order,
                    name: s.name,
                    approvers: s.approvers,
                    required_approvals: s.required_approvals,
                    min_amount: s.min_amount,
                    max_amount: s.max_amount,
                    currency: s.currency,
                    escalation_hours: s.escalation_hours,
                    escalation_action: s.escalation_action,
                })
                .collect(),
        }
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET `/approval-requests/{id}`
async fn get_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id: ApprovalRequestId = parse_id(&id, "approval request")?;
    let request = state.engine.get_approval_request(auth.caller(), id).await?;
    Ok(Json(request))
}

/// POST `/approval-requests/{id}/approve`
async fn approve_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let id: ApprovalRequestId = parse_id(&id, "approval request")?;
    let request: ApproveRequest = optional_json(&body)?;
    let approved = state
        .engine
        .approve_request(auth.caller(), id, request.notes)
        .await?;
    Ok(Json(approved))
}

/// POST `/approval-requests/{id}/reject`
async fn reject_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let id: ApprovalRequestId = parse_id(&id, "approval request")?;
    let request: RejectRequest = optional_json(&body)?;
    let rejected = state
        .engine
        .reject_request(auth.caller(), id, request.reason)
        .await?;
    Ok(Json(rejected))
}

/// POST `/approval-requests/{id}/delegate`
async fn delegate_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let id: ApprovalRequestId = parse_id(&id, "approval request")?;
    let request: DelegateRequest = json(&body)?;
    let delegated = state
        .engine
        .delegate_request(auth.caller(), id, request.to, request.reason)
        .await?;
    Ok(Json(delegated))
}

/// GET `/approval-requests/{id}/history` - Oldest first.
async fn request_history(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id: ApprovalRequestId = parse_id(&id, "approval request")?;
    let history = state.engine.approval_history(auth.caller(), id).await?;
    Ok(Json(history))
}

/// POST `/approval-workflows` - Ledger admins only.
async fn define_workflow(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let request: WorkflowRequest = json(&body)?;
    let workflow = state
        .engine
        .define_workflow(auth.caller(), request.into_workflow(&auth))
        .await?;
    info!(workflow_id = %workflow.id, name = %workflow.name, "Approval workflow defined");
    Ok((StatusCode::CREATED, Json(workflow)))
}
