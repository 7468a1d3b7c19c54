//! Audit trail search.

use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    response::IntoResponse,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use ledgerline_core::audit::{AuditAction, AuditEntityType, AuditFilter};
use ledgerline_shared::types::{Actor, PageRequest, UserId};

use crate::error::{ApiError, ApiResult};
use crate::{AppState, middleware::AuthUser};

/// Creates the audit routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/audit-trail", get(search_audit_trail))
}

/// Query string of the audit search. Unset fields match everything.
#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    /// Kind of record, e.g. `journal_entry`.
    pub entity_type: Option<String>,
    /// Record id.
    pub entity_id: Option<Uuid>,
    /// A user id, or `system`.
    pub actor: Option<String>,
    /// Action, e.g. `post`.
    pub action: Option<String>,
    /// Free text searched in reasons and snapshots.
    pub q: Option<String>,
    /// Inclusive lower bound.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound.
    pub to: Option<DateTime<Utc>>,
    /// 1-based page.
    pub page: Option<u32>,
    /// Page size.
    pub per_page: Option<u32>,
}

impl AuditQuery {
    fn filter(&self) -> Result<AuditFilter, ApiError> {
        let entity_type = self
            .entity_type
            .as_deref()
            .map(|t| {
                AuditEntityType::parse(t)
                    .ok_or_else(|| ApiError::bad_request(format!("Unknown entity type '{t}'")))
            })
            .transpose()?;
        let action = self
            .action
            .as_deref()
            .map(|a| {
                AuditAction::parse(a)
                    .ok_or_else(|| ApiError::bad_request(format!("Unknown action '{a}'")))
            })
            .transpose()?;
        let actor = self.actor.as_deref().map(parse_actor).transpose()?;

        Ok(AuditFilter {
            entity_type,
            entity_id: self.entity_id,
            actor,
            action,
            text: self.q.clone(),
            from: self.from,
            to: self.to,
        })
    }

    fn page(&self) -> PageRequest {
        let default = PageRequest::default();
        PageRequest::new(
            self.page.unwrap_or(default.page),
            self.per_page.unwrap_or(default.per_page),
        )
    }
}

fn parse_actor(raw: &str) -> Result<Actor, ApiError> {
    if raw.eq_ignore_ascii_case("system") {
        return Ok(Actor::System);
    }
    raw.parse::<UserId>()
        .map(Actor::User)
        .map_err(|_| ApiError::bad_request(format!("Invalid actor '{raw}'")))
}

/// GET `/audit-trail` - Newest first.
async fn search_audit_trail(
    State(state): State<AppState>,
    auth: AuthUser,
    query: Result<Query<AuditQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let page = state
        .engine
        .search_audit_trail(auth.caller(), &query.filter()?, query.page())
        .await?;
    Ok(Json(page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("system", true)]
    #[case("SYSTEM", true)]
    #[case("0192f0c1-0000-7000-8000-000000000001", true)]
    #[case("alice", false)]
    fn test_parse_actor(#[case] raw: &str, #[case] ok: bool) {
        assert_eq!(parse_actor(raw).is_ok(), ok);
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let query = AuditQuery {
            action: Some("teleport".to_string()),
            ..AuditQuery::default()
        };
        assert!(query.filter().is_err());
    }

    #[test]
    fn test_page_defaults() {
        let page = AuditQuery::default().page();
        assert_eq!(page, PageRequest::default());
    }
}
