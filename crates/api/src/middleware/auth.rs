//! Bearer-token authentication for the ledger routes.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use ledgerline_core::Caller;
use ledgerline_shared::jwt::JwtError;
use ledgerline_shared::types::{Actor, SubScopeId};
use ledgerline_shared::{AppError, auth::Claims};

use crate::AppState;
use crate::error::ApiError;

/// Extracts the bearer token from the Authorization header.
fn extract_bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
}

/// Validates the bearer token and stores its claims in the request
/// extensions. Tokens carry the tenant, so every later query is scoped by it.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let Some(token) = auth_header.and_then(extract_bearer_token) else {
        return ApiError::from(AppError::Unauthorized(
            "Authorization header with Bearer token is required".to_string(),
        ))
        .into_response();
    };

    match state.jwt_service.validate_token(token) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => {
            debug!(error = %e, "Rejected bearer token");
            let message = match e {
                JwtError::Expired => "Token has expired",
                _ => "Invalid or malformed token",
            };
            ApiError::from(AppError::Unauthorized(message.to_string())).into_response()
        }
    }
}

/// Authenticated caller, taken from the validated claims.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    /// The caller as the engine sees it.
    #[must_use]
    pub const fn caller(&self) -> Caller {
        Caller::new(self.0.tenant_id(), self.0.user_id())
    }

    /// The caller as an audit actor.
    #[must_use]
    pub const fn actor(&self) -> Actor {
        self.0.actor()
    }

    /// Sub-scope the token is narrowed to, if any.
    #[must_use]
    pub const fn scope(&self) -> Option<SubScopeId> {
        self.0.scope
    }

    /// Returns the inner claims.
    #[must_use]
    pub const fn claims(&self) -> &Claims {
        &self.0
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
    }
}
