//! Authentication claims carried by access tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Actor, SubScopeId, TenantId, UserId};

/// JWT claims for access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: UserId,
    /// Tenant the token is scoped to.
    pub tenant: TenantId,
    /// Optional sub-scope (sub-account) inside the tenant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<SubScopeId>,
    /// Roles held inside the tenant.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Issued at timestamp.
    pub iat: i64,
    /// Expiration timestamp.
    pub exp: i64,
}

impl Claims {
    /// Creates new claims for a user acting inside a tenant.
    #[must_use]
    pub fn new(
        user_id: UserId,
        tenant_id: TenantId,
        roles: Vec<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            tenant: tenant_id,
            scope: None,
            roles,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        }
    }

    /// Narrows the claims to a sub-scope.
    #[must_use]
    pub fn with_scope(mut self, scope: SubScopeId) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Returns the user ID from claims.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.sub
    }

    /// Returns the tenant ID from claims.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        self.tenant
    }

    /// Returns the audit actor for this token.
    #[must_use]
    pub const fn actor(&self) -> Actor {
        Actor::User(self.sub)
    }

    /// Returns true if the token carries the role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}
