//! Typed IDs for type-safe entity references.
//!
//! A `JournalEntryId` cannot be passed where an `ApprovalRequestId` is expected,
//! even though both are UUIDs on the wire and in the database.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to generate typed ID wrappers.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new ID using UUID v7 (time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            #[must_use]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

typed_id!(TenantId, "Unique identifier for a tenant (agency or account).");
typed_id!(
    SubScopeId,
    "Unique identifier for a sub-scope (sub-account or legal entity) inside a tenant."
);
typed_id!(UserId, "Unique identifier for a user.");
typed_id!(AccountId, "Unique identifier for a chart of accounts entry.");
typed_id!(FiscalPeriodId, "Unique identifier for a fiscal period.");
typed_id!(JournalEntryId, "Unique identifier for a journal entry.");
typed_id!(JournalLineId, "Unique identifier for a journal entry line.");
typed_id!(ApprovalWorkflowId, "Unique identifier for an approval workflow.");
typed_id!(ApprovalStepId, "Unique identifier for an approval workflow step.");
typed_id!(ApprovalRequestId, "Unique identifier for an approval request.");
typed_id!(ApprovalHistoryId, "Unique identifier for an approval history entry.");
typed_id!(AuditEntryId, "Unique identifier for an audit trail entry.");
typed_id!(FxBatchId, "Unique identifier for an FX revaluation batch.");
typed_id!(FxEntryId, "Unique identifier for an FX revaluation entry.");
typed_id!(OpenItemId, "Unique identifier for an open multi-currency item.");

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
