//! Builds audit entries and answers trail queries.
//!
//! Writing is the store's job: the entry produced here is inserted in the
//! same transaction as the change it describes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ledgerline_shared::types::{Actor, AuditEntryId, PageRequest, PageResponse, TenantId};

use super::error::AuditError;
use super::types::{AuditAction, AuditEntityType, AuditEntry};

/// What changed, as handed to [`AuditRecorder::record`].
#[derive(Debug, Clone, Copy)]
pub struct AuditEvent<'a, P, N> {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Kind of record.
    pub entity_type: AuditEntityType,
    /// Record id.
    pub entity_id: Uuid,
    /// Action.
    pub action: AuditAction,
    /// Actor.
    pub actor: Actor,
    /// State before.
    pub previous: Option<&'a P>,
    /// State after.
    pub new: Option<&'a N>,
    /// Reason, when the action takes one.
    pub reason: Option<&'a str>,
}

/// Stateless audit entry builder.
pub struct AuditRecorder;

impl AuditRecorder {
    /// Captures an event as an audit entry.
    ///
    /// # Errors
    ///
    /// `Serialization` if either snapshot cannot be converted to JSON.
    pub fn record<P: Serialize, N: Serialize>(
        event: &AuditEvent<'_, P, N>,
        now: DateTime<Utc>,
    ) -> Result<AuditEntry, AuditError> {
        let previous = event.previous.map(serde_json::to_value).transpose()?;
        let new = event.new.map(serde_json::to_value).transpose()?;
        Ok(AuditEntry {
            id: AuditEntryId::new(),
            tenant_id: event.tenant_id,
            entity_type: event.entity_type,
            entity_id: event.entity_id,
            action: event.action,
            actor: event.actor,
            previous,
            new,
            reason: event.reason.map(str::to_string),
            created_at: now,
        })
    }

    /// Filters and pages entries newest first.
    #[must_use]
    pub fn search(
        entries: impl IntoIterator<Item = AuditEntry>,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> PageResponse<AuditEntry> {
        let mut matching: Vec<AuditEntry> =
            entries.into_iter().filter(|e| filter.matches(e)).collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        PageResponse::from_sorted(matching, page)
    }
}

/// Audit trail query. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFilter {
    /// Kind of record.
    pub entity_type: Option<AuditEntityType>,
    /// Record id.
    pub entity_id: Option<Uuid>,
    /// Actor.
    pub actor: Option<Actor>,
    /// Action.
    pub action: Option<AuditAction>,
    /// Case-insensitive text searched in the reason and snapshots.
    pub text: Option<String>,
    /// Inclusive lower bound.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound.
    pub to: Option<DateTime<Utc>>,
}

impl AuditFilter {
    /// Returns true if `entry` satisfies every set criterion.
    #[must_use]
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.entity_type.is_none_or(|t| t == entry.entity_type)
            && self.entity_id.is_none_or(|id| id == entry.entity_id)
            && self.actor.is_none_or(|a| a == entry.actor)
            && self.action.is_none_or(|a| a == entry.action)
            && self.from.is_none_or(|from| entry.created_at >= from)
            && self.to.is_none_or(|to| entry.created_at < to)
            && self.text.as_deref().is_none_or(|text| Self::mentions(entry, text))
    }

    fn mentions(entry: &AuditEntry, text: &str) -> bool {
        let needle = text.to_lowercase();
        entry
            .reason
            .as_deref()
            .is_some_and(|r| r.to_lowercase().contains(&needle))
            || [&entry.previous, &entry.new]
                .into_iter()
                .flatten()
                .any(|v| v.to_string().to_lowercase().contains(&needle))
    }
}
