//! Pluggable approver resolution.
//!
//! `ApproverResolver` turns an `ApproverSpec` into concrete users. The
//! default `DirectoryResolver` answers every built-in variant from an
//! `IdentitySnapshot` and dispatches `Dynamic` specs to registered closures.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ledgerline_shared::types::{Actor, UserId};

use super::types::{ApproverSpec, DocumentRef};

/// Identity facts for one tenant member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// The user.
    pub user_id: UserId,
    /// Role names held in the tenant.
    pub roles: Vec<String>,
    /// Direct manager, if any.
    pub manager_id: Option<UserId>,
    /// Inactive members are never resolved as approvers.
    pub active: bool,
}

/// Point-in-time view of a tenant's members.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySnapshot {
    /// All members.
    pub members: Vec<Member>,
}

impl IdentitySnapshot {
    /// Creates a snapshot.
    #[must_use]
    pub fn new(members: Vec<Member>) -> Self {
        Self { members }
    }

    /// Looks up a member.
    #[must_use]
    pub fn member(&self, user: UserId) -> Option<&Member> {
        self.members.iter().find(|m| m.user_id == user)
    }

    /// Whether the user is an active member.
    #[must_use]
    pub fn is_active(&self, user: UserId) -> bool {
        self.member(user).is_some_and(|m| m.active)
    }

    /// Active members holding `role` (case-insensitive).
    #[must_use]
    pub fn with_role(&self, role: &str) -> Vec<UserId> {
        self.members
            .iter()
            .filter(|m| m.active && m.roles.iter().any(|r| r.eq_ignore_ascii_case(role)))
            .map(|m| m.user_id)
            .collect()
    }

    /// Manager chain above `user`, nearest first, at most `levels` deep.
    #[must_use]
    pub fn managers_of(&self, user: UserId, levels: u8) -> Vec<UserId> {
        let mut chain = Vec::new();
        let mut current = user;
        for _ in 0..levels {
            let Some(manager) = self.member(current).and_then(|m| m.manager_id) else {
                break;
            };
            if manager == user || chain.contains(&manager) {
                break;
            }
            chain.push(manager);
            current = manager;
        }
        chain
    }
}

/// What a resolver may consult.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionContext<'a> {
    /// Who submitted the document.
    pub submitter: Actor,
    /// The document.
    pub document: &'a DocumentRef,
    /// Tenant identities.
    pub identities: &'a IdentitySnapshot,
    /// Users who approved earlier steps.
    pub prior_approvers: &'a [UserId],
}

/// Resolves the approvers of a step.
pub trait ApproverResolver: Send + Sync {
    /// Returns the users eligible for `spec`, without duplicates.
    fn resolve(&self, spec: &ApproverSpec, context: &ResolutionContext<'_>) -> Vec<UserId>;
}

type DynamicFn = dyn Fn(&ResolutionContext<'_>) -> Vec<UserId> + Send + Sync;

/// Resolver backed by an identity snapshot plus named dynamic rules.
#[derive(Clone, Default)]
pub struct DirectoryResolver {
    dynamic: HashMap<String, Arc<DynamicFn>>,
}

impl fmt::Debug for DirectoryResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryResolver")
            .field("dynamic", &self.dynamic.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DirectoryResolver {
    /// Creates a resolver without dynamic rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a named dynamic rule.
    #[must_use]
    pub fn with_dynamic<F>(mut self, name: impl Into<String>, rule: F) -> Self
    where
        F: Fn(&ResolutionContext<'_>) -> Vec<UserId> + Send + Sync + 'static,
    {
        self.dynamic.insert(name.into(), Arc::new(rule));
        self
    }
}

impl ApproverResolver for DirectoryResolver {
    fn resolve(&self, spec: &ApproverSpec, context: &ResolutionContext<'_>) -> Vec<UserId> {
        let identities = context.identities;
        let candidates = match spec {
            ApproverSpec::Users { users } => users
                .iter()
                .copied()
                .filter(|u| identities.is_active(*u))
                .collect(),
            ApproverSpec::Role { role } => identities.with_role(role),
            ApproverSpec::ManagerOfSubmitter { levels } => context
                .submitter
                .user_id()
                .map(|submitter| identities.managers_of(submitter, *levels))
                .unwrap_or_default()
                .into_iter()
                .filter(|u| identities.is_active(*u))
                .collect(),
            ApproverSpec::Dynamic { resolver } => self
                .dynamic
                .get(resolver)
                .map(|rule| rule(context))
                .unwrap_or_default(),
        };
        dedup(candidates)
    }
}

fn dedup(users: Vec<UserId>) -> Vec<UserId> {
    let mut seen = Vec::with_capacity(users.len());
    for user in users {
        if !seen.contains(&user) {
            seen.push(user);
        }
    }
    seen
}
