//! Approval workflow engine.
//!
//! Stateless and document-agnostic: it only ever sees a `DocumentRef`.
//! Every operation takes the current request and returns the next one plus
//! the history rows describing the change; persisting both is the caller's
//! job. Approvers of a step are resolved when the step becomes current.

use chrono::{DateTime, Utc};

use ledgerline_shared::types::{Actor, ApprovalRequestId, TenantId, UserId};

use super::error::ApprovalError;
use super::resolver::{ApproverResolver, IdentitySnapshot, ResolutionContext};
use super::types::{
    ApprovalAction, ApprovalHistoryEntry, ApprovalRequest, ApprovalStatus, ApprovalWorkflow,
    Delegation, DocumentRef, EscalationAction, HistoryAction, RuleType, StepProgress, after_hours,
};

/// Approver lookup facilities for one call.
#[derive(Clone, Copy)]
pub struct Approvers<'a> {
    /// Resolution strategy.
    pub resolver: &'a dyn ApproverResolver,
    /// Tenant identities.
    pub identities: &'a IdentitySnapshot,
}

/// Input for creating a request.
#[derive(Debug, Clone)]
pub struct NewRequest<'a> {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Selected workflow; `None` yields an automatic zero-step approval.
    pub workflow: Option<&'a ApprovalWorkflow>,
    /// Document being approved.
    pub document: DocumentRef,
    /// Submitter.
    pub submitter: Actor,
}

/// A request after a state change, with the history rows to append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// The new request state.
    pub request: ApprovalRequest,
    /// History rows describing the change, oldest first.
    pub history: Vec<ApprovalHistoryEntry>,
}

/// Result of `act`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActOutcome {
    /// The request changed.
    Applied(Transition),
    /// A repeated or late approval; nothing changed.
    AlreadySatisfied,
}

/// What the escalation sweep did to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationKind {
    /// The request passed its expiry.
    Expired,
    /// The overdue step was approved automatically.
    AutoApproved,
    /// The request was rejected automatically.
    AutoRejected,
    /// The step was widened to more approvers.
    Escalated,
    /// The step was flagged only.
    Notified,
}

/// Result of one escalation evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Escalation {
    /// What happened.
    pub kind: EscalationKind,
    /// The new state and its history.
    pub transition: Transition,
}

/// Stateless approval workflow engine.
pub struct ApprovalEngine;

impl ApprovalEngine {
    /// Picks the active workflow matching the document with the lowest
    /// priority value.
    #[must_use]
    pub fn select_workflow<'a>(
        workflows: &'a [ApprovalWorkflow],
        document: &DocumentRef,
    ) -> Option<&'a ApprovalWorkflow> {
        workflows
            .iter()
            .filter(|w| w.matches(document))
            .min_by_key(|w| w.priority)
    }

    /// Checks a workflow definition before it is stored.
    ///
    /// # Errors
    ///
    /// Returns `ApprovalError::InvalidWorkflow` describing the first problem.
    pub fn validate_workflow(workflow: &ApprovalWorkflow) -> Result<(), ApprovalError> {
        let invalid = |msg: String| -> Result<(), ApprovalError> { Err(ApprovalError::InvalidWorkflow(msg)) };

        if workflow.name.trim().is_empty() {
            return invalid("name is required".to_string());
        }
        if workflow.document_type.trim().is_empty() {
            return invalid("document type is required".to_string());
        }
        if let (Some(min), Some(max)) = (workflow.min_amount, workflow.max_amount)
            && min >= max
        {
            return invalid(format!("amount band [{min}, {max}) is empty"));
        }

        let mut orders = Vec::with_capacity(workflow.steps.len());
        for step in &workflow.steps {
            if step.step_order == 0 {
                return invalid(format!("step '{}' must have a positive order", step.name));
            }
            if orders.contains(&step.step_order) {
                return invalid(format!("duplicate step order {}", step.step_order));
            }
            orders.push(step.step_order);

            if step.required_approvals == Some(0) {
                return invalid(format!("step {} requires zero approvals", step.step_order));
            }
            if let (Some(min), Some(max)) = (step.min_amount, step.max_amount)
                && min >= max
            {
                return invalid(format!(
                    "step {} amount band [{min}, {max}) is empty",
                    step.step_order
                ));
            }
        }
        Ok(())
    }

    /// Creates a request for a document.
    ///
    /// A workflow with no applicable steps (or no workflow at all) yields a
    /// request that is APPROVED immediately.
    ///
    /// # Errors
    ///
    /// Returns `ApprovalError::NoEligibleApprovers` if the first step
    /// resolves to nobody.
    pub fn create_request(
        input: NewRequest<'_>,
        approvers: Approvers<'_>,
        now: DateTime<Utc>,
    ) -> Result<Transition, ApprovalError> {
        let (workflow_id, rule_type, steps, expires_at) = match input.workflow {
            Some(w) => (
                Some(w.id),
                w.rule_type,
                w.applicable_steps(&input.document),
                w.expiry_hours.map(|h| after_hours(now, h)),
            ),
            None => (None, RuleType::Any, Vec::new(), None),
        };

        let mut request = ApprovalRequest {
            id: ApprovalRequestId::new(),
            tenant_id: input.tenant_id,
            workflow_id,
            rule_type,
            document: input.document,
            status: ApprovalStatus::Pending,
            current_step: 0,
            steps,
            progress: Vec::new(),
            delegations: Vec::new(),
            submitted_by: input.submitter,
            submitted_at: now,
            completed_by: None,
            completed_at: None,
            due_at: None,
            expires_at,
            version: 1,
        };

        if request.steps.is_empty() {
            let submitted = request.clone();
            request.status = ApprovalStatus::Approved;
            request.completed_by = Some(Actor::System);
            request.completed_at = Some(now);
            request.expires_at = None;
            let history = vec![
                ApprovalHistoryEntry::record(
                    None,
                    &submitted,
                    input.submitter,
                    HistoryAction::Submit,
                    None,
                    now,
                ),
                ApprovalHistoryEntry::record(
                    Some(&submitted),
                    &request,
                    Actor::System,
                    HistoryAction::AutoApprove,
                    Some("no applicable approval steps".to_string()),
                    now,
                ),
            ];
            return Ok(Transition { request, history });
        }

        Self::activate(&mut request, 1, approvers, now)?;
        let history = vec![ApprovalHistoryEntry::record(
            None,
            &request,
            input.submitter,
            HistoryAction::Submit,
            None,
            now,
        )];
        Ok(Transition { request, history })
    }

    /// Applies an approver's decision.
    ///
    /// Checks run in order: reason present, request not terminal, repeated
    /// or late approval (no-op), actor eligible for the current step.
    ///
    /// # Errors
    ///
    /// - `ReasonRequired` for a rejection without a reason
    /// - `RequestTerminal` if the request is already terminal
    /// - `NotEligible` if the actor may not decide the current step
    /// - `InvalidDelegation` when delegating to oneself or a co-approver
    /// - `NoEligibleApprovers` if the next step resolves to nobody
    pub fn act(
        request: &ApprovalRequest,
        actor: UserId,
        action: ApprovalAction,
        approvers: Approvers<'_>,
        now: DateTime<Utc>,
    ) -> Result<ActOutcome, ApprovalError> {
        if let ApprovalAction::Reject { reason } = &action
            && reason.trim().is_empty()
        {
            return Err(ApprovalError::ReasonRequired { action: "reject" });
        }
        if request.status.is_terminal() {
            return Err(ApprovalError::RequestTerminal {
                status: request.status,
            });
        }

        let eligible = request.eligible_approvers();
        let is_eligible = eligible.contains(&actor);

        if let ApprovalAction::Approve { .. } = &action {
            let repeated = request
                .current_progress()
                .is_some_and(|p| p.approvals.contains(&actor));
            if repeated || (!is_eligible && Self::decided_earlier_step(request, actor)) {
                return Ok(ActOutcome::AlreadySatisfied);
            }
        }
        if !is_eligible {
            return Err(ApprovalError::NotEligible { user: actor });
        }

        let mut next = request.clone();
        let by = Actor::User(actor);
        let entry = match action {
            ApprovalAction::Approve { notes } => {
                let step_done = match Self::current_progress_mut(&mut next) {
                    Some(progress) => {
                        progress.approvals.push(actor);
                        u32::try_from(progress.approvals.len()).unwrap_or(u32::MAX)
                            >= progress.required
                    }
                    None => false,
                };
                if step_done {
                    Self::complete_step(&mut next, by, approvers, now)?;
                }
                next.version += 1;
                ApprovalHistoryEntry::record(
                    Some(request),
                    &next,
                    by,
                    HistoryAction::Approve,
                    notes,
                    now,
                )
            }
            ApprovalAction::Reject { reason } => {
                Self::finish(&mut next, ApprovalStatus::Rejected, by, now);
                next.version += 1;
                ApprovalHistoryEntry::record(
                    Some(request),
                    &next,
                    by,
                    HistoryAction::Reject,
                    Some(reason),
                    now,
                )
            }
            ApprovalAction::Delegate { to, reason } => {
                if to == actor || eligible.contains(&to) {
                    return Err(ApprovalError::InvalidDelegation { to });
                }
                next.delegations.push(Delegation {
                    step_order: request
                        .current_step_config()
                        .map_or(0, |s| s.step_order),
                    from: actor,
                    to,
                    reason: reason.clone(),
                    at: now,
                });
                next.status = ApprovalStatus::Delegated;
                next.version += 1;
                let mut entry = ApprovalHistoryEntry::record(
                    Some(request),
                    &next,
                    by,
                    HistoryAction::Delegate,
                    reason,
                    now,
                );
                entry.delegate_to = Some(to);
                entry
            }
        };

        Ok(ActOutcome::Applied(Transition {
            request: next,
            history: vec![entry],
        }))
    }

    /// Withdraws an open request.
    ///
    /// # Errors
    ///
    /// `ReasonRequired` for an empty reason, `RequestTerminal` if the request
    /// is already terminal.
    pub fn recall(
        request: &ApprovalRequest,
        actor: Actor,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Transition, ApprovalError> {
        if reason.trim().is_empty() {
            return Err(ApprovalError::ReasonRequired { action: "recall" });
        }
        if request.status.is_terminal() {
            return Err(ApprovalError::RequestTerminal {
                status: request.status,
            });
        }

        let mut next = request.clone();
        Self::finish(&mut next, ApprovalStatus::Recalled, actor, now);
        next.version += 1;
        let entry = ApprovalHistoryEntry::record(
            Some(request),
            &next,
            actor,
            HistoryAction::Recall,
            Some(reason.to_string()),
            now,
        );
        Ok(Transition {
            request: next,
            history: vec![entry],
        })
    }

    /// Evaluates expiry and the current step's escalation window.
    ///
    /// Each step's escalation action is applied at most once, so repeated
    /// sweeps over the same request are no-ops.
    ///
    /// # Errors
    ///
    /// `NoEligibleApprovers` if an auto-approved step hands over to a step
    /// that resolves to nobody.
    pub fn escalate(
        request: &ApprovalRequest,
        approvers: Approvers<'_>,
        now: DateTime<Utc>,
    ) -> Result<Option<Escalation>, ApprovalError> {
        if request.status.is_terminal() {
            return Ok(None);
        }

        if request.expires_at.is_some_and(|at| at <= now) {
            let mut next = request.clone();
            Self::finish(&mut next, ApprovalStatus::Expired, Actor::System, now);
            next.version += 1;
            let entry = ApprovalHistoryEntry::record(
                Some(request),
                &next,
                Actor::System,
                HistoryAction::Expire,
                Some("approval window expired".to_string()),
                now,
            );
            return Ok(Some(Escalation {
                kind: EscalationKind::Expired,
                transition: Transition {
                    request: next,
                    history: vec![entry],
                },
            }));
        }

        let overdue = request
            .current_progress()
            .is_some_and(|p| !p.escalated && p.due_at.is_some_and(|due| due <= now));
        if !overdue {
            return Ok(None);
        }

        let action = request
            .current_step_config()
            .and_then(|s| s.escalation_action.clone())
            .unwrap_or(EscalationAction::NotifyOnly);

        let mut next = request.clone();
        if let Some(progress) = Self::current_progress_mut(&mut next) {
            progress.escalated = true;
        }

        let (kind, history_action, reason) = match action {
            EscalationAction::AutoApprove => {
                Self::complete_step(&mut next, Actor::System, approvers, now)?;
                next.version += 1;
                (EscalationKind::AutoApproved, HistoryAction::AutoApprove, None)
            }
            EscalationAction::AutoReject => {
                Self::finish(&mut next, ApprovalStatus::Rejected, Actor::System, now);
                next.version += 1;
                (
                    EscalationKind::AutoRejected,
                    HistoryAction::AutoReject,
                    Some("escalation window elapsed".to_string()),
                )
            }
            EscalationAction::EscalateTo { approvers: spec } => {
                let added = {
                    let prior = next.prior_approvers();
                    let context = ResolutionContext {
                        submitter: next.submitted_by,
                        document: &next.document,
                        identities: approvers.identities,
                        prior_approvers: &prior,
                    };
                    approvers.resolver.resolve(&spec, &context)
                };
                if let Some(progress) = Self::current_progress_mut(&mut next) {
                    for user in added {
                        if !progress.approvers.contains(&user) {
                            progress.approvers.push(user);
                        }
                    }
                }
                next.status = ApprovalStatus::Escalated;
                next.version += 1;
                (EscalationKind::Escalated, HistoryAction::Escalate, None)
            }
            EscalationAction::NotifyOnly => {
                next.status = ApprovalStatus::Escalated;
                next.version += 1;
                (EscalationKind::Notified, HistoryAction::Escalate, None)
            }
        };

        let entry = ApprovalHistoryEntry::record(
            Some(request),
            &next,
            Actor::System,
            history_action,
            reason,
            now,
        );
        Ok(Some(Escalation {
            kind,
            transition: Transition {
                request: next,
                history: vec![entry],
            },
        }))
    }

    fn decided_earlier_step(request: &ApprovalRequest, actor: UserId) -> bool {
        request
            .progress
            .iter()
            .filter(|p| p.is_complete())
            .any(|p| p.eligible(&request.delegations).contains(&actor))
    }

    fn current_progress_mut(request: &mut ApprovalRequest) -> Option<&mut StepProgress> {
        let order = request.current_step_config()?.step_order;
        request.progress.iter_mut().find(|p| p.step_order == order)
    }

    fn finish(
        request: &mut ApprovalRequest,
        status: ApprovalStatus,
        actor: Actor,
        now: DateTime<Utc>,
    ) {
        request.status = status;
        request.completed_by = Some(actor);
        request.completed_at = Some(now);
        request.due_at = None;
    }

    /// Marks the current step complete and either activates the next one or
    /// approves the request.
    fn complete_step(
        request: &mut ApprovalRequest,
        actor: Actor,
        approvers: Approvers<'_>,
        now: DateTime<Utc>,
    ) -> Result<(), ApprovalError> {
        if let Some(progress) = Self::current_progress_mut(request) {
            progress.completed_at = Some(now);
        }

        if request.current_step < request.total_steps() {
            Self::activate(request, request.current_step + 1, approvers, now)?;
            request.status = ApprovalStatus::Pending;
        } else {
            Self::finish(request, ApprovalStatus::Approved, actor, now);
        }
        Ok(())
    }

    fn activate(
        request: &mut ApprovalRequest,
        position: u32,
        approvers: Approvers<'_>,
        now: DateTime<Utc>,
    ) -> Result<(), ApprovalError> {
        let Some(step) = usize::try_from(position)
            .ok()
            .and_then(|p| p.checked_sub(1))
            .and_then(|i| request.steps.get(i))
            .cloned()
        else {
            return Ok(());
        };

        let resolved = {
            let prior = request.prior_approvers();
            let context = ResolutionContext {
                submitter: request.submitted_by,
                document: &request.document,
                identities: approvers.identities,
                prior_approvers: &prior,
            };
            approvers.resolver.resolve(&step.approvers, &context)
        };
        if resolved.is_empty() {
            return Err(ApprovalError::NoEligibleApprovers {
                step_order: step.step_order,
            });
        }

        let count = u32::try_from(resolved.len()).unwrap_or(u32::MAX);
        let due_at = step.escalation_hours.map(|h| after_hours(now, h));
        request.progress.push(StepProgress {
            step_order: step.step_order,
            approvers: resolved,
            required: request.rule_type.quorum(step.required_approvals, count),
            approvals: Vec::new(),
            activated_at: now,
            due_at,
            escalated: false,
            completed_at: None,
        });
        request.current_step = position;
        request.due_at = due_at;
        Ok(())
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
