use super::*;
use crate::approval::resolver::{DirectoryResolver, Member};
use crate::approval::types::{ApprovalStep, ApproverSpec};
use chrono::Duration;
use ledgerline_shared::types::{ApprovalStepId, ApprovalWorkflowId, CurrencyCode};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

struct Fixture {
    tenant: TenantId,
    submitter: UserId,
    alice: UserId,
    bob: UserId,
    carol: UserId,
    identities: IdentitySnapshot,
    resolver: DirectoryResolver,
}

impl Fixture {
    fn new() -> Self {
        let (submitter, alice, bob, carol) =
            (UserId::new(), UserId::new(), UserId::new(), UserId::new());
        let member = |user, roles: &[&str], manager| Member {
            user_id: user,
            roles: roles.iter().map(ToString::to_string).collect(),
            manager_id: manager,
            active: true,
        };
        let identities = IdentitySnapshot::new(vec![
            member(submitter, &["clerk"], Some(alice)),
            member(alice, &["controller"], Some(carol)),
            member(bob, &["controller"], Some(carol)),
            member(carol, &["cfo"], None),
        ]);
        Self {
            tenant: TenantId::new(),
            submitter,
            alice,
            bob,
            carol,
            identities,
            resolver: DirectoryResolver::new(),
        }
    }

    fn approvers(&self) -> Approvers<'_> {
        Approvers {
            resolver: &self.resolver,
            identities: &self.identities,
        }
    }

    fn workflow(&self, rule: RuleType, steps: Vec<ApprovalStep>) -> ApprovalWorkflow {
        ApprovalWorkflow {
            id: ApprovalWorkflowId::new(),
            tenant_id: self.tenant,
            name: format!("{rule} workflow"),
            document_type: "journal_entry".to_string(),
            rule_type: rule,
            min_amount: None,
            max_amount: None,
            currency: None,
            priority: 10,
            is_active: true,
            expiry_hours: None,
            steps,
        }
    }

    fn create(&self, workflow: &ApprovalWorkflow, amount: Decimal) -> Transition {
        ApprovalEngine::create_request(
            NewRequest {
                tenant_id: self.tenant,
                workflow: Some(workflow),
                document: document(amount),
                submitter: Actor::User(self.submitter),
            },
            self.approvers(),
            Utc::now(),
        )
        .unwrap()
    }

    fn act(&self, request: &ApprovalRequest, user: UserId, action: ApprovalAction) -> Result<ActOutcome, ApprovalError> {
        ApprovalEngine::act(request, user, action, self.approvers(), Utc::now())
    }
}

fn document(amount: Decimal) -> DocumentRef {
    DocumentRef {
        doc_type: "journal_entry".to_string(),
        id: Uuid::now_v7(),
        amount,
        currency: CurrencyCode::USD,
    }
}

fn step(order: u32, approvers: ApproverSpec) -> ApprovalStep {
    ApprovalStep {
        id: ApprovalStepId::new(),
        step_order: order,
        name: format!("Step {order}"),
        approvers,
        required_approvals: None,
        min_amount: None,
        max_amount: None,
        currency: None,
        escalation_hours: None,
        escalation_action: None,
    }
}

fn users(list: &[UserId]) -> ApproverSpec {
    ApproverSpec::Users {
        users: list.to_vec(),
    }
}

fn approve() -> ApprovalAction {
    ApprovalAction::Approve { notes: None }
}

fn applied(outcome: ActOutcome) -> Transition {
    match outcome {
        ActOutcome::Applied(transition) => transition,
        ActOutcome::AlreadySatisfied => panic!("expected a state change"),
    }
}

#[test]
fn test_any_rule_first_approval_completes() {
    let fx = Fixture::new();
    let wf = fx.workflow(RuleType::Any, vec![step(1, users(&[fx.alice, fx.bob]))]);
    let created = fx.create(&wf, dec!(500));
    assert_eq!(created.request.status, ApprovalStatus::Pending);
    assert_eq!(created.request.current_step, 1);
    assert_eq!(created.history.len(), 1);
    assert_eq!(created.history[0].action, HistoryAction::Submit);

    let done = applied(fx.act(&created.request, fx.bob, approve()).unwrap());
    assert_eq!(done.request.status, ApprovalStatus::Approved);
    assert_eq!(done.request.completed_by, Some(Actor::User(fx.bob)));
    assert_eq!(done.request.version, created.request.version + 1);
}

#[test]
fn test_all_rule_needs_every_approver() {
    let fx = Fixture::new();
    let wf = fx.workflow(RuleType::All, vec![step(1, users(&[fx.alice, fx.bob]))]);
    let created = fx.create(&wf, dec!(500));

    let first = applied(fx.act(&created.request, fx.alice, approve()).unwrap());
    assert_eq!(first.request.status, ApprovalStatus::Pending);

    let second = applied(fx.act(&first.request, fx.bob, approve()).unwrap());
    assert_eq!(second.request.status, ApprovalStatus::Approved);
}

#[test]
fn test_all_rule_single_rejection_fails_request() {
    let fx = Fixture::new();
    let wf = fx.workflow(RuleType::All, vec![step(1, users(&[fx.alice, fx.bob]))]);
    let created = fx.create(&wf, dec!(500));
    let first = applied(fx.act(&created.request, fx.alice, approve()).unwrap());

    let rejected = applied(
        fx.act(
            &first.request,
            fx.bob,
            ApprovalAction::Reject {
                reason: "missing support".to_string(),
            },
        )
        .unwrap(),
    );
    assert_eq!(rejected.request.status, ApprovalStatus::Rejected);
    assert_eq!(rejected.history[0].reason.as_deref(), Some("missing support"));
}

#[test]
fn test_sequential_resolves_next_step_lazily() {
    let mut fx = Fixture::new();
    // Step 2 goes to whoever manages the step-1 approver.
    let identities = fx.identities.clone();
    fx.resolver = DirectoryResolver::new().with_dynamic("manager_of_prior", move |ctx| {
        ctx.prior_approvers
            .iter()
            .filter_map(|u| identities.member(*u).and_then(|m| m.manager_id))
            .collect()
    });
    let wf = fx.workflow(
        RuleType::Sequential,
        vec![
            step(
                2,
                ApproverSpec::Dynamic {
                    resolver: "manager_of_prior".to_string(),
                },
            ),
            step(
                1,
                ApproverSpec::Role {
                    role: "controller".to_string(),
                },
            ),
        ],
    );

    let created = fx.create(&wf, dec!(500));
    assert_eq!(created.request.total_steps(), 2);
    assert_eq!(created.request.progress.len(), 1);

    let step_two = applied(fx.act(&created.request, fx.bob, approve()).unwrap());
    assert_eq!(step_two.request.current_step, 2);
    assert_eq!(step_two.request.status, ApprovalStatus::Pending);
    assert_eq!(step_two.request.eligible_approvers(), vec![fx.carol]);

    let done = applied(fx.act(&step_two.request, fx.carol, approve()).unwrap());
    assert_eq!(done.request.status, ApprovalStatus::Approved);
    assert_eq!(done.request.current_step, 2);
}

#[test]
fn test_threshold_below_every_band_auto_approves() {
    let fx = Fixture::new();
    let mut high = step(1, users(&[fx.alice]));
    high.min_amount = Some(dec!(1000));
    let wf = fx.workflow(RuleType::Threshold, vec![high]);

    let created = fx.create(&wf, dec!(500));
    assert_eq!(created.request.status, ApprovalStatus::Approved);
    assert_eq!(created.request.total_steps(), 0);
    assert_eq!(created.request.current_step, 0);
    assert_eq!(
        created.history.iter().map(|h| h.action).collect::<Vec<_>>(),
        vec![HistoryAction::Submit, HistoryAction::AutoApprove]
    );
}

#[test]
fn test_no_workflow_auto_approves() {
    let fx = Fixture::new();
    let created = ApprovalEngine::create_request(
        NewRequest {
            tenant_id: fx.tenant,
            workflow: None,
            document: document(dec!(10)),
            submitter: Actor::User(fx.submitter),
        },
        fx.approvers(),
        Utc::now(),
    )
    .unwrap();
    assert_eq!(created.request.status, ApprovalStatus::Approved);
    assert!(created.request.workflow_id.is_none());
}

#[test]
fn test_unstaffed_first_step_is_an_error() {
    let fx = Fixture::new();
    let wf = fx.workflow(
        RuleType::Any,
        vec![step(
            1,
            ApproverSpec::Role {
                role: "nobody".to_string(),
            },
        )],
    );
    let err = ApprovalEngine::create_request(
        NewRequest {
            tenant_id: fx.tenant,
            workflow: Some(&wf),
            document: document(dec!(10)),
            submitter: Actor::User(fx.submitter),
        },
        fx.approvers(),
        Utc::now(),
    )
    .unwrap_err();
    assert_eq!(err, ApprovalError::NoEligibleApprovers { step_order: 1 });
}

#[test]
fn test_terminal_request_rejects_further_actions() {
    let fx = Fixture::new();
    let wf = fx.workflow(RuleType::Any, vec![step(1, users(&[fx.alice, fx.bob]))]);
    let created = fx.create(&wf, dec!(500));
    let done = applied(fx.act(&created.request, fx.alice, approve()).unwrap());

    let err = fx.act(&done.request, fx.bob, approve()).unwrap_err();
    assert_eq!(
        err,
        ApprovalError::RequestTerminal {
            status: ApprovalStatus::Approved
        }
    );
    assert_eq!(err.error_code(), "REQUEST_TERMINAL");
}

#[test]
fn test_reject_requires_reason_before_anything_else() {
    let fx = Fixture::new();
    let wf = fx.workflow(RuleType::Any, vec![step(1, users(&[fx.alice]))]);
    let created = fx.create(&wf, dec!(500));

    let err = fx
        .act(
            &created.request,
            fx.carol,
            ApprovalAction::Reject {
                reason: "   ".to_string(),
            },
        )
        .unwrap_err();
    assert_eq!(err.error_code(), "REASON_REQUIRED");
}

#[test]
fn test_ineligible_actor_rejected() {
    let fx = Fixture::new();
    let wf = fx.workflow(RuleType::Any, vec![step(1, users(&[fx.alice]))]);
    let created = fx.create(&wf, dec!(500));

    let err = fx.act(&created.request, fx.carol, approve()).unwrap_err();
    assert_eq!(err, ApprovalError::NotEligible { user: fx.carol });
}

#[test]
fn test_repeated_approval_is_noop() {
    let fx = Fixture::new();
    let wf = fx.workflow(RuleType::All, vec![step(1, users(&[fx.alice, fx.bob]))]);
    let created = fx.create(&wf, dec!(500));
    let first = applied(fx.act(&created.request, fx.alice, approve()).unwrap());

    let again = fx.act(&first.request, fx.alice, approve()).unwrap();
    assert_eq!(again, ActOutcome::AlreadySatisfied);
}

#[test]
fn test_late_approver_on_completed_step_is_noop() {
    let fx = Fixture::new();
    let wf = fx.workflow(
        RuleType::Sequential,
        vec![
            step(1, users(&[fx.alice, fx.bob])),
            step(2, users(&[fx.carol])),
        ],
    );
    let created = fx.create(&wf, dec!(500));
    let advanced = applied(fx.act(&created.request, fx.alice, approve()).unwrap());
    assert_eq!(advanced.request.current_step, 2);

    let late = fx.act(&advanced.request, fx.bob, approve()).unwrap();
    assert_eq!(late, ActOutcome::AlreadySatisfied);

    let late_reject = fx.act(
        &advanced.request,
        fx.bob,
        ApprovalAction::Reject {
            reason: "too late".to_string(),
        },
    );
    assert!(matches!(late_reject, Err(ApprovalError::NotEligible { .. })));
}

#[test]
fn test_delegation_moves_eligibility() {
    let fx = Fixture::new();
    let wf = fx.workflow(RuleType::Any, vec![step(1, users(&[fx.alice]))]);
    let created = fx.create(&wf, dec!(500));

    let delegated = applied(
        fx.act(
            &created.request,
            fx.alice,
            ApprovalAction::Delegate {
                to: fx.carol,
                reason: Some("on leave".to_string()),
            },
        )
        .unwrap(),
    );
    assert_eq!(delegated.request.status, ApprovalStatus::Delegated);
    assert_eq!(delegated.history[0].delegate_to, Some(fx.carol));
    assert_eq!(delegated.request.delegations.len(), 1);

    assert!(matches!(
        fx.act(&delegated.request, fx.alice, approve()),
        Err(ApprovalError::NotEligible { .. })
    ));

    let done = applied(fx.act(&delegated.request, fx.carol, approve()).unwrap());
    assert_eq!(done.request.status, ApprovalStatus::Approved);
}

#[test]
fn test_delegation_to_self_rejected() {
    let fx = Fixture::new();
    let wf = fx.workflow(RuleType::Any, vec![step(1, users(&[fx.alice, fx.bob]))]);
    let created = fx.create(&wf, dec!(500));

    let err = fx
        .act(
            &created.request,
            fx.alice,
            ApprovalAction::Delegate {
                to: fx.bob,
                reason: None,
            },
        )
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_DELEGATION");
}

#[test]
fn test_recall() {
    let fx = Fixture::new();
    let wf = fx.workflow(RuleType::Any, vec![step(1, users(&[fx.alice]))]);
    let created = fx.create(&wf, dec!(500));

    assert!(ApprovalEngine::recall(&created.request, Actor::User(fx.submitter), "", Utc::now()).is_err());

    let recalled =
        ApprovalEngine::recall(&created.request, Actor::User(fx.submitter), "typo", Utc::now())
            .unwrap();
    assert_eq!(recalled.request.status, ApprovalStatus::Recalled);
    assert_eq!(recalled.history[0].action, HistoryAction::Recall);

    let err = ApprovalEngine::recall(&recalled.request, Actor::System, "again", Utc::now())
        .unwrap_err();
    assert_eq!(err.error_code(), "REQUEST_TERMINAL");
}

fn escalating(fx: &Fixture, action: Option<EscalationAction>) -> ApprovalRequest {
    let mut s = step(1, users(&[fx.alice]));
    s.escalation_hours = Some(24);
    s.escalation_action = action;
    let wf = fx.workflow(RuleType::Any, vec![s, step(2, users(&[fx.bob]))]);
    fx.create(&wf, dec!(500)).request
}

#[test]
fn test_escalation_waits_for_window() {
    let fx = Fixture::new();
    let request = escalating(&fx, Some(EscalationAction::AutoReject));
    let result =
        ApprovalEngine::escalate(&request, fx.approvers(), Utc::now() + Duration::hours(1)).unwrap();
    assert!(result.is_none());
}

#[test]
fn test_escalation_auto_approve_advances_once() {
    let fx = Fixture::new();
    let request = escalating(&fx, Some(EscalationAction::AutoApprove));
    let later = Utc::now() + Duration::hours(25);

    let escalation = ApprovalEngine::escalate(&request, fx.approvers(), later)
        .unwrap()
        .unwrap();
    assert_eq!(escalation.kind, EscalationKind::AutoApproved);
    let next = escalation.transition.request;
    assert_eq!(next.current_step, 2);
    assert_eq!(next.eligible_approvers(), vec![fx.bob]);

    // Step 2 has no window; nothing more to do.
    assert!(ApprovalEngine::escalate(&next, fx.approvers(), later).unwrap().is_none());
}

#[test]
fn test_escalation_widens_approver_set() {
    let fx = Fixture::new();
    let request = escalating(
        &fx,
        Some(EscalationAction::EscalateTo {
            approvers: ApproverSpec::Role {
                role: "cfo".to_string(),
            },
        }),
    );
    let later = Utc::now() + Duration::hours(25);

    let escalation = ApprovalEngine::escalate(&request, fx.approvers(), later)
        .unwrap()
        .unwrap();
    assert_eq!(escalation.kind, EscalationKind::Escalated);
    let next = escalation.transition.request;
    assert_eq!(next.status, ApprovalStatus::Escalated);
    assert_eq!(next.eligible_approvers(), vec![fx.alice, fx.carol]);

    assert!(ApprovalEngine::escalate(&next, fx.approvers(), later).unwrap().is_none());

    let done = applied(fx.act(&next, fx.carol, approve()).unwrap());
    assert_eq!(done.request.current_step, 2);
}

#[test]
fn test_notify_only_is_default() {
    let fx = Fixture::new();
    let request = escalating(&fx, None);
    let escalation = ApprovalEngine::escalate(&request, fx.approvers(), Utc::now() + Duration::hours(30))
        .unwrap()
        .unwrap();
    assert_eq!(escalation.kind, EscalationKind::Notified);
    assert_eq!(escalation.transition.history[0].action, HistoryAction::Escalate);
}

#[test]
fn test_expiry() {
    let fx = Fixture::new();
    let mut wf = fx.workflow(RuleType::Any, vec![step(1, users(&[fx.alice]))]);
    wf.expiry_hours = Some(48);
    let request = fx.create(&wf, dec!(500)).request;

    let escalation = ApprovalEngine::escalate(&request, fx.approvers(), Utc::now() + Duration::hours(49))
        .unwrap()
        .unwrap();
    assert_eq!(escalation.kind, EscalationKind::Expired);
    assert_eq!(escalation.transition.request.status, ApprovalStatus::Expired);
    assert!(
        ApprovalEngine::escalate(&escalation.transition.request, fx.approvers(), Utc::now() + Duration::hours(50))
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_select_workflow_lowest_priority_wins() {
    let fx = Fixture::new();
    let mut broad = fx.workflow(RuleType::Any, vec![]);
    broad.priority = 50;
    let mut large = fx.workflow(RuleType::All, vec![]);
    large.priority = 5;
    large.min_amount = Some(dec!(10000));
    let mut inactive = fx.workflow(RuleType::Any, vec![]);
    inactive.priority = 1;
    inactive.is_active = false;
    let workflows = vec![broad.clone(), large.clone(), inactive];

    assert_eq!(
        ApprovalEngine::select_workflow(&workflows, &document(dec!(500))).map(|w| w.id),
        Some(broad.id)
    );
    assert_eq!(
        ApprovalEngine::select_workflow(&workflows, &document(dec!(15000))).map(|w| w.id),
        Some(large.id)
    );
    let mut other = document(dec!(15000));
    other.doc_type = "expense_claim".to_string();
    assert!(ApprovalEngine::select_workflow(&workflows, &other).is_none());
}

#[test]
fn test_validate_workflow() {
    let fx = Fixture::new();
    let good = fx.workflow(RuleType::Sequential, vec![step(1, users(&[fx.alice])), step(2, users(&[fx.bob]))]);
    assert!(ApprovalEngine::validate_workflow(&good).is_ok());

    let dup = fx.workflow(RuleType::Sequential, vec![step(1, users(&[fx.alice])), step(1, users(&[fx.bob]))]);
    assert!(matches!(
        ApprovalEngine::validate_workflow(&dup),
        Err(ApprovalError::InvalidWorkflow(msg)) if msg.contains("duplicate")
    ));

    let mut zero = step(1, users(&[fx.alice]));
    zero.required_approvals = Some(0);
    assert!(ApprovalEngine::validate_workflow(&fx.workflow(RuleType::All, vec![zero])).is_err());

    let mut band = fx.workflow(RuleType::Any, vec![]);
    band.min_amount = Some(dec!(100));
    band.max_amount = Some(dec!(100));
    assert!(ApprovalEngine::validate_workflow(&band).is_err());
}
