//! Property-based tests for the approval engine.
//!
//! Feature: approval-workflow
//! Step position is monotonic and bounded; terminal requests never change.

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use ledgerline_shared::types::{
    Actor, ApprovalStepId, ApprovalWorkflowId, CurrencyCode, TenantId, UserId,
};

use super::engine::{ActOutcome, ApprovalEngine, Approvers, NewRequest};
use super::resolver::{DirectoryResolver, IdentitySnapshot, Member};
use super::types::{
    ApprovalAction, ApprovalStep, ApprovalWorkflow, ApproverSpec, DocumentRef, RuleType,
};

/// An attempted decision: which of the four users acts, and how.
#[derive(Debug, Clone, Copy)]
enum Move {
    Approve(usize),
    Reject(usize),
    Delegate(usize, usize),
}

fn arb_move() -> impl Strategy<Value = Move> {
    prop_oneof![
        6 => (0usize..4).prop_map(Move::Approve),
        1 => (0usize..4).prop_map(Move::Reject),
        1 => (0usize..4, 0usize..4).prop_map(|(a, b)| Move::Delegate(a, b)),
    ]
}

fn arb_rule() -> impl Strategy<Value = RuleType> {
    prop_oneof![
        Just(RuleType::Any),
        Just(RuleType::All),
        Just(RuleType::Sequential),
    ]
}

fn setup(rule: RuleType, users: &[UserId]) -> ApprovalWorkflow {
    let step = |order: u32, approvers: Vec<UserId>| ApprovalStep {
        id: ApprovalStepId::new(),
        step_order: order,
        name: format!("Step {order}"),
        approvers: ApproverSpec::Users { users: approvers },
        required_approvals: None,
        min_amount: None,
        max_amount: None,
        currency: None,
        escalation_hours: None,
        escalation_action: None,
    };
    ApprovalWorkflow {
        id: ApprovalWorkflowId::new(),
        tenant_id: TenantId::new(),
        name: "prop".to_string(),
        document_type: "journal_entry".to_string(),
        rule_type: rule,
        min_amount: None,
        max_amount: None,
        currency: None,
        priority: 1,
        is_active: true,
        expiry_hours: None,
        steps: vec![
            step(1, vec![users[0], users[1]]),
            step(2, vec![users[1], users[2]]),
            step(3, vec![users[3]]),
        ],
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_step_position_monotonic_and_terminal_frozen(
        rule in arb_rule(),
        moves in prop::collection::vec(arb_move(), 1..30),
    ) {
        let users: Vec<UserId> = (0..4).map(|_| UserId::new()).collect();
        let identities = IdentitySnapshot::new(
            users
                .iter()
                .map(|u| Member { user_id: *u, roles: vec![], manager_id: None, active: true })
                .collect(),
        );
        let resolver = DirectoryResolver::new();
        let approvers = Approvers { resolver: &resolver, identities: &identities };
        let workflow = setup(rule, &users);

        let mut request = ApprovalEngine::create_request(
            NewRequest {
                tenant_id: workflow.tenant_id,
                workflow: Some(&workflow),
                document: DocumentRef {
                    doc_type: "journal_entry".to_string(),
                    id: Uuid::now_v7(),
                    amount: Decimal::ONE_HUNDRED,
                    currency: CurrencyCode::USD,
                },
                submitter: Actor::System,
            },
            approvers,
            Utc::now(),
        )
        .unwrap()
        .request;

        for mv in moves {
            let (actor, action) = match mv {
                Move::Approve(a) => (users[a], ApprovalAction::Approve { notes: None }),
                Move::Reject(a) => (users[a], ApprovalAction::Reject { reason: "no".to_string() }),
                Move::Delegate(a, b) => (users[a], ApprovalAction::Delegate { to: users[b], reason: None }),
            };
            let before = request.clone();
            match ApprovalEngine::act(&request, actor, action, approvers, Utc::now()) {
                Ok(ActOutcome::Applied(t)) => {
                    prop_assert!(!before.status.is_terminal());
                    prop_assert!(t.request.current_step >= before.current_step);
                    prop_assert!(t.request.current_step <= t.request.total_steps());
                    prop_assert!(t.request.version > before.version);
                    prop_assert_eq!(t.history.len(), 1);
                    request = t.request;
                }
                Ok(ActOutcome::AlreadySatisfied) | Err(_) => {
                    prop_assert_eq!(&request, &before);
                }
            }
        }
    }
}
