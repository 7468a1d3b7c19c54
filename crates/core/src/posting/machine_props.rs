//! Property-based tests for the posting state machine.
//!
//! Feature: posting-lifecycle
//! Only listed transitions succeed; every success bumps the version by one.

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

use ledgerline_shared::types::{
    Actor, ApprovalRequestId, CurrencyCode, FiscalPeriodId, JournalEntryId, TenantId, UserId,
};

use super::machine::PostingStateMachine;
use crate::journal::{EntryKind, JournalEntry, JournalStatus, JournalTotals};

fn arb_status() -> impl Strategy<Value = JournalStatus> {
    prop_oneof![
        Just(JournalStatus::Draft),
        Just(JournalStatus::PendingApproval),
        Just(JournalStatus::Approved),
        Just(JournalStatus::Posted),
        Just(JournalStatus::Rejected),
        Just(JournalStatus::Void),
        Just(JournalStatus::Reversed),
    ]
}

fn entry(status: JournalStatus, version: i64) -> JournalEntry {
    let now = Utc::now();
    JournalEntry {
        id: JournalEntryId::new(),
        tenant_id: TenantId::new(),
        sub_scope_id: None,
        fiscal_period_id: FiscalPeriodId::new(),
        entry_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        kind: EntryKind::Normal,
        source_module: "gl".to_string(),
        source_document: None,
        description: String::new(),
        notes: None,
        currency: CurrencyCode::USD,
        base_currency: CurrencyCode::USD,
        exchange_rate: Decimal::ONE,
        totals: JournalTotals::default(),
        status,
        status_reason: None,
        reverses_entry_id: None,
        reversed_by_entry_id: None,
        approval_request_id: None,
        lines: Vec::new(),
        version,
        created_by: Actor::System,
        created_at: now,
        updated_by: Actor::System,
        updated_at: now,
        posted_by: None,
        posted_at: None,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_successful_transitions_are_valid_and_versioned(
        status in arb_status(),
        version in 1i64..1000,
        op in 0u8..6,
    ) {
        let e = entry(status, version);
        let actor = Actor::User(UserId::new());
        let now = Utc::now();
        let result = match op {
            0 => PostingStateMachine::submit(&e, ApprovalRequestId::new(), actor, now),
            1 => PostingStateMachine::approve(&e, actor, now),
            2 => PostingStateMachine::reject(&e, "reason", actor, now),
            3 => PostingStateMachine::post(&e, actor, now),
            4 => PostingStateMachine::reverse(&e, JournalEntryId::new(), "reason", actor, now),
            _ => PostingStateMachine::void(&e, "reason", actor, now),
        };

        match result {
            Ok(next) => {
                prop_assert!(PostingStateMachine::is_valid_transition(status, next.status));
                prop_assert_eq!(next.version, version + 1);
                prop_assert_eq!(next.lines, e.lines);
            }
            Err(_) => prop_assert!(!status.is_editable() || op != 0),
        }
    }

    #[test]
    fn prop_terminal_statuses_accept_nothing(
        status in prop_oneof![Just(JournalStatus::Void), Just(JournalStatus::Reversed)],
    ) {
        let e = entry(status, 1);
        let actor = Actor::System;
        let now = Utc::now();
        prop_assert!(PostingStateMachine::submit(&e, ApprovalRequestId::new(), actor, now).is_err());
        prop_assert!(PostingStateMachine::approve(&e, actor, now).is_err());
        prop_assert!(PostingStateMachine::post(&e, actor, now).is_err());
        prop_assert!(PostingStateMachine::reverse(&e, JournalEntryId::new(), "r", actor, now).is_err());
        prop_assert!(PostingStateMachine::void(&e, "r", actor, now).is_err());
    }
}
