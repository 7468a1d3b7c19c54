//! Property-based tests for journal validation.
//!
//! Feature: journal-entry-model
//! Balance invariant, line invariant and reversal mirroring.

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

use ledgerline_shared::types::{AccountId, Actor, CurrencyCode, FiscalPeriodId, TenantId};

use super::reversal::{ReversalInput, ReversalService};
use super::types::{AccountRef, EntryKind, JournalEntry, JournalEntryDraft, JournalLineInput};
use super::validation::{AccountInfo, JournalValidator};

/// Strategy for positive amounts from 0.01 to 1,000,000.00.
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for exchange rates from 0.0001 to 100.
fn positive_rate() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|n| Decimal::new(n, 4))
}

fn any_account(reference: &AccountRef) -> Option<AccountInfo> {
    Some(AccountInfo {
        id: match reference {
            AccountRef::Id(id) => *id,
            AccountRef::Code(_) => AccountId::new(),
        },
        code: reference.to_string(),
        name: "Any".to_string(),
        is_active: true,
        allow_direct_posting: true,
    })
}

fn draft(currency: CurrencyCode, rate: Decimal, lines: Vec<JournalLineInput>) -> JournalEntryDraft {
    JournalEntryDraft {
        tenant_id: TenantId::new(),
        sub_scope_id: None,
        fiscal_period_id: FiscalPeriodId::new(),
        entry_date: NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
        kind: EntryKind::Normal,
        source_module: "gl".to_string(),
        source_document: None,
        description: "prop".to_string(),
        notes: None,
        currency,
        exchange_rate: rate,
        lines,
        created_by: Actor::System,
    }
}

/// Debits split across several lines, one balancing credit.
fn split_lines(amounts: &[Decimal]) -> Vec<JournalLineInput> {
    let total: Decimal = amounts.iter().copied().sum();
    let mut lines: Vec<JournalLineInput> = amounts
        .iter()
        .map(|a| JournalLineInput::debit(AccountRef::Id(AccountId::new()), *a))
        .collect();
    lines.push(JournalLineInput::credit(AccountRef::Id(AccountId::new()), total));
    lines
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Every accepted entry balances in both currencies and has one side per line.
    #[test]
    fn prop_accepted_entries_balance(
        amounts in prop::collection::vec(positive_amount(), 1..8),
        rate in positive_rate(),
    ) {
        let validator = JournalValidator::default();
        let entry = draft(CurrencyCode::EUR, rate, split_lines(&amounts));

        // Conversion rounding can legitimately push base totals apart.
        if let Ok(validated) = validator.validate(&entry, CurrencyCode::USD, true, any_account, |_| true) {
            let t = validated.totals;
            prop_assert!(validator.tolerance().is_balanced(t.debit, t.credit));
            prop_assert!(validator.tolerance().is_balanced(t.base_debit, t.base_credit));
            for line in &validated.lines {
                prop_assert!((line.debit > Decimal::ZERO) ^ (line.credit > Decimal::ZERO));
            }
        }
    }

    /// Base-currency entries with split debits always validate.
    #[test]
    fn prop_balanced_base_currency_entry_accepted(
        amounts in prop::collection::vec(positive_amount(), 1..8),
    ) {
        let entry = draft(CurrencyCode::USD, Decimal::ONE, split_lines(&amounts));
        let result = JournalValidator::default()
            .validate(&entry, CurrencyCode::USD, true, any_account, |_| true);
        prop_assert!(result.is_ok(), "expected balanced entry, got {:?}", result);
    }

    /// Skewing one side by at least the tolerance is always rejected.
    #[test]
    fn prop_unbalanced_rejected(
        amounts in prop::collection::vec(positive_amount(), 1..8),
        skew in positive_amount(),
    ) {
        let mut lines = split_lines(&amounts);
        if let Some(last) = lines.last_mut() {
            last.credit += skew;
        }
        let entry = draft(CurrencyCode::USD, Decimal::ONE, lines);
        let err = JournalValidator::default()
            .validate(&entry, CurrencyCode::USD, true, any_account, |_| true)
            .unwrap_err();
        prop_assert_eq!(err.error_code(), "UNBALANCED");
    }

    /// A line with both sides set is rejected with its line number.
    #[test]
    fn prop_both_sides_rejected(
        amounts in prop::collection::vec(positive_amount(), 2..6),
        index in 0usize..2,
    ) {
        let mut lines = split_lines(&amounts);
        lines[index].credit = lines[index].debit;
        let entry = draft(CurrencyCode::USD, Decimal::ONE, lines);
        let err = JournalValidator::default()
            .validate(&entry, CurrencyCode::USD, true, any_account, |_| true)
            .unwrap_err();
        prop_assert_eq!(err.line(), Some(u32::try_from(index + 1).unwrap()));
    }

    /// Reversal lines mirror the original and the totals swap.
    #[test]
    fn prop_reversal_is_mirror(
        amounts in prop::collection::vec(positive_amount(), 1..8),
    ) {
        let entry = draft(CurrencyCode::USD, Decimal::ONE, split_lines(&amounts));
        let validated = JournalValidator::default()
            .validate(&entry, CurrencyCode::USD, true, any_account, |_| true)
            .unwrap();
        let original = JournalEntry::new_draft(entry, validated.lines, CurrencyCode::USD, Utc::now());

        let input = ReversalInput {
            original: &original,
            reversal_date: original.entry_date,
            fiscal_period_id: original.fiscal_period_id,
            reason: "prop".to_string(),
            actor: Actor::System,
        };
        let reversal = ReversalService::build_reversal(&input, Utc::now());

        prop_assert!(ReversalService::is_mirror(&original, &reversal));
        prop_assert_eq!(reversal.totals.debit, original.totals.credit);
        prop_assert_eq!(reversal.totals.base_credit, original.totals.base_debit);
    }
}
