//! Reversing entries for posted journal entries.
//!
//! A reversal is a new entry whose lines mirror the original with debit and
//! credit swapped. The original is never touched here; the posting state
//! machine marks it REVERSED in the same unit of work.

use chrono::{DateTime, NaiveDate, Utc};

use ledgerline_shared::types::{Actor, FiscalPeriodId, JournalEntryId, JournalLineId};

use super::types::{EntryKind, JournalEntry, JournalLine, JournalStatus};

/// Input for building a reversal.
#[derive(Debug, Clone)]
pub struct ReversalInput<'a> {
    /// The posted entry being reversed.
    pub original: &'a JournalEntry,
    /// Accounting date of the reversal.
    pub reversal_date: NaiveDate,
    /// Period containing `reversal_date`.
    pub fiscal_period_id: FiscalPeriodId,
    /// Why the entry is reversed.
    pub reason: String,
    /// Who reverses it.
    pub actor: Actor,
}

/// Stateless service for creating reversing entries.
pub struct ReversalService;

impl ReversalService {
    /// Builds the reversing entry, already POSTED.
    ///
    /// For each original line:
    /// - Debits become credits (document and base amounts)
    /// - Credits become debits
    /// - Account, rate, subledger link, dimensions and tax are preserved
    /// - Line numbers are kept so the pairing is obvious in a UI
    #[must_use]
    pub fn build_reversal(input: &ReversalInput<'_>, now: DateTime<Utc>) -> JournalEntry {
        let original = input.original;
        let lines: Vec<JournalLine> = original.lines.iter().map(Self::mirror_line).collect();

        JournalEntry {
            id: JournalEntryId::new(),
            tenant_id: original.tenant_id,
            sub_scope_id: original.sub_scope_id,
            fiscal_period_id: input.fiscal_period_id,
            entry_date: input.reversal_date,
            kind: EntryKind::Reversal,
            source_module: original.source_module.clone(),
            source_document: original.source_document.clone(),
            description: format!("Reversal: {}", original.description),
            notes: Some(input.reason.clone()),
            currency: original.currency,
            base_currency: original.base_currency,
            exchange_rate: original.exchange_rate,
            totals: original.totals.swapped(),
            status: JournalStatus::Posted,
            status_reason: Some(input.reason.clone()),
            reverses_entry_id: Some(original.id),
            reversed_by_entry_id: None,
            approval_request_id: None,
            lines,
            version: 1,
            created_by: input.actor,
            created_at: now,
            updated_by: input.actor,
            updated_at: now,
            posted_by: Some(input.actor),
            posted_at: Some(now),
        }
    }

    fn mirror_line(line: &JournalLine) -> JournalLine {
        JournalLine {
            id: JournalLineId::new(),
            debit: line.credit,
            credit: line.debit,
            base_debit: line.base_credit,
            base_credit: line.base_debit,
            ..line.clone()
        }
    }

    /// Returns true if `reversal` is a structural mirror of `original`.
    #[must_use]
    pub fn is_mirror(original: &JournalEntry, reversal: &JournalEntry) -> bool {
        reversal.reverses_entry_id == Some(original.id)
            && original.lines.len() == reversal.lines.len()
            && original.lines.iter().zip(&reversal.lines).all(|(o, r)| {
                o.account_id == r.account_id
                    && o.debit == r.credit
                    && o.credit == r.debit
                    && o.base_debit == r.base_credit
                    && o.base_credit == r.base_debit
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::types::{JournalTotals, SubledgerKind, SubledgerLink};
    use ledgerline_shared::types::{AccountId, CurrencyCode, TenantId, UserId};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn line(number: u32, debit: Decimal, credit: Decimal) -> JournalLine {
        JournalLine {
            id: JournalLineId::new(),
            line_number: number,
            account_id: AccountId::new(),
            description: Some("Office supplies".to_string()),
            debit,
            credit,
            base_debit: debit,
            base_credit: credit,
            exchange_rate: None,
            subledger: None,
            dimensions: vec!["dept:ops".to_string()],
            tax: None,
            intercompany: false,
            counterparty_scope_id: None,
        }
    }

    fn posted_entry() -> JournalEntry {
        let now = Utc::now();
        let actor = Actor::User(UserId::new());
        let mut lines = vec![line(1, dec!(100), Decimal::ZERO), line(2, Decimal::ZERO, dec!(100))];
        lines[1].subledger = Some(SubledgerLink {
            kind: SubledgerKind::Payable,
            reference: "BILL-7".to_string(),
        });
        JournalEntry {
            id: JournalEntryId::new(),
            tenant_id: TenantId::new(),
            sub_scope_id: None,
            fiscal_period_id: FiscalPeriodId::new(),
            entry_date: NaiveDate::from_ymd_opt(2026, 2, 10).unwrap(),
            kind: EntryKind::Normal,
            source_module: "ap".to_string(),
            source_document: Some("BILL-7".to_string()),
            description: "Supplies".to_string(),
            notes: None,
            currency: CurrencyCode::USD,
            base_currency: CurrencyCode::USD,
            exchange_rate: Decimal::ONE,
            totals: JournalTotals::of(&lines),
            status: JournalStatus::Posted,
            status_reason: None,
            reverses_entry_id: None,
            reversed_by_entry_id: None,
            approval_request_id: None,
            lines,
            version: 3,
            created_by: actor,
            created_at: now,
            updated_by: actor,
            updated_at: now,
            posted_by: Some(actor),
            posted_at: Some(now),
        }
    }

    #[test]
    fn test_reversal_swaps_every_line() {
        let original = posted_entry();
        let input = ReversalInput {
            original: &original,
            reversal_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            fiscal_period_id: FiscalPeriodId::new(),
            reason: "duplicate bill".to_string(),
            actor: Actor::User(UserId::new()),
        };

        let reversal = ReversalService::build_reversal(&input, Utc::now());

        assert!(ReversalService::is_mirror(&original, &reversal));
        assert_eq!(reversal.lines[0].credit, dec!(100));
        assert_eq!(reversal.lines[0].debit, Decimal::ZERO);
        assert_eq!(reversal.lines[1].subledger, original.lines[1].subledger);
        assert_eq!(reversal.lines[0].dimensions, original.lines[0].dimensions);
    }

    #[test]
    fn test_reversal_header() {
        let original = posted_entry();
        let input = ReversalInput {
            original: &original,
            reversal_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            fiscal_period_id: FiscalPeriodId::new(),
            reason: "duplicate bill".to_string(),
            actor: Actor::System,
        };

        let reversal = ReversalService::build_reversal(&input, Utc::now());

        assert_eq!(reversal.kind, EntryKind::Reversal);
        assert_eq!(reversal.status, JournalStatus::Posted);
        assert_eq!(reversal.reverses_entry_id, Some(original.id));
        assert_eq!(reversal.description, "Reversal: Supplies");
        assert_eq!(reversal.entry_date, input.reversal_date);
        assert_eq!(reversal.totals, original.totals.swapped());
        assert_ne!(reversal.id, original.id);
    }

    #[test]
    fn test_is_mirror_detects_tampering() {
        let original = posted_entry();
        let input = ReversalInput {
            original: &original,
            reversal_date: original.entry_date,
            fiscal_period_id: original.fiscal_period_id,
            reason: "x".to_string(),
            actor: Actor::System,
        };
        let mut reversal = ReversalService::build_reversal(&input, Utc::now());
        reversal.lines[0].credit = dec!(99);

        assert!(!ReversalService::is_mirror(&original, &reversal));
    }
}
