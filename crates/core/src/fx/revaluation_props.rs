//! Property tests for FX revaluation.

use chrono::{NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

use ledgerline_shared::types::{
    AccountId, Actor, CurrencyCode, FiscalPeriodId, JournalEntryId, JournalLineId, OpenItemId,
    TenantId,
};

use super::revaluation::{FxRevaluationService, RevaluationInput, SettlementInput};
use super::types::{FxAccounts, OpenItem, RevaluationMethod, RevaluationScope};
use crate::currency::CurrencyService;
use crate::journal::{JournalEntryDraft, SubledgerKind, SubledgerLink};

fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (-1_000_000i64..1_000_000i64)
        .prop_filter("non-zero", |v| *v != 0)
        .prop_map(|cents| Decimal::new(cents, 2))
}

fn rate_strategy() -> impl Strategy<Value = Decimal> {
    (5_000i64..20_000i64).prop_map(|r| Decimal::new(r, 4))
}

fn item(tenant: TenantId, account: AccountId, amount: Decimal, rate: Decimal) -> OpenItem {
    let base = CurrencyService::convert(amount, rate);
    OpenItem {
        id: OpenItemId::new(),
        tenant_id: tenant,
        account_id: account,
        source_entry_id: JournalEntryId::new(),
        source_line_id: JournalLineId::new(),
        subledger: SubledgerLink {
            kind: SubledgerKind::Receivable,
            reference: "INV".to_string(),
        },
        currency: CurrencyCode::EUR,
        amount,
        original_rate: rate,
        original_base_amount: base,
        carrying_base_amount: base,
        opened_on: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        settled_at: None,
        version: 1,
    }
}

fn balanced(draft: &JournalEntryDraft) -> bool {
    let debits: Decimal = draft.lines.iter().map(|l| l.debit).sum();
    let credits: Decimal = draft.lines.iter().map(|l| l.credit).sum();
    debits == credits
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// The same inputs always produce the same batch, ids included.
    #[test]
    fn prop_preview_is_deterministic(
        amounts in prop::collection::vec(amount_strategy(), 1..8),
        booked in rate_strategy(),
        closing in rate_strategy(),
    ) {
        let tenant = TenantId::new();
        let items: Vec<OpenItem> = amounts
            .into_iter()
            .map(|a| item(tenant, AccountId::new(), a, booked))
            .collect();
        let run = RevaluationInput {
            tenant_id: tenant,
            base_currency: CurrencyCode::USD,
            date: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
            method: RevaluationMethod::ClosingRate,
            scope: RevaluationScope::default(),
            fiscal_period_id: FiscalPeriodId::new(),
            open_items: &items,
            actor: Actor::System,
        };
        let now = Utc.with_ymd_and_hms(2026, 1, 31, 0, 0, 0).unwrap();
        let service = FxRevaluationService::default();

        let first = service.revalue(&run, |_| Some(closing), now).unwrap();
        let second = service.revalue(&run, |_| Some(closing), now).unwrap();

        prop_assert_eq!(first, second);
    }

    /// The consolidated adjustment entry always balances exactly.
    #[test]
    fn prop_revaluation_draft_balances(
        amounts in prop::collection::vec(amount_strategy(), 1..8),
        booked in rate_strategy(),
        closing in rate_strategy(),
    ) {
        let tenant = TenantId::new();
        let accounts = [AccountId::new(), AccountId::new()];
        let items: Vec<OpenItem> = amounts
            .into_iter()
            .enumerate()
            .map(|(i, a)| item(tenant, accounts[i % 2], a, booked))
            .collect();
        let run = RevaluationInput {
            tenant_id: tenant,
            base_currency: CurrencyCode::USD,
            date: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
            method: RevaluationMethod::ClosingRate,
            scope: RevaluationScope::default(),
            fiscal_period_id: FiscalPeriodId::new(),
            open_items: &items,
            actor: Actor::System,
        };
        let batch = FxRevaluationService::default()
            .revalue(&run, |_| Some(closing), Utc::now())
            .unwrap();

        if let Some(draft) = FxRevaluationService::revaluation_draft(&batch, &FxAccounts::default()) {
            prop_assert!(balanced(&draft));
        }
    }

    /// Settlement entries balance and the realized result is measured
    /// against the original booking, whatever was revalued in between.
    #[test]
    fn prop_settlement_balances(
        amount in amount_strategy(),
        booked in rate_strategy(),
        revalued in rate_strategy(),
        settled in rate_strategy(),
    ) {
        let mut open = item(TenantId::new(), AccountId::new(), amount, booked);
        open.carrying_base_amount = CurrencyService::convert(amount, revalued);

        let settlement = FxRevaluationService::settle(
            &SettlementInput {
                item: &open,
                rate: settled,
                date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
                fiscal_period_id: FiscalPeriodId::new(),
                base_currency: CurrencyCode::USD,
                actor: Actor::System,
            },
            &FxAccounts::default(),
            Utc::now(),
        )
        .unwrap();

        prop_assert_eq!(
            settlement.batch.total_gain_loss,
            CurrencyService::convert(amount, settled) - open.original_base_amount
        );
        if let Some(draft) = settlement.draft {
            prop_assert!(balanced(&draft));
        }
    }
}
