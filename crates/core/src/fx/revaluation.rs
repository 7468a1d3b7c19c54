//! Period-end FX revaluation and settlement.
//!
//! For every qualifying open item, `delta = revalued_base - carrying_base`.
//! Deltas stay UNREALIZED until the item settles; settlement books the
//! REALIZED result against the original booking and reverses whatever
//! unrealized adjustment had accumulated.
//!
//! Computation is pure and deterministic: running the same inputs twice
//! yields identical batches, ids included.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use ledgerline_shared::types::{AccountId, Actor, CurrencyCode, FiscalPeriodId, TenantId};

use super::error::FxError;
use super::types::{
    BatchKey, BatchKind, BatchStatus, FxAccounts, FxRevaluationBatch, FxRevaluationEntry,
    GainLossTag, OpenItem, RevaluationMethod, RevaluationScope,
};
use crate::currency::{BalanceTolerance, CurrencyService};
use crate::journal::{AccountRef, EntryKind, JournalEntryDraft, JournalLineInput};

/// Input for a revaluation run.
#[derive(Debug, Clone)]
pub struct RevaluationInput<'a> {
    /// Tenant.
    pub tenant_id: TenantId,
    /// Tenant base currency.
    pub base_currency: CurrencyCode,
    /// Revaluation date.
    pub date: NaiveDate,
    /// Method.
    pub method: RevaluationMethod,
    /// Scope.
    pub scope: RevaluationScope,
    /// Period containing `date`.
    pub fiscal_period_id: FiscalPeriodId,
    /// Candidate items (filtered here).
    pub open_items: &'a [OpenItem],
    /// Who runs the batch.
    pub actor: Actor,
}

/// Input for settling one item.
#[derive(Debug, Clone)]
pub struct SettlementInput<'a> {
    /// The item.
    pub item: &'a OpenItem,
    /// Settlement rate.
    pub rate: Decimal,
    /// Settlement date.
    pub date: NaiveDate,
    /// Period containing `date`.
    pub fiscal_period_id: FiscalPeriodId,
    /// Tenant base currency.
    pub base_currency: CurrencyCode,
    /// Who settles.
    pub actor: Actor,
}

/// Result of settling one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    /// Settlement batch holding the realized and reversal entries.
    pub batch: FxRevaluationBatch,
    /// The item, now settled.
    pub item: OpenItem,
    /// Adjustment entry; `None` when nothing moved.
    pub draft: Option<JournalEntryDraft>,
}

/// FX revaluation calculator.
#[derive(Debug, Clone, Copy, Default)]
pub struct FxRevaluationService {
    tolerance: BalanceTolerance,
}

impl FxRevaluationService {
    /// Creates a service; deltas within `tolerance` are treated as noise.
    #[must_use]
    pub const fn new(tolerance: BalanceTolerance) -> Self {
        Self { tolerance }
    }

    /// Items a run over `scope` at `date` will consider.
    pub fn qualifying<'a>(
        items: &'a [OpenItem],
        base_currency: CurrencyCode,
        date: NaiveDate,
        scope: &'a RevaluationScope,
    ) -> impl Iterator<Item = &'a OpenItem> + 'a {
        items.iter().filter(move |item| {
            item.is_open()
                && item.currency != base_currency
                && item.opened_on <= date
                && scope.includes(item.currency, item.account_id)
        })
    }

    /// Computes a PREVIEW batch.
    ///
    /// # Errors
    ///
    /// `MissingRate` when a qualifying item's currency has no rate;
    /// `InvalidRate` for a non-positive rate.
    pub fn revalue<R>(
        &self,
        input: &RevaluationInput<'_>,
        rate_for: R,
        now: DateTime<Utc>,
    ) -> Result<FxRevaluationBatch, FxError>
    where
        R: Fn(CurrencyCode) -> Option<Decimal>,
    {
        let key = BatchKey::revaluation(&input.scope, input.date, input.method);
        let batch_id = FxRevaluationBatch::id_for(input.tenant_id, &key);

        let mut entries = Vec::new();
        for item in Self::qualifying(
            input.open_items,
            input.base_currency,
            input.date,
            &input.scope,
        ) {
            let rate = rate_for(item.currency).ok_or(FxError::MissingRate {
                currency: item.currency,
                date: input.date,
            })?;
            if rate <= Decimal::ZERO {
                return Err(FxError::InvalidRate { rate });
            }

            let revalued = CurrencyService::convert(item.amount, rate);
            let delta = revalued - item.carrying_base_amount;
            if self.tolerance.within(delta) {
                continue;
            }
            entries.push(FxRevaluationEntry {
                id: FxRevaluationBatch::entry_id_for(batch_id, item.id, GainLossTag::Unrealized),
                batch_id,
                open_item_id: item.id,
                account_id: item.account_id,
                currency: item.currency,
                amount: item.amount,
                original_base_amount: item.carrying_base_amount,
                revaluation_rate: rate,
                revalued_base_amount: revalued,
                gain_loss: delta,
                tag: GainLossTag::Unrealized,
            });
        }

        let total_gain_loss = entries.iter().map(|e| e.gain_loss).sum();
        Ok(FxRevaluationBatch {
            id: batch_id,
            tenant_id: input.tenant_id,
            kind: BatchKind::Revaluation,
            key,
            revaluation_date: input.date,
            method: input.method,
            scope: input.scope.clone(),
            fiscal_period_id: input.fiscal_period_id,
            base_currency: input.base_currency,
            entries,
            total_gain_loss,
            status: BatchStatus::Preview,
            journal_entry_id: None,
            created_by: input.actor,
            created_at: now,
        })
    }

    /// The consolidated adjustment entry for a batch: net delta per account
    /// against the unrealized gain or loss account. `None` when the batch
    /// nets to nothing.
    #[must_use]
    pub fn revaluation_draft(
        batch: &FxRevaluationBatch,
        accounts: &FxAccounts,
    ) -> Option<JournalEntryDraft> {
        let mut per_account: Vec<(AccountId, Decimal)> = Vec::new();
        for entry in &batch.entries {
            match per_account.iter_mut().find(|(a, _)| *a == entry.account_id) {
                Some((_, net)) => *net += entry.gain_loss,
                None => per_account.push((entry.account_id, entry.gain_loss)),
            }
        }

        let mut lines: Vec<JournalLineInput> = per_account
            .into_iter()
            .filter_map(|(account, net)| {
                signed_line(AccountRef::Id(account), net, "Unrealized FX revaluation")
            })
            .collect();

        let total: Decimal = batch.entries.iter().map(|e| e.gain_loss).sum();
        let gain_loss_account = if total > Decimal::ZERO {
            &accounts.unrealized_gain
        } else {
            &accounts.unrealized_loss
        };
        lines.extend(signed_line(
            AccountRef::Code(gain_loss_account.clone()),
            -total,
            "Unrealized FX gain/loss",
        ));

        if lines.len() < 2 {
            return None;
        }
        Some(JournalEntryDraft {
            tenant_id: batch.tenant_id,
            sub_scope_id: None,
            fiscal_period_id: batch.fiscal_period_id,
            entry_date: batch.revaluation_date,
            kind: EntryKind::Revaluation,
            source_module: "fx".to_string(),
            source_document: Some(batch.key.to_string()),
            description: format!(
                "FX revaluation {} ({})",
                batch.revaluation_date, batch.method
            ),
            notes: None,
            currency: batch.base_currency,
            exchange_rate: Decimal::ONE,
            lines,
            created_by: batch.created_by,
        })
    }

    /// Items after a posted batch: carrying amounts moved to the revalued
    /// amounts.
    #[must_use]
    pub fn apply_to_items(batch: &FxRevaluationBatch, items: &[OpenItem]) -> Vec<OpenItem> {
        batch
            .entries
            .iter()
            .filter_map(|entry| {
                let item = items.iter().find(|i| i.id == entry.open_item_id)?;
                let mut next = item.clone();
                next.carrying_base_amount = entry.revalued_base_amount;
                next.version += 1;
                Some(next)
            })
            .collect()
    }

    /// Settles an item: REALIZED result against the original booking plus a
    /// reversal of the accumulated unrealized adjustment.
    ///
    /// # Errors
    ///
    /// `ItemSettled` or `InvalidRate`.
    pub fn settle(
        input: &SettlementInput<'_>,
        accounts: &FxAccounts,
        now: DateTime<Utc>,
    ) -> Result<Settlement, FxError> {
        let item = input.item;
        if !item.is_open() {
            return Err(FxError::ItemSettled { item: item.id });
        }
        if input.rate <= Decimal::ZERO {
            return Err(FxError::InvalidRate { rate: input.rate });
        }

        let settled = CurrencyService::convert(item.amount, input.rate);
        let realized = settled - item.original_base_amount;
        let unrealized = item.accumulated_unrealized();

        let key = BatchKey::settlement(item.id);
        let batch_id = FxRevaluationBatch::id_for(item.tenant_id, &key);
        let mut entries = vec![FxRevaluationEntry {
            id: FxRevaluationBatch::entry_id_for(batch_id, item.id, GainLossTag::Realized),
            batch_id,
            open_item_id: item.id,
            account_id: item.account_id,
            currency: item.currency,
            amount: item.amount,
            original_base_amount: item.original_base_amount,
            revaluation_rate: input.rate,
            revalued_base_amount: settled,
            gain_loss: realized,
            tag: GainLossTag::Realized,
        }];
        if !unrealized.is_zero() {
            entries.push(FxRevaluationEntry {
                id: FxRevaluationBatch::entry_id_for(batch_id, item.id, GainLossTag::Unrealized),
                batch_id,
                open_item_id: item.id,
                account_id: item.account_id,
                currency: item.currency,
                amount: item.amount,
                original_base_amount: item.carrying_base_amount,
                revaluation_rate: item.original_rate,
                revalued_base_amount: item.original_base_amount,
                gain_loss: -unrealized,
                tag: GainLossTag::Unrealized,
            });
        }

        let batch = FxRevaluationBatch {
            id: batch_id,
            tenant_id: item.tenant_id,
            kind: BatchKind::Settlement,
            key,
            revaluation_date: input.date,
            method: RevaluationMethod::OpenItem,
            scope: RevaluationScope {
                currencies: vec![item.currency],
                accounts: vec![item.account_id],
            },
            fiscal_period_id: input.fiscal_period_id,
            base_currency: input.base_currency,
            entries,
            total_gain_loss: realized,
            status: BatchStatus::Posted,
            journal_entry_id: None,
            created_by: input.actor,
            created_at: now,
        };

        let unrealized_account = if unrealized > Decimal::ZERO {
            &accounts.unrealized_gain
        } else {
            &accounts.unrealized_loss
        };
        let realized_account = if realized > Decimal::ZERO {
            &accounts.realized_gain
        } else {
            &accounts.realized_loss
        };
        let lines: Vec<JournalLineInput> = [
            signed_line(
                AccountRef::Id(item.account_id),
                settled - item.carrying_base_amount,
                "FX settlement",
            ),
            signed_line(
                AccountRef::Code(unrealized_account.clone()),
                unrealized,
                "Reverse unrealized FX",
            ),
            signed_line(
                AccountRef::Code(realized_account.clone()),
                -realized,
                "Realized FX gain/loss",
            ),
        ]
        .into_iter()
        .flatten()
        .collect();

        let draft = (lines.len() >= 2).then(|| JournalEntryDraft {
            tenant_id: item.tenant_id,
            sub_scope_id: None,
            fiscal_period_id: input.fiscal_period_id,
            entry_date: input.date,
            kind: EntryKind::Revaluation,
            source_module: "fx".to_string(),
            source_document: Some(item.subledger.to_string()),
            description: format!("FX settlement of {}", item.subledger),
            notes: None,
            currency: input.base_currency,
            exchange_rate: Decimal::ONE,
            lines,
            created_by: input.actor,
        });

        let mut settled_item = item.clone();
        settled_item.carrying_base_amount = settled;
        settled_item.settled_at = Some(now);
        settled_item.version += 1;

        Ok(Settlement {
            batch,
            item: settled_item,
            draft,
        })
    }
}

/// A debit for a positive amount, a credit for a negative one, nothing
/// for zero.
fn signed_line(account: AccountRef, signed: Decimal, description: &str) -> Option<JournalLineInput> {
    let mut line = match signed.cmp(&Decimal::ZERO) {
        std::cmp::Ordering::Greater => JournalLineInput::debit(account, signed),
        std::cmp::Ordering::Less => JournalLineInput::credit(account, -signed),
        std::cmp::Ordering::Equal => return None,
    };
    line.description = Some(description.to_string());
    Some(line)
}

#[cfg(test)]
#[path = "revaluation_tests.rs"]
mod tests;
