//! FX revaluation batches and settlements.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use ledgerline_shared::types::{Actor, FiscalPeriodId, OpenItemId, TenantId};

use super::{GlEngine, append_audit};
use crate::audit::{AuditAction, AuditEntityType, AuditEvent, AuditRecorder};
use crate::error::{GlError, GlResult};
use crate::fx::{
    BatchStatus, FxError, FxRevaluationBatch, FxRevaluationService, OpenItem,
    RevaluationInput, RevaluationMethod, RevaluationScope, SettlementInput,
};
use crate::ports::LedgerTx;

/// Parameters of a revaluation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevaluationCommand {
    /// Revaluation date; rates effective on this date apply.
    pub date: NaiveDate,
    /// Rate selection method.
    pub method: RevaluationMethod,
    /// Currencies and accounts in scope.
    #[serde(default)]
    pub scope: RevaluationScope,
    /// Compute without writing anything.
    #[serde(default = "default_preview")]
    pub preview: bool,
}

const fn default_preview() -> bool {
    true
}

/// Parameters of a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementCommand {
    /// Item being settled.
    pub open_item_id: OpenItemId,
    /// Base-currency units per unit of the item's currency at settlement.
    pub rate: Decimal,
    /// Settlement date.
    pub date: NaiveDate,
}

impl GlEngine {
    /// Revalues the tenant's open foreign-currency items.
    ///
    /// In preview mode nothing is written and re-running yields the same
    /// batch. In post mode the batch, its consolidated adjustment entry, the
    /// items' new carrying amounts and the audit entry commit together; a
    /// second post for the same scope, date and method is rejected.
    ///
    /// # Errors
    ///
    /// - `Validation` if no period is open on the date or a rate is invalid
    /// - `NotFound` if a qualifying currency has no rate
    /// - `Conflict` if the batch was already posted
    /// - `Permission` when posting without the admin role
    pub async fn run_fx_revaluation(
        &self,
        tenant: TenantId,
        actor: Actor,
        command: &RevaluationCommand,
    ) -> GlResult<FxRevaluationBatch> {
        if !command.preview {
            self.ensure_admin(tenant, actor, "post FX revaluation").await?;
        }
        let period = self.fx_period(tenant, command.date).await?;

        let mut tx = self.store.begin(tenant).await?;
        let items = tx.open_items().await?;

        let base = self.policy.base_currency;
        let mut rates = HashMap::new();
        for item in FxRevaluationService::qualifying(&items, base, command.date, &command.scope) {
            if !rates.contains_key(&item.currency) {
                let rate = self
                    .collaborators
                    .rates
                    .rate(tenant, item.currency, base, command.date, command.method.rate_type())
                    .await?;
                rates.insert(item.currency, rate);
            }
        }

        let now = Utc::now();
        let service = FxRevaluationService::new(self.policy.tolerance);
        let mut batch = service.revalue(
            &RevaluationInput {
                tenant_id: tenant,
                base_currency: base,
                date: command.date,
                method: command.method,
                scope: command.scope.clone(),
                fiscal_period_id: period,
                open_items: &items,
                actor,
            },
            |currency| rates.get(&currency).copied().flatten(),
            now,
        )?;

        if command.preview {
            info!(
                tenant_id = %tenant,
                batch_key = %batch.key,
                entries = batch.entries.len(),
                total = %batch.total_gain_loss,
                "FX revaluation previewed"
            );
            return Ok(batch);
        }

        if tx.posted_batch(&batch.key).await?.is_some() {
            return Err(FxError::BatchAlreadyPosted { key: batch.key }.into());
        }
        if batch.is_empty() {
            info!(tenant_id = %tenant, batch_key = %batch.key, "No FX positions to revalue");
            return Ok(batch);
        }

        if let Some(draft) = FxRevaluationService::revaluation_draft(&batch, &self.policy.fx_accounts) {
            let entry = self.post_generated_entry(tx.as_mut(), draft, actor).await?;
            batch.journal_entry_id = Some(entry.id);
        }
        batch.status = BatchStatus::Posted;
        tx.insert_batch(&batch).await?;
        for item in FxRevaluationService::apply_to_items(&batch, &items) {
            tx.update_open_item(&item, item.version - 1).await?;
        }
        audit_batch(tx.as_mut(), &batch, AuditAction::Revalue, actor).await?;
        tx.commit().await?;

        info!(
            tenant_id = %tenant,
            batch_id = %batch.id,
            batch_key = %batch.key,
            entries = batch.entries.len(),
            total = %batch.total_gain_loss,
            "FX revaluation posted"
        );
        Ok(batch)
    }

    /// Settles an open item at `rate`: books the realized gain or loss and
    /// reverses the unrealized adjustment accumulated so far.
    ///
    /// # Errors
    ///
    /// - `Validation` if no period is open on the date or the rate is invalid
    /// - `NotFound` for an unknown item
    /// - `Conflict` if the item is already settled
    /// - `Permission` without the admin role
    pub async fn settle_fx_position(
        &self,
        tenant: TenantId,
        actor: Actor,
        command: &SettlementCommand,
    ) -> GlResult<FxRevaluationBatch> {
        self.ensure_admin(tenant, actor, "settle FX positions").await?;
        let period = self.fx_period(tenant, command.date).await?;

        let mut tx = self.store.begin(tenant).await?;
        let item = tx
            .open_item(command.open_item_id)
            .await?
            .ok_or_else(|| GlError::not_found("open_item", command.open_item_id))?;

        let now = Utc::now();
        let settlement = FxRevaluationService::settle(
            &SettlementInput {
                item: &item,
                rate: command.rate,
                date: command.date,
                fiscal_period_id: period,
                base_currency: self.policy.base_currency,
                actor,
            },
            &self.policy.fx_accounts,
            now,
        )?;
        let mut batch = settlement.batch;
        if tx.posted_batch(&batch.key).await?.is_some() {
            return Err(FxError::BatchAlreadyPosted { key: batch.key }.into());
        }

        if let Some(draft) = settlement.draft {
            let entry = self.post_generated_entry(tx.as_mut(), draft, actor).await?;
            batch.journal_entry_id = Some(entry.id);
        }
        tx.insert_batch(&batch).await?;
        tx.update_open_item(&settlement.item, item.version).await?;
        audit_settlement(tx.as_mut(), &item, &settlement.item, actor).await?;
        tx.commit().await?;

        info!(
            tenant_id = %tenant,
            open_item_id = %item.id,
            batch_id = %batch.id,
            total = %batch.total_gain_loss,
            "FX position settled"
        );
        Ok(batch)
    }

    /// The open period containing `date`.
    async fn fx_period(&self, tenant: TenantId, date: NaiveDate) -> GlResult<FiscalPeriodId> {
        let periods = &self.collaborators.periods;
        if let Some(period) = periods.period_for_date(tenant, date).await?
            && periods.is_open_for_posting(tenant, period, date).await?
        {
            return Ok(period);
        }
        Err(FxError::ClosedPeriod { date }.into())
    }
}

async fn audit_batch(
    tx: &mut dyn LedgerTx,
    batch: &FxRevaluationBatch,
    action: AuditAction,
    actor: Actor,
) -> GlResult<()> {
    let entry = AuditRecorder::record(
        &AuditEvent {
            tenant_id: batch.tenant_id,
            entity_type: AuditEntityType::FxBatch,
            entity_id: batch.id.into_inner(),
            action,
            actor,
            previous: None::<&FxRevaluationBatch>,
            new: Some(batch),
            reason: None,
        },
        batch.created_at,
    )?;
    append_audit(tx, entry).await
}

async fn audit_settlement(
    tx: &mut dyn LedgerTx,
    before: &OpenItem,
    after: &OpenItem,
    actor: Actor,
) -> GlResult<()> {
    let entry = AuditRecorder::record(
        &AuditEvent {
            tenant_id: after.tenant_id,
            entity_type: AuditEntityType::OpenItem,
            entity_id: after.id.into_inner(),
            action: AuditAction::Settle,
            actor,
            previous: Some(before),
            new: Some(after),
            reason: None,
        },
        after.settled_at.unwrap_or_else(Utc::now),
    )?;
    append_audit(tx, entry).await
}
