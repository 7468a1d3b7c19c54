//! End-to-end ledger scenarios against the in-memory store.
//!
//! Each test builds a fresh tenant with a chart of accounts, an open April
//! period and two members (u1 administers the tenant), then drives
//! `GlEngine` through its public API.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use ledgerline_core::approval::{
    ApprovalStatus, ApprovalStep, ApprovalWorkflow, ApproverSpec, EscalationAction,
    IdentitySnapshot, Member, RuleType,
};
use ledgerline_core::audit::{AuditAction, AuditEntityType, AuditFilter};
use ledgerline_core::currency::{ExchangeRate, RateType};
use ledgerline_core::engine::{JOURNAL_DOCUMENT, RevaluationCommand, SettlementCommand};
use ledgerline_core::fx::{BatchStatus, GainLossTag, RevaluationMethod, RevaluationScope};
use ledgerline_core::journal::{
    AccountInfo, AccountRef, EntryKind, JournalEntryDraft, JournalLineInput, JournalStatus,
    SubledgerKind, SubledgerLink,
};
use ledgerline_core::memory::{
    MemoryStore, PeriodWindow, RecordingNotifier, StaticAccounts, StaticIdentities, StaticPeriods,
    StaticRates,
};
use ledgerline_core::{Caller, Collaborators, ErrorKind, GlEngine, LedgerPolicy};
use ledgerline_shared::types::{
    AccountId, Actor, ApprovalStepId, ApprovalWorkflowId, CurrencyCode, FiscalPeriodId,
    PageRequest, TenantId, UserId,
};

struct Ledger {
    engine: GlEngine,
    store: MemoryStore,
    periods: Arc<StaticPeriods>,
    rates: Arc<StaticRates>,
    tenant: TenantId,
    april: FiscalPeriodId,
    cash: AccountId,
    receivable: AccountId,
    revenue: AccountId,
    u1: UserId,
    u2: UserId,
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 4, d).unwrap()
}

fn account(code: &str) -> AccountInfo {
    AccountInfo {
        id: AccountId::new(),
        code: code.to_string(),
        name: format!("Account {code}"),
        is_active: true,
        allow_direct_posting: true,
    }
}

fn member(user_id: UserId, roles: &[&str]) -> Member {
    Member {
        user_id,
        roles: roles.iter().map(ToString::to_string).collect(),
        manager_id: None,
        active: true,
    }
}

fn invoice() -> SubledgerLink {
    SubledgerLink {
        kind: SubledgerKind::Receivable,
        reference: "INV-2026-0042".to_string(),
    }
}

fn ledger() -> Ledger {
    let tenant = TenantId::new();
    let april = FiscalPeriodId::new();
    let (u1, u2) = (UserId::new(), UserId::new());

    let accounts = StaticAccounts::new();
    let cash = account("1000");
    let receivable = account("1200");
    let revenue = account("4000");
    let ids = (cash.id, receivable.id, revenue.id);
    for info in [cash, receivable, revenue] {
        accounts.add_account(tenant, info);
    }
    for code in ["4910", "5910", "4920", "5920"] {
        accounts.add_account(tenant, account(code));
    }
    accounts.add_subledger(tenant, invoice());

    let periods = Arc::new(StaticPeriods::new());
    periods.add_period(
        tenant,
        PeriodWindow {
            id: april,
            start: day(1),
            end: day(30),
            open: true,
        },
    );

    let identities = StaticIdentities::new();
    identities.set(
        tenant,
        IdentitySnapshot::new(vec![
            member(u1, &["accountant", "ledger_admin"]),
            member(u2, &["accountant"]),
        ]),
    );

    let rates = Arc::new(StaticRates::new());
    let store = MemoryStore::new();
    let engine = GlEngine::new(
        LedgerPolicy::default(),
        Arc::new(store.clone()),
        Collaborators {
            accounts: Arc::new(accounts),
            periods: periods.clone(),
            identities: Arc::new(identities),
            rates: rates.clone(),
            notifier: Arc::new(RecordingNotifier::new()),
        },
    );

    Ledger {
        engine,
        store,
        periods,
        rates,
        tenant,
        april,
        cash: ids.0,
        receivable: ids.1,
        revenue: ids.2,
        u1,
        u2,
    }
}

impl Ledger {
    fn as_user(&self, user: UserId) -> Caller {
        Caller::new(self.tenant, user)
    }

    fn draft(&self, debit: Decimal, credit: Decimal) -> JournalEntryDraft {
        JournalEntryDraft {
            tenant_id: self.tenant,
            sub_scope_id: None,
            fiscal_period_id: self.april,
            entry_date: day(10),
            kind: EntryKind::Normal,
            source_module: "gl".to_string(),
            source_document: None,
            description: "Cash sale".to_string(),
            notes: None,
            currency: CurrencyCode::USD,
            exchange_rate: Decimal::ONE,
            lines: vec![
                JournalLineInput::debit(AccountRef::Id(self.cash), debit),
                JournalLineInput::credit(AccountRef::Code("4000".to_string()), credit),
            ],
            created_by: Actor::System,
        }
    }

    fn euro_invoice(&self) -> JournalEntryDraft {
        let mut receivable = JournalLineInput::debit(AccountRef::Id(self.receivable), dec!(1000));
        receivable.subledger = Some(invoice());
        JournalEntryDraft {
            currency: CurrencyCode::EUR,
            exchange_rate: dec!(1.05),
            description: "Invoice INV-2026-0042".to_string(),
            lines: vec![
                receivable,
                JournalLineInput::credit(AccountRef::Id(self.revenue), dec!(1000)),
            ],
            ..self.draft(Decimal::ZERO, Decimal::ZERO)
        }
    }

    fn workflow(&self, rule_type: RuleType, steps: Vec<ApprovalStep>) -> ApprovalWorkflow {
        ApprovalWorkflow {
            id: ApprovalWorkflowId::new(),
            tenant_id: self.tenant,
            name: "Journal approval".to_string(),
            document_type: JOURNAL_DOCUMENT.to_string(),
            rule_type,
            min_amount: None,
            max_amount: None,
            currency: None,
            priority: 1,
            is_active: true,
            expiry_hours: None,
            steps,
        }
    }

    async fn audit_count(&self) -> usize {
        self.store.audit_entries(self.tenant).await.len()
    }
}

fn step(order: u32, users: Vec<UserId>) -> ApprovalStep {
    ApprovalStep {
        id: ApprovalStepId::new(),
        step_order: order,
        name: format!("Step {order}"),
        approvers: ApproverSpec::Users { users },
        required_approvals: None,
        min_amount: None,
        max_amount: None,
        currency: None,
        escalation_hours: None,
        escalation_action: None,
    }
}

// ============================================================================
// Scenario A: below every threshold, the entry posts on submit
// ============================================================================

#[tokio::test]
async fn test_submit_below_threshold_posts_directly() {
    let l = ledger();
    let mut review = step(1, vec![l.u2]);
    review.min_amount = Some(dec!(1000));
    review.currency = Some(CurrencyCode::USD);
    l.engine
        .define_workflow(l.as_user(l.u1), l.workflow(RuleType::Threshold, vec![review]))
        .await
        .unwrap();

    let entry = l
        .engine
        .create_journal_entry(l.as_user(l.u1), l.draft(dec!(500), dec!(500)))
        .await
        .unwrap();
    let submission = l
        .engine
        .submit_journal_entry(l.as_user(l.u1), entry.id, Some(entry.version))
        .await
        .unwrap();

    assert_eq!(submission.request.total_steps(), 0);
    assert_eq!(submission.request.status, ApprovalStatus::Approved);
    assert_eq!(submission.entry.status, JournalStatus::Posted);
    assert_eq!(
        l.store.period_totals(l.tenant, l.april).await,
        (dec!(500), dec!(500))
    );
}

// ============================================================================
// Scenario B: an unbalanced draft is refused and nothing is stored
// ============================================================================

#[tokio::test]
async fn test_unbalanced_draft_is_refused() {
    let l = ledger();
    let err = l
        .engine
        .create_journal_entry(l.as_user(l.u1), l.draft(dec!(700), dec!(650)))
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "UNBALANCED");
    assert_eq!(err.status_code(), 400);
    assert_eq!(
        err.to_string(),
        "Total debits (700.00) must equal total credits (650.00)"
    );
    assert!(l.store.journal_entries(l.tenant).await.is_empty());
    assert_eq!(l.audit_count().await, 0);
}

#[tokio::test]
async fn test_amount_beyond_range_is_refused() {
    let l = ledger();
    let huge = Decimal::MAX - Decimal::ONE;
    let err = l
        .engine
        .create_journal_entry(l.as_user(l.u1), l.draft(huge, huge))
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "AMOUNT_OUT_OF_RANGE");
    assert_eq!(err.status_code(), 400);
    assert_eq!(err.line(), Some(1));
    assert!(l.store.journal_entries(l.tenant).await.is_empty());
}

// ============================================================================
// Scenario C: threshold approval, then a late approver gets a conflict
// ============================================================================

#[tokio::test]
async fn test_threshold_approval_posts_and_late_approval_conflicts() {
    let l = ledger();
    let mut large = step(1, vec![l.u1]);
    large.min_amount = Some(dec!(10000));
    l.engine
        .define_workflow(l.as_user(l.u1), l.workflow(RuleType::Threshold, vec![large]))
        .await
        .unwrap();

    let entry = l
        .engine
        .create_journal_entry(l.as_user(l.u1), l.draft(dec!(15000), dec!(15000)))
        .await
        .unwrap();
    let submission = l
        .engine
        .submit_journal_entry(l.as_user(l.u1), entry.id, None)
        .await
        .unwrap();
    assert_eq!(submission.request.status, ApprovalStatus::Pending);
    assert_eq!(submission.entry.status, JournalStatus::PendingApproval);

    let request = l
        .engine
        .approve_request(l.as_user(l.u1), submission.request.id, None)
        .await
        .unwrap();
    assert_eq!(request.status, ApprovalStatus::Approved);
    let posted = l.engine.get_journal_entry(l.as_user(l.u1), entry.id).await.unwrap();
    assert_eq!(posted.status, JournalStatus::Posted);

    let before = l.audit_count().await;
    let err = l
        .engine
        .approve_request(l.as_user(l.u2), submission.request.id, None)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "REQUEST_TERMINAL");
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(l.audit_count().await, before);
}

#[tokio::test]
async fn test_repeated_approval_on_open_request_is_noop() {
    let l = ledger();
    let mut both = step(1, vec![l.u1, l.u2]);
    both.required_approvals = Some(2);
    l.engine
        .define_workflow(l.as_user(l.u1), l.workflow(RuleType::All, vec![both]))
        .await
        .unwrap();
    let entry = l
        .engine
        .create_journal_entry(l.as_user(l.u1), l.draft(dec!(40), dec!(40)))
        .await
        .unwrap();
    let submission = l
        .engine
        .submit_journal_entry(l.as_user(l.u1), entry.id, None)
        .await
        .unwrap();

    let first = l
        .engine
        .approve_request(l.as_user(l.u1), submission.request.id, None)
        .await
        .unwrap();
    let before = l.audit_count().await;
    let again = l
        .engine
        .approve_request(l.as_user(l.u1), submission.request.id, None)
        .await
        .unwrap();
    assert_eq!(again, first);
    assert_eq!(l.audit_count().await, before);

    let done = l
        .engine
        .approve_request(l.as_user(l.u2), submission.request.id, None)
        .await
        .unwrap();
    assert_eq!(done.status, ApprovalStatus::Approved);
}

#[tokio::test]
async fn test_approval_after_period_close_does_not_post() {
    let l = ledger();
    l.engine
        .define_workflow(
            l.as_user(l.u1),
            l.workflow(RuleType::Any, vec![step(1, vec![l.u2])]),
        )
        .await
        .unwrap();
    let entry = l
        .engine
        .create_journal_entry(l.as_user(l.u1), l.draft(dec!(500), dec!(500)))
        .await
        .unwrap();
    let submission = l
        .engine
        .submit_journal_entry(l.as_user(l.u1), entry.id, None)
        .await
        .unwrap();
    assert_eq!(submission.entry.status, JournalStatus::PendingApproval);

    l.periods.set_open(l.tenant, l.april, false);
    let before = l.audit_count().await;
    let err = l
        .engine
        .approve_request(l.as_user(l.u2), submission.request.id, None)
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "CLOSED_PERIOD");
    let stored = l.engine.get_journal_entry(l.as_user(l.u1), entry.id).await.unwrap();
    assert_eq!(stored.status, JournalStatus::PendingApproval);
    let request = l
        .engine
        .get_approval_request(l.as_user(l.u1), submission.request.id)
        .await
        .unwrap();
    assert_eq!(request.status, ApprovalStatus::Pending);
    assert_eq!(
        l.store.period_totals(l.tenant, l.april).await,
        (Decimal::ZERO, Decimal::ZERO)
    );
    assert_eq!(l.audit_count().await, before);

    l.periods.set_open(l.tenant, l.april, true);
    let approved = l
        .engine
        .approve_request(l.as_user(l.u2), submission.request.id, None)
        .await
        .unwrap();
    assert_eq!(approved.status, ApprovalStatus::Approved);
    assert_eq!(
        l.store.period_totals(l.tenant, l.april).await,
        (dec!(500), dec!(500))
    );
}

// ============================================================================
// Scenario D: rejection returns the entry for editing; resubmit opens a new
// request
// ============================================================================

#[tokio::test]
async fn test_reject_then_resubmit_creates_new_request() {
    let l = ledger();
    l.engine
        .define_workflow(
            l.as_user(l.u1),
            l.workflow(RuleType::Sequential, vec![step(1, vec![l.u2])]),
        )
        .await
        .unwrap();
    let entry = l
        .engine
        .create_journal_entry(l.as_user(l.u1), l.draft(dec!(300), dec!(300)))
        .await
        .unwrap();
    let first = l
        .engine
        .submit_journal_entry(l.as_user(l.u1), entry.id, None)
        .await
        .unwrap();

    let err = l
        .engine
        .reject_request(l.as_user(l.u2), first.request.id, String::new())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "REASON_REQUIRED");

    let rejected = l
        .engine
        .reject_request(l.as_user(l.u2), first.request.id, "missing support".to_string())
        .await
        .unwrap();
    assert_eq!(rejected.status, ApprovalStatus::Rejected);

    let editable = l.engine.get_journal_entry(l.as_user(l.u1), entry.id).await.unwrap();
    assert_eq!(editable.status, JournalStatus::Rejected);
    let edited = l
        .engine
        .update_journal_entry(
            l.as_user(l.u1),
            entry.id,
            l.draft(dec!(310), dec!(310)),
            Some(editable.version),
        )
        .await
        .unwrap();

    let second = l
        .engine
        .submit_journal_entry(l.as_user(l.u1), entry.id, Some(edited.version))
        .await
        .unwrap();
    assert_ne!(second.request.id, first.request.id);
    assert_eq!(second.request.status, ApprovalStatus::Pending);
    assert_eq!(second.request.current_step, 1);

    let old = l
        .engine
        .get_approval_request(l.as_user(l.u1), first.request.id)
        .await
        .unwrap();
    assert_eq!(old, rejected);
    let history = l
        .engine
        .approval_history(l.as_user(l.u1), first.request.id)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
}

// ============================================================================
// Reversal
// ============================================================================

#[tokio::test]
async fn test_reverse_posts_mirror_and_marks_original() {
    let l = ledger();
    let entry = l
        .engine
        .create_journal_entry(l.as_user(l.u1), l.draft(dec!(500), dec!(500)))
        .await
        .unwrap();
    let posted = l
        .engine
        .submit_journal_entry(l.as_user(l.u1), entry.id, None)
        .await
        .unwrap()
        .entry;

    let reversed = l
        .engine
        .reverse_journal_entry(l.as_user(l.u2), entry.id, day(20), "booked twice", Some(posted.version))
        .await
        .unwrap();

    assert_eq!(reversed.original.status, JournalStatus::Reversed);
    assert_eq!(reversed.original.reversed_by_entry_id, Some(reversed.reversal.id));
    assert_eq!(reversed.reversal.status, JournalStatus::Posted);
    assert_eq!(reversed.reversal.reverses_entry_id, Some(entry.id));
    for (mirror, line) in reversed.reversal.lines.iter().zip(&posted.lines) {
        assert_eq!(mirror.account_id, line.account_id);
        assert_eq!(mirror.debit, line.credit);
        assert_eq!(mirror.credit, line.debit);
    }
    assert_eq!(
        l.store.period_totals(l.tenant, l.april).await,
        (dec!(1000), dec!(1000))
    );

    let err = l
        .engine
        .reverse_journal_entry(l.as_user(l.u2), entry.id, day(21), "again", None)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_TRANSITION");
}

#[tokio::test]
async fn test_reverse_into_closed_period_fails() {
    let l = ledger();
    let entry = l
        .engine
        .create_journal_entry(l.as_user(l.u1), l.draft(dec!(75), dec!(75)))
        .await
        .unwrap();
    l.engine
        .submit_journal_entry(l.as_user(l.u1), entry.id, None)
        .await
        .unwrap();
    l.periods.set_open(l.tenant, l.april, false);

    let err = l
        .engine
        .reverse_journal_entry(l.as_user(l.u1), entry.id, day(25), "late", None)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "CLOSED_PERIOD");
    let still = l.engine.get_journal_entry(l.as_user(l.u1), entry.id).await.unwrap();
    assert_eq!(still.status, JournalStatus::Posted);
}

#[tokio::test]
async fn test_draft_cannot_be_reversed_or_posted() {
    let l = ledger();
    let entry = l
        .engine
        .create_journal_entry(l.as_user(l.u1), l.draft(dec!(5), dec!(5)))
        .await
        .unwrap();

    let err = l
        .engine
        .reverse_journal_entry(l.as_user(l.u1), entry.id, day(12), "no", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    assert_eq!(err.status_code(), 422);

    let err = l
        .engine
        .post_journal_entry(l.as_user(l.u1), entry.id, None)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_TRANSITION");
}

// ============================================================================
// Escalation sweep
// ============================================================================

#[tokio::test]
async fn test_sweep_expires_request_and_returns_entry_to_draft() {
    let l = ledger();
    let mut workflow = l.workflow(RuleType::Any, vec![step(1, vec![l.u2])]);
    workflow.expiry_hours = Some(24);
    l.engine.define_workflow(l.as_user(l.u1), workflow).await.unwrap();
    let entry = l
        .engine
        .create_journal_entry(l.as_user(l.u1), l.draft(dec!(60), dec!(60)))
        .await
        .unwrap();
    let submission = l
        .engine
        .submit_journal_entry(l.as_user(l.u1), entry.id, None)
        .await
        .unwrap();

    let later = Utc::now() + Duration::hours(25);
    let report = l.engine.run_escalation_sweep(later, Some(l.tenant)).await.unwrap();
    assert_eq!(report.examined, 1);
    assert_eq!(report.expired, 1);

    let request = l
        .engine
        .get_approval_request(l.as_user(l.u1), submission.request.id)
        .await
        .unwrap();
    assert_eq!(request.status, ApprovalStatus::Expired);
    let draft = l.engine.get_journal_entry(l.as_user(l.u1), entry.id).await.unwrap();
    assert_eq!(draft.status, JournalStatus::Draft);

    let again = l.engine.run_escalation_sweep(later, None).await.unwrap();
    assert_eq!(again.changed(), 0);
}

#[tokio::test]
async fn test_sweep_auto_approves_overdue_step_once() {
    let l = ledger();
    let mut overdue = step(1, vec![l.u2]);
    overdue.escalation_hours = Some(4);
    overdue.escalation_action = Some(EscalationAction::AutoApprove);
    l.engine
        .define_workflow(l.as_user(l.u1), l.workflow(RuleType::Any, vec![overdue]))
        .await
        .unwrap();
    let entry = l
        .engine
        .create_journal_entry(l.as_user(l.u1), l.draft(dec!(90), dec!(90)))
        .await
        .unwrap();
    l.engine
        .submit_journal_entry(l.as_user(l.u1), entry.id, None)
        .await
        .unwrap();

    let early = l
        .engine
        .run_escalation_sweep(Utc::now() + Duration::hours(1), None)
        .await
        .unwrap();
    assert_eq!(early.changed(), 0);

    let late = Utc::now() + Duration::hours(5);
    let report = l.engine.run_escalation_sweep(late, None).await.unwrap();
    assert_eq!(report.auto_approved, 1);
    let posted = l.engine.get_journal_entry(l.as_user(l.u1), entry.id).await.unwrap();
    assert_eq!(posted.status, JournalStatus::Posted);
    assert_eq!(posted.posted_by, Some(Actor::System));

    let again = l.engine.run_escalation_sweep(late, None).await.unwrap();
    assert_eq!(again.examined, 0);
}

// ============================================================================
// Scenario E: FX revaluation and settlement
// ============================================================================

async fn booked_invoice(l: &Ledger) {
    let entry = l
        .engine
        .create_journal_entry(l.as_user(l.u1), l.euro_invoice())
        .await
        .unwrap();
    let submission = l
        .engine
        .submit_journal_entry(l.as_user(l.u1), entry.id, None)
        .await
        .unwrap();
    assert_eq!(submission.entry.status, JournalStatus::Posted);
    l.rates.publish(
        l.tenant,
        ExchangeRate::new(
            CurrencyCode::EUR,
            CurrencyCode::USD,
            dec!(1.10),
            RateType::Closing,
            day(30),
        ),
    );
}

fn closing_run(preview: bool) -> RevaluationCommand {
    RevaluationCommand {
        date: day(30),
        method: RevaluationMethod::ClosingRate,
        scope: RevaluationScope {
            currencies: vec![CurrencyCode::EUR],
            accounts: vec![],
        },
        preview,
    }
}

#[tokio::test]
async fn test_revaluation_preview_computes_gain_without_writes() {
    let l = ledger();
    booked_invoice(&l).await;
    let before = l.audit_count().await;

    let first = l
        .engine
        .run_fx_revaluation(l.tenant, Actor::User(l.u1), &closing_run(true))
        .await
        .unwrap();
    let second = l
        .engine
        .run_fx_revaluation(l.tenant, Actor::User(l.u1), &closing_run(true))
        .await
        .unwrap();

    assert_eq!(first.status, BatchStatus::Preview);
    assert_eq!(first.entries.len(), 1);
    assert_eq!(first.entries[0].original_base_amount, dec!(1050));
    assert_eq!(first.entries[0].revalued_base_amount, dec!(1100));
    assert_eq!(first.entries[0].gain_loss, dec!(50));
    assert_eq!(first.entries[0].tag, GainLossTag::Unrealized);
    assert_eq!(first.entries, second.entries);
    assert_eq!(first.id, second.id);
    assert_eq!(l.audit_count().await, before);
}

#[tokio::test]
async fn test_revaluation_posts_once() {
    let l = ledger();
    booked_invoice(&l).await;

    let batch = l
        .engine
        .run_fx_revaluation(l.tenant, Actor::User(l.u1), &closing_run(false))
        .await
        .unwrap();
    assert_eq!(batch.status, BatchStatus::Posted);
    let entry_id = batch.journal_entry_id.unwrap();
    let entry = l.engine.get_journal_entry(l.as_user(l.u1), entry_id).await.unwrap();
    assert_eq!(entry.kind, EntryKind::Revaluation);
    assert_eq!(entry.status, JournalStatus::Posted);
    assert_eq!(entry.totals.debit, dec!(50));

    let err = l
        .engine
        .run_fx_revaluation(l.tenant, Actor::User(l.u1), &closing_run(false))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "BATCH_ALREADY_POSTED");
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // Carrying amounts moved, so a later preview finds nothing left to book.
    let rerun = l
        .engine
        .run_fx_revaluation(l.tenant, Actor::User(l.u1), &closing_run(true))
        .await
        .unwrap();
    assert!(rerun.is_empty());

    let revalued = l
        .engine
        .search_audit_trail(
            l.as_user(l.u1),
            &AuditFilter {
                entity_type: Some(AuditEntityType::FxBatch),
                ..AuditFilter::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(revalued.meta.total, 1);
    assert_eq!(revalued.data[0].action, AuditAction::Revalue);
}

#[tokio::test]
async fn test_revaluation_in_closed_period_fails_fast() {
    let l = ledger();
    booked_invoice(&l).await;
    l.periods.set_open(l.tenant, l.april, false);

    let err = l
        .engine
        .run_fx_revaluation(l.tenant, Actor::System, &closing_run(true))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "CLOSED_PERIOD");
}

#[tokio::test]
async fn test_revaluation_without_items_is_noop() {
    let l = ledger();
    let batch = l
        .engine
        .run_fx_revaluation(l.tenant, Actor::System, &closing_run(false))
        .await
        .unwrap();
    assert!(batch.is_empty());
    assert_eq!(l.audit_count().await, 0);
}

#[tokio::test]
async fn test_settlement_realizes_and_reverses_unrealized() {
    let l = ledger();
    booked_invoice(&l).await;
    l.engine
        .run_fx_revaluation(l.tenant, Actor::User(l.u1), &closing_run(false))
        .await
        .unwrap();

    let preview = l
        .engine
        .run_fx_revaluation(l.tenant, Actor::User(l.u1), &closing_run(true))
        .await
        .unwrap();
    assert!(preview.is_empty());

    let item = l
        .store
        .open_items(l.tenant)
        .await
        .into_iter()
        .next()
        .unwrap();
    assert_eq!(item.carrying_base_amount, dec!(1100));

    let command = SettlementCommand {
        open_item_id: item.id,
        rate: dec!(1.08),
        date: day(30),
    };
    let batch = l
        .engine
        .settle_fx_position(l.tenant, Actor::User(l.u1), &command)
        .await
        .unwrap();
    let realized = batch
        .entries
        .iter()
        .find(|e| e.tag == GainLossTag::Realized)
        .unwrap();
    assert_eq!(realized.gain_loss, dec!(30));
    let unrealized = batch
        .entries
        .iter()
        .find(|e| e.tag == GainLossTag::Unrealized)
        .unwrap();
    assert_eq!(unrealized.gain_loss, dec!(-50));

    let entry = l
        .engine
        .get_journal_entry(l.as_user(l.u1), batch.journal_entry_id.unwrap())
        .await
        .unwrap();
    assert_eq!(entry.totals.debit, entry.totals.credit);

    let err = l
        .engine
        .settle_fx_position(l.tenant, Actor::User(l.u1), &command)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "OPEN_ITEM_SETTLED");
}

#[tokio::test]
async fn test_revaluation_entry_cannot_be_reversed() {
    let l = ledger();
    booked_invoice(&l).await;
    let batch = l
        .engine
        .run_fx_revaluation(l.tenant, Actor::User(l.u1), &closing_run(false))
        .await
        .unwrap();
    let entry_id = batch.journal_entry_id.unwrap();
    let before = l.audit_count().await;

    let err = l
        .engine
        .reverse_journal_entry(l.as_user(l.u1), entry_id, day(30), "wrong rate", None)
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "GENERATED_ENTRY");
    assert_eq!(err.kind(), ErrorKind::State);
    let entry = l.engine.get_journal_entry(l.as_user(l.u1), entry_id).await.unwrap();
    assert_eq!(entry.status, JournalStatus::Posted);
    let item = l.store.open_items(l.tenant).await.into_iter().next().unwrap();
    assert_eq!(item.carrying_base_amount, dec!(1100));
    assert_eq!(l.audit_count().await, before);
}

#[tokio::test]
async fn test_fx_posting_requires_admin_role() {
    let l = ledger();
    booked_invoice(&l).await;

    let preview = l
        .engine
        .run_fx_revaluation(l.tenant, Actor::User(l.u2), &closing_run(true))
        .await
        .unwrap();
    assert_eq!(preview.entries.len(), 1);

    let before = l.audit_count().await;
    let err = l
        .engine
        .run_fx_revaluation(l.tenant, Actor::User(l.u2), &closing_run(false))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "NOT_AUTHORIZED");
    assert_eq!(err.kind(), ErrorKind::Permission);

    let item = l.store.open_items(l.tenant).await.into_iter().next().unwrap();
    let err = l
        .engine
        .settle_fx_position(
            l.tenant,
            Actor::User(l.u2),
            &SettlementCommand {
                open_item_id: item.id,
                rate: dec!(1.08),
                date: day(30),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "NOT_AUTHORIZED");
    assert_eq!(l.audit_count().await, before);
    assert_eq!(item.carrying_base_amount, dec!(1050));
}
