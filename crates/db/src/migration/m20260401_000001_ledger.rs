//! Ledger schema: journal entries, approval workflow state, FX positions
//! and the audit trail, with triggers and row-level security.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: JOURNAL
        // ============================================================
        db.execute_unprepared(JOURNAL_ENTRIES_SQL).await?;
        db.execute_unprepared(JOURNAL_LINES_SQL).await?;
        db.execute_unprepared(PERIOD_TOTALS_SQL).await?;

        // ============================================================
        // PART 2: APPROVAL WORKFLOW
        // ============================================================
        db.execute_unprepared(APPROVAL_WORKFLOWS_SQL).await?;
        db.execute_unprepared(APPROVAL_REQUESTS_SQL).await?;
        db.execute_unprepared(APPROVAL_HISTORY_SQL).await?;

        // ============================================================
        // PART 3: FX
        // ============================================================
        db.execute_unprepared(OPEN_ITEMS_SQL).await?;
        db.execute_unprepared(FX_BATCHES_SQL).await?;

        // ============================================================
        // PART 4: AUDIT TRAIL
        // ============================================================
        db.execute_unprepared(AUDIT_TRAIL_SQL).await?;

        // ============================================================
        // PART 5: TRIGGERS & FUNCTIONS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        // ============================================================
        // PART 6: ROW-LEVEL SECURITY
        // ============================================================
        db.execute_unprepared(RLS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const JOURNAL_ENTRIES_SQL: &str = r"
CREATE TABLE journal_entries (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    sub_scope_id UUID,
    fiscal_period_id UUID NOT NULL,
    entry_date DATE NOT NULL,
    kind VARCHAR(20) NOT NULL CHECK (kind IN (
        'normal', 'opening', 'closing', 'adjustment',
        'reversal', 'consolidation', 'elimination', 'revaluation'
    )),
    source_module VARCHAR(20) NOT NULL,
    source_document VARCHAR(255),
    description TEXT NOT NULL,
    notes TEXT,
    currency CHAR(3) NOT NULL,
    base_currency CHAR(3) NOT NULL,
    exchange_rate NUMERIC(19, 8) NOT NULL CHECK (exchange_rate > 0),
    total_debit NUMERIC(19, 4) NOT NULL DEFAULT 0,
    total_credit NUMERIC(19, 4) NOT NULL DEFAULT 0,
    total_base_debit NUMERIC(19, 4) NOT NULL DEFAULT 0,
    total_base_credit NUMERIC(19, 4) NOT NULL DEFAULT 0,
    status VARCHAR(20) NOT NULL CHECK (status IN (
        'draft', 'pending_approval', 'approved', 'posted',
        'rejected', 'void', 'reversed'
    )),
    status_reason TEXT,
    reverses_entry_id UUID REFERENCES journal_entries(id),
    reversed_by_entry_id UUID REFERENCES journal_entries(id),
    approval_request_id UUID,
    version BIGINT NOT NULL DEFAULT 1,
    created_by_kind VARCHAR(10) NOT NULL,
    created_by UUID,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_by_kind VARCHAR(10) NOT NULL,
    updated_by UUID,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    posted_by_kind VARCHAR(10),
    posted_by UUID,
    posted_at TIMESTAMPTZ,

    CONSTRAINT chk_posted_balanced CHECK (
        status NOT IN ('posted', 'reversed') OR total_base_debit = total_base_credit
    )
);

CREATE INDEX idx_journal_entries_tenant_status ON journal_entries(tenant_id, status);
CREATE INDEX idx_journal_entries_period ON journal_entries(fiscal_period_id);

-- An entry is reversed at most once
CREATE UNIQUE INDEX uq_journal_entries_reversal ON journal_entries(reverses_entry_id)
    WHERE reverses_entry_id IS NOT NULL;
";

const JOURNAL_LINES_SQL: &str = r"
CREATE TABLE journal_lines (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    journal_entry_id UUID NOT NULL REFERENCES journal_entries(id) ON DELETE CASCADE,
    line_number INTEGER NOT NULL CHECK (line_number > 0),
    account_id UUID NOT NULL,
    description TEXT,
    debit NUMERIC(19, 4) NOT NULL DEFAULT 0 CHECK (debit >= 0),
    credit NUMERIC(19, 4) NOT NULL DEFAULT 0 CHECK (credit >= 0),
    base_debit NUMERIC(19, 4) NOT NULL DEFAULT 0 CHECK (base_debit >= 0),
    base_credit NUMERIC(19, 4) NOT NULL DEFAULT 0 CHECK (base_credit >= 0),
    exchange_rate NUMERIC(19, 8),
    subledger_kind VARCHAR(20),
    subledger_reference VARCHAR(100),
    dimensions JSONB NOT NULL DEFAULT '[]',
    tax JSONB,
    intercompany BOOLEAN NOT NULL DEFAULT false,
    counterparty_scope_id UUID,

    CONSTRAINT uq_journal_lines_number UNIQUE (journal_entry_id, line_number),
    CONSTRAINT chk_one_side CHECK (NOT (debit > 0 AND credit > 0)),
    CONSTRAINT chk_subledger_pair CHECK (
        (subledger_kind IS NULL) = (subledger_reference IS NULL)
    )
);

CREATE INDEX idx_journal_lines_account ON journal_lines(account_id);
CREATE INDEX idx_journal_lines_subledger ON journal_lines(tenant_id, subledger_kind, subledger_reference)
    WHERE subledger_kind IS NOT NULL;
";

const PERIOD_TOTALS_SQL: &str = r"
CREATE TABLE period_totals (
    tenant_id UUID NOT NULL,
    fiscal_period_id UUID NOT NULL,
    total_debit NUMERIC(19, 4) NOT NULL DEFAULT 0,
    total_credit NUMERIC(19, 4) NOT NULL DEFAULT 0,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    PRIMARY KEY (tenant_id, fiscal_period_id)
);
";

const APPROVAL_WORKFLOWS_SQL: &str = r"
CREATE TABLE approval_workflows (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    name VARCHAR(100) NOT NULL,
    document_type VARCHAR(50) NOT NULL,
    rule_type VARCHAR(20) NOT NULL CHECK (rule_type IN (
        'any', 'all', 'sequential', 'threshold', 'matrix'
    )),
    min_amount NUMERIC(19, 4),
    max_amount NUMERIC(19, 4),
    currency CHAR(3),
    priority INTEGER NOT NULL DEFAULT 0,
    is_active BOOLEAN NOT NULL DEFAULT true,
    expiry_hours INTEGER CHECK (expiry_hours > 0),
    steps JSONB NOT NULL DEFAULT '[]',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT chk_amount_band CHECK (
        min_amount IS NULL OR max_amount IS NULL OR min_amount <= max_amount
    )
);

CREATE INDEX idx_approval_workflows_lookup ON approval_workflows(tenant_id, document_type, priority)
    WHERE is_active = true;

-- Active workflow names are unique per document type
CREATE UNIQUE INDEX uq_approval_workflows_active_name
    ON approval_workflows(tenant_id, document_type, name)
    WHERE is_active = true;
";

const APPROVAL_REQUESTS_SQL: &str = r"
CREATE TABLE approval_requests (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    workflow_id UUID REFERENCES approval_workflows(id),
    rule_type VARCHAR(20) NOT NULL,
    document_type VARCHAR(50) NOT NULL,
    document_id UUID NOT NULL,
    amount NUMERIC(19, 4) NOT NULL,
    currency CHAR(3) NOT NULL,
    status VARCHAR(20) NOT NULL CHECK (status IN (
        'pending', 'approved', 'rejected', 'escalated',
        'recalled', 'expired', 'delegated'
    )),
    current_step INTEGER NOT NULL DEFAULT 0,
    steps JSONB NOT NULL DEFAULT '[]',
    progress JSONB NOT NULL DEFAULT '[]',
    delegations JSONB NOT NULL DEFAULT '[]',
    submitted_by_kind VARCHAR(10) NOT NULL,
    submitted_by UUID,
    submitted_at TIMESTAMPTZ NOT NULL,
    completed_by_kind VARCHAR(10),
    completed_by UUID,
    completed_at TIMESTAMPTZ,
    due_at TIMESTAMPTZ,
    expires_at TIMESTAMPTZ,
    version BIGINT NOT NULL DEFAULT 1
);

CREATE INDEX idx_approval_requests_document ON approval_requests(tenant_id, document_type, document_id);
CREATE INDEX idx_approval_requests_open ON approval_requests(tenant_id, submitted_at)
    WHERE status IN ('pending', 'escalated', 'delegated');

-- At most one open request per document
CREATE UNIQUE INDEX uq_approval_requests_open_document
    ON approval_requests(tenant_id, document_type, document_id)
    WHERE status IN ('pending', 'escalated', 'delegated');
";

const APPROVAL_HISTORY_SQL: &str = r"
CREATE TABLE approval_history (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    request_id UUID NOT NULL REFERENCES approval_requests(id),
    step INTEGER NOT NULL,
    actor_kind VARCHAR(10) NOT NULL,
    actor_id UUID,
    action VARCHAR(20) NOT NULL CHECK (action IN (
        'submit', 'approve', 'reject', 'delegate', 'recall',
        'escalate', 'auto_approve', 'auto_reject', 'expire'
    )),
    previous JSONB,
    new JSONB NOT NULL,
    delegate_to UUID,
    reason TEXT,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE INDEX idx_approval_history_request ON approval_history(request_id, created_at);
";

const OPEN_ITEMS_SQL: &str = r"
CREATE TABLE open_items (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    account_id UUID NOT NULL,
    source_entry_id UUID NOT NULL REFERENCES journal_entries(id),
    source_line_id UUID NOT NULL REFERENCES journal_lines(id),
    subledger_kind VARCHAR(20) NOT NULL,
    subledger_reference VARCHAR(100) NOT NULL,
    currency CHAR(3) NOT NULL,
    amount NUMERIC(19, 4) NOT NULL,
    original_rate NUMERIC(19, 8) NOT NULL CHECK (original_rate > 0),
    original_base_amount NUMERIC(19, 4) NOT NULL,
    carrying_base_amount NUMERIC(19, 4) NOT NULL,
    opened_on DATE NOT NULL,
    settled_at TIMESTAMPTZ,
    version BIGINT NOT NULL DEFAULT 1,

    CONSTRAINT uq_open_items_line UNIQUE (source_line_id)
);

CREATE INDEX idx_open_items_open ON open_items(tenant_id, currency)
    WHERE settled_at IS NULL;
CREATE INDEX idx_open_items_entry ON open_items(source_entry_id);
";

const FX_BATCHES_SQL: &str = r"
CREATE TABLE fx_revaluation_batches (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    kind VARCHAR(20) NOT NULL CHECK (kind IN ('revaluation', 'settlement')),
    batch_key VARCHAR(255) NOT NULL,
    revaluation_date DATE NOT NULL,
    method VARCHAR(20) NOT NULL,
    scope JSONB NOT NULL,
    fiscal_period_id UUID NOT NULL,
    base_currency CHAR(3) NOT NULL,
    total_gain_loss NUMERIC(19, 4) NOT NULL,
    status VARCHAR(10) NOT NULL CHECK (status IN ('preview', 'posted')),
    journal_entry_id UUID REFERENCES journal_entries(id),
    created_by_kind VARCHAR(10) NOT NULL,
    created_by UUID,
    created_at TIMESTAMPTZ NOT NULL
);

-- A scope/date/method combination posts once
CREATE UNIQUE INDEX uq_fx_batches_posted_key ON fx_revaluation_batches(tenant_id, batch_key)
    WHERE status = 'posted';

CREATE TABLE fx_revaluation_entries (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    batch_id UUID NOT NULL REFERENCES fx_revaluation_batches(id) ON DELETE CASCADE,
    open_item_id UUID NOT NULL REFERENCES open_items(id),
    account_id UUID NOT NULL,
    currency CHAR(3) NOT NULL,
    amount NUMERIC(19, 4) NOT NULL,
    original_base_amount NUMERIC(19, 4) NOT NULL,
    revaluation_rate NUMERIC(19, 8) NOT NULL,
    revalued_base_amount NUMERIC(19, 4) NOT NULL,
    gain_loss NUMERIC(19, 4) NOT NULL,
    tag VARCHAR(12) NOT NULL CHECK (tag IN ('unrealized', 'realized')),
    position INTEGER NOT NULL
);

CREATE INDEX idx_fx_entries_batch ON fx_revaluation_entries(batch_id, position);
";

const AUDIT_TRAIL_SQL: &str = r"
CREATE TABLE audit_trail (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    entity_type VARCHAR(30) NOT NULL,
    entity_id UUID NOT NULL,
    action VARCHAR(20) NOT NULL,
    actor_kind VARCHAR(10) NOT NULL,
    actor_id UUID,
    previous JSONB,
    new JSONB,
    reason TEXT,
    created_at TIMESTAMPTZ NOT NULL,
    seq BIGSERIAL NOT NULL
);

CREATE INDEX idx_audit_trail_entity ON audit_trail(tenant_id, entity_type, entity_id);
CREATE INDEX idx_audit_trail_time ON audit_trail(tenant_id, created_at DESC, seq DESC);
CREATE INDEX idx_audit_trail_actor ON audit_trail(tenant_id, actor_id) WHERE actor_id IS NOT NULL;
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: prevent_append_only_changes
-- Audit trail and approval history rows are never changed or removed
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_append_only_changes()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION '% rows are append-only (% rejected)', TG_TABLE_NAME, TG_OP;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_audit_trail_append_only
BEFORE UPDATE OR DELETE ON audit_trail
FOR EACH ROW
EXECUTE FUNCTION prevent_append_only_changes();

CREATE TRIGGER trg_approval_history_append_only
BEFORE UPDATE OR DELETE ON approval_history
FOR EACH ROW
EXECUTE FUNCTION prevent_append_only_changes();

-- ============================================================
-- FUNCTION: prevent_posted_line_changes
-- Lines of a posted or reversed entry are frozen
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_posted_line_changes()
RETURNS TRIGGER AS $$
DECLARE
    entry_status VARCHAR(20);
BEGIN
    SELECT status INTO entry_status
    FROM journal_entries
    WHERE id = OLD.journal_entry_id;

    IF entry_status IN ('posted', 'reversed') THEN
        RAISE EXCEPTION 'Lines of posted journal entry % cannot change', OLD.journal_entry_id;
    END IF;

    IF TG_OP = 'DELETE' THEN
        RETURN OLD;
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_journal_lines_frozen
BEFORE UPDATE OR DELETE ON journal_lines
FOR EACH ROW
EXECUTE FUNCTION prevent_posted_line_changes();

-- ============================================================
-- FUNCTION: tenants_with_open_requests
-- Cross-tenant listing for the escalation sweep; returns ids only
-- ============================================================
CREATE OR REPLACE FUNCTION tenants_with_open_requests()
RETURNS TABLE (tenant_id UUID)
LANGUAGE sql
SECURITY DEFINER
SET search_path = public
AS $$
    SELECT DISTINCT r.tenant_id
    FROM approval_requests r
    WHERE r.status IN ('pending', 'escalated', 'delegated')
    ORDER BY r.tenant_id;
$$;
";

const RLS_SQL: &str = r"
-- ============================================================
-- ROW-LEVEL SECURITY POLICIES
-- Application sets context per transaction:
--   SET LOCAL app.current_tenant_id = 'tenant-uuid';
-- ============================================================

ALTER TABLE journal_entries ENABLE ROW LEVEL SECURITY;
ALTER TABLE journal_lines ENABLE ROW LEVEL SECURITY;
ALTER TABLE period_totals ENABLE ROW LEVEL SECURITY;
ALTER TABLE approval_workflows ENABLE ROW LEVEL SECURITY;
ALTER TABLE approval_requests ENABLE ROW LEVEL SECURITY;
ALTER TABLE approval_history ENABLE ROW LEVEL SECURITY;
ALTER TABLE open_items ENABLE ROW LEVEL SECURITY;
ALTER TABLE fx_revaluation_batches ENABLE ROW LEVEL SECURITY;
ALTER TABLE fx_revaluation_entries ENABLE ROW LEVEL SECURITY;
ALTER TABLE audit_trail ENABLE ROW LEVEL SECURITY;

CREATE POLICY tenant_isolation ON journal_entries
    USING (tenant_id = current_setting('app.current_tenant_id', true)::UUID);

CREATE POLICY tenant_isolation ON journal_lines
    USING (tenant_id = current_setting('app.current_tenant_id', true)::UUID);

CREATE POLICY tenant_isolation ON period_totals
    USING (tenant_id = current_setting('app.current_tenant_id', true)::UUID);

CREATE POLICY tenant_isolation ON approval_workflows
    USING (tenant_id = current_setting('app.current_tenant_id', true)::UUID);

CREATE POLICY tenant_isolation ON approval_requests
    USING (tenant_id = current_setting('app.current_tenant_id', true)::UUID);

CREATE POLICY tenant_isolation ON approval_history
    USING (tenant_id = current_setting('app.current_tenant_id', true)::UUID);

CREATE POLICY tenant_isolation ON open_items
    USING (tenant_id = current_setting('app.current_tenant_id', true)::UUID);

CREATE POLICY tenant_isolation ON fx_revaluation_batches
    USING (tenant_id = current_setting('app.current_tenant_id', true)::UUID);

CREATE POLICY tenant_isolation ON fx_revaluation_entries
    USING (tenant_id = current_setting('app.current_tenant_id', true)::UUID);

CREATE POLICY tenant_isolation ON audit_trail
    USING (tenant_id = current_setting('app.current_tenant_id', true)::UUID);
";

const DROP_ALL_SQL: &str = r"
DROP FUNCTION IF EXISTS tenants_with_open_requests();
DROP TABLE IF EXISTS audit_trail CASCADE;
DROP TABLE IF EXISTS fx_revaluation_entries CASCADE;
DROP TABLE IF EXISTS fx_revaluation_batches CASCADE;
DROP TABLE IF EXISTS open_items CASCADE;
DROP TABLE IF EXISTS approval_history CASCADE;
DROP TABLE IF EXISTS approval_requests CASCADE;
DROP TABLE IF EXISTS approval_workflows CASCADE;
DROP TABLE IF EXISTS period_totals CASCADE;
DROP TABLE IF EXISTS journal_lines CASCADE;
DROP TABLE IF EXISTS journal_entries CASCADE;
DROP FUNCTION IF EXISTS prevent_posted_line_changes();
DROP FUNCTION IF EXISTS prevent_append_only_changes();
";
