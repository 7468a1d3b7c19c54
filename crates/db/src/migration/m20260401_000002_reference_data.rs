//! Read-side tables behind the collaborator adapters: chart of accounts,
//! subledger records, fiscal periods, tenant members and exchange rates.
//!
//! Other services own these records; the ledger only reads them.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(ACCOUNTS_SQL).await?;
        db.execute_unprepared(SUBLEDGER_RECORDS_SQL).await?;
        db.execute_unprepared(FISCAL_PERIODS_SQL).await?;
        db.execute_unprepared(TENANT_MEMBERS_SQL).await?;
        db.execute_unprepared(EXCHANGE_RATES_SQL).await?;
        db.execute_unprepared(RLS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

const ACCOUNTS_SQL: &str = r"
CREATE TABLE accounts (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    code VARCHAR(20) NOT NULL,
    name VARCHAR(255) NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT true,
    allow_direct_posting BOOLEAN NOT NULL DEFAULT true,

    CONSTRAINT uq_accounts_code UNIQUE (tenant_id, code)
);
";

const SUBLEDGER_RECORDS_SQL: &str = r"
CREATE TABLE subledger_records (
    tenant_id UUID NOT NULL,
    kind VARCHAR(20) NOT NULL,
    reference VARCHAR(100) NOT NULL,

    PRIMARY KEY (tenant_id, kind, reference)
);
";

const FISCAL_PERIODS_SQL: &str = r"
CREATE TABLE fiscal_periods (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    name VARCHAR(50) NOT NULL,
    start_date DATE NOT NULL,
    end_date DATE NOT NULL,
    status VARCHAR(10) NOT NULL DEFAULT 'open' CHECK (status IN ('open', 'closed')),

    CONSTRAINT chk_period_range CHECK (start_date <= end_date)
);

CREATE INDEX idx_fiscal_periods_range ON fiscal_periods(tenant_id, start_date, end_date);
";

const TENANT_MEMBERS_SQL: &str = r"
CREATE TABLE tenant_members (
    tenant_id UUID NOT NULL,
    user_id UUID NOT NULL,
    roles JSONB NOT NULL DEFAULT '[]',
    manager_id UUID,
    active BOOLEAN NOT NULL DEFAULT true,

    PRIMARY KEY (tenant_id, user_id)
);
";

const EXCHANGE_RATES_SQL: &str = r"
CREATE TABLE exchange_rates (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    from_currency CHAR(3) NOT NULL,
    to_currency CHAR(3) NOT NULL,
    rate NUMERIC(19, 8) NOT NULL CHECK (rate > 0),
    rate_type VARCHAR(10) NOT NULL CHECK (rate_type IN ('spot', 'average', 'closing')),
    effective_date DATE NOT NULL,

    CONSTRAINT uq_exchange_rates UNIQUE (tenant_id, from_currency, to_currency, rate_type, effective_date)
);

CREATE INDEX idx_exchange_rates_lookup
    ON exchange_rates(tenant_id, from_currency, to_currency, rate_type, effective_date DESC);
";

const RLS_SQL: &str = r"
ALTER TABLE accounts ENABLE ROW LEVEL SECURITY;
ALTER TABLE subledger_records ENABLE ROW LEVEL SECURITY;
ALTER TABLE fiscal_periods ENABLE ROW LEVEL SECURITY;
ALTER TABLE tenant_members ENABLE ROW LEVEL SECURITY;
ALTER TABLE exchange_rates ENABLE ROW LEVEL SECURITY;

CREATE POLICY tenant_isolation ON accounts
    USING (tenant_id = current_setting('app.current_tenant_id', true)::UUID);

CREATE POLICY tenant_isolation ON subledger_records
    USING (tenant_id = current_setting('app.current_tenant_id', true)::UUID);

CREATE POLICY tenant_isolation ON fiscal_periods
    USING (tenant_id = current_setting('app.current_tenant_id', true)::UUID);

CREATE POLICY tenant_isolation ON tenant_members
    USING (tenant_id = current_setting('app.current_tenant_id', true)::UUID);

CREATE POLICY tenant_isolation ON exchange_rates
    USING (tenant_id = current_setting('app.current_tenant_id', true)::UUID);
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS exchange_rates CASCADE;
DROP TABLE IF EXISTS tenant_members CASCADE;
DROP TABLE IF EXISTS fiscal_periods CASCADE;
DROP TABLE IF EXISTS subledger_records CASCADE;
DROP TABLE IF EXISTS accounts CASCADE;
";
