//! Command-line arguments.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use ledgerline_core::engine::RevaluationCommand;
use ledgerline_core::fx::{RevaluationMethod, RevaluationScope};
use ledgerline_shared::types::{AccountId, CurrencyCode, TenantId};

/// Top-level arguments.
#[derive(Debug, Parser)]
#[command(name = "ledgerline-jobs", version, about = "Periodic Ledgerline jobs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Apply expiry and escalation rules to open approval requests.
    Escalations(EscalationArgs),
    /// Revalue open foreign-currency items of one tenant.
    FxRevaluation(RevaluationArgs),
}

#[derive(Debug, Args)]
pub struct EscalationArgs {
    /// Restrict the sweep to one tenant; all tenants otherwise.
    #[arg(long)]
    pub tenant: Option<TenantId>,
}

#[derive(Debug, Args)]
pub struct RevaluationArgs {
    /// Tenant whose open items are revalued.
    #[arg(long)]
    pub tenant: TenantId,
    /// Revaluation date, `YYYY-MM-DD`.
    #[arg(long)]
    pub date: NaiveDate,
    /// `balance_sheet`, `open_item`, `average_rate` or `closing_rate`.
    #[arg(long, value_parser = parse_method)]
    pub method: RevaluationMethod,
    /// Limit to these currencies; repeatable.
    #[arg(long = "currency")]
    pub currencies: Vec<CurrencyCode>,
    /// Limit to these accounts; repeatable.
    #[arg(long = "account")]
    pub accounts: Vec<AccountId>,
    /// Post the batch instead of previewing it.
    #[arg(long, default_value_t = false)]
    pub post: bool,
}

impl RevaluationArgs {
    pub fn command(&self) -> RevaluationCommand {
        RevaluationCommand {
            date: self.date,
            method: self.method,
            scope: RevaluationScope {
                currencies: self.currencies.clone(),
                accounts: self.accounts.clone(),
            },
            preview: !self.post,
        }
    }
}

fn parse_method(raw: &str) -> Result<RevaluationMethod, String> {
    RevaluationMethod::parse(raw)
        .ok_or_else(|| format!("unknown revaluation method '{raw}'"))
}
