//! Ledger-wide policy knobs.

use ledgerline_shared::AppConfig;
use ledgerline_shared::types::CurrencyCode;

use crate::currency::BalanceTolerance;
use crate::fx::FxAccounts;
use crate::journal::JournalValidator;

/// Policy shared by validation, posting, FX and the periodic jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerPolicy {
    /// The single "balanced enough" rule.
    pub tolerance: BalanceTolerance,
    /// Maximum lines per entry.
    pub max_lines: usize,
    /// Post in the same operation that completes approval.
    pub auto_post_on_approval: bool,
    /// Functional currency.
    pub base_currency: CurrencyCode,
    /// Gain and loss accounts.
    pub fx_accounts: FxAccounts,
    /// Requests evaluated per tenant per escalation sweep.
    pub escalation_batch_limit: usize,
    /// Role a user needs to define workflows and to post or settle FX.
    pub admin_role: String,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            tolerance: BalanceTolerance::DEFAULT,
            max_lines: JournalValidator::DEFAULT_MAX_LINES,
            auto_post_on_approval: true,
            base_currency: CurrencyCode::USD,
            fx_accounts: FxAccounts::default(),
            escalation_batch_limit: 500,
            admin_role: "ledger_admin".to_string(),
        }
    }
}

impl From<&AppConfig> for LedgerPolicy {
    fn from(config: &AppConfig) -> Self {
        Self {
            tolerance: BalanceTolerance::new(config.posting.tolerance),
            max_lines: config.posting.max_lines,
            auto_post_on_approval: config.posting.auto_post_on_approval,
            base_currency: config.posting.base_currency,
            fx_accounts: FxAccounts::from(&config.fx),
            escalation_batch_limit: config.jobs.escalation_batch_limit,
            admin_role: config.posting.admin_role.clone(),
        }
    }
}
