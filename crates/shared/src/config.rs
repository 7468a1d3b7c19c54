//! Application configuration management.
//!
//! Layered loading: `config/default.toml`, then `config/{RUN_MODE}.toml`,
//! then `LEDGERLINE__SECTION__KEY` environment variables.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::types::CurrencyCode;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// JWT configuration.
    pub jwt: JwtConfig,
    /// Journal posting policy.
    #[serde(default)]
    pub posting: PostingConfig,
    /// FX gain/loss account mapping.
    #[serde(default)]
    pub fx: FxConfig,
    /// Periodic job settings.
    #[serde(default)]
    pub jobs: JobsConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// JWT configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// Secret key for signing tokens.
    pub secret: String,
    /// Access token expiration in seconds.
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry_secs: u64,
}

fn default_access_token_expiry() -> u64 {
    900 // 15 minutes
}

/// Rules governing when a journal entry is "balanced enough" and how
/// approval hands off to posting.
#[derive(Debug, Clone, Deserialize)]
pub struct PostingConfig {
    /// Absolute rounding tolerance for debit/credit comparison.
    #[serde(default = "default_tolerance")]
    pub tolerance: Decimal,
    /// Maximum number of lines per entry.
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
    /// Post immediately when the approval request completes.
    #[serde(default = "default_auto_post")]
    pub auto_post_on_approval: bool,
    /// Tenant functional currency.
    #[serde(default = "default_base_currency")]
    pub base_currency: CurrencyCode,
    /// Tenant role allowed to define workflows and post or settle FX.
    #[serde(default = "default_admin_role")]
    pub admin_role: String,
}

impl Default for PostingConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            max_lines: default_max_lines(),
            auto_post_on_approval: default_auto_post(),
            base_currency: default_base_currency(),
            admin_role: default_admin_role(),
        }
    }
}

fn default_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

fn default_max_lines() -> usize {
    100
}

fn default_auto_post() -> bool {
    true
}

fn default_base_currency() -> CurrencyCode {
    CurrencyCode::USD
}

fn default_admin_role() -> String {
    "ledger_admin".to_string()
}

/// Account codes that receive FX gains and losses.
#[derive(Debug, Clone, Deserialize)]
pub struct FxConfig {
    /// Unrealized gain account code.
    #[serde(default = "default_unrealized_gain")]
    pub unrealized_gain_account: String,
    /// Unrealized loss account code.
    #[serde(default = "default_unrealized_loss")]
    pub unrealized_loss_account: String,
    /// Realized gain account code.
    #[serde(default = "default_realized_gain")]
    pub realized_gain_account: String,
    /// Realized loss account code.
    #[serde(default = "default_realized_loss")]
    pub realized_loss_account: String,
}

impl Default for FxConfig {
    fn default() -> Self {
        Self {
            unrealized_gain_account: default_unrealized_gain(),
            unrealized_loss_account: default_unrealized_loss(),
            realized_gain_account: default_realized_gain(),
            realized_loss_account: default_realized_loss(),
        }
    }
}

fn default_unrealized_gain() -> String {
    "4910".to_string()
}

fn default_unrealized_loss() -> String {
    "5910".to_string()
}

fn default_realized_gain() -> String {
    "4920".to_string()
}

fn default_realized_loss() -> String {
    "5920".to_string()
}

/// Periodic job settings.
#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    /// Maximum requests evaluated per tenant in one escalation sweep.
    #[serde(default = "default_sweep_limit")]
    pub escalation_batch_limit: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            escalation_batch_limit: default_sweep_limit(),
        }
    }
}

fn default_sweep_limit() -> usize {
    500
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("LEDGERLINE").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
