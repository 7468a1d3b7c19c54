//! Ledgerline periodic jobs.
//!
//! Usage:
//!   ledgerline-jobs escalations [--tenant ID]
//!   ledgerline-jobs fx-revaluation --tenant ID --date YYYY-MM-DD --method M
//!       [--currency CUR ...] [--account ID ...] [--post]
//!
//! Results are printed to stdout as JSON; logs go to stderr.

mod cli;

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::info;

use ledgerline_core::{GlEngine, LedgerPolicy};
use ledgerline_db::{PgStore, collaborators, connect};
use ledgerline_shared::{AppConfig, telemetry, types::Actor};

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::load().context("Failed to load configuration")?;
    let db = connect(&config.database).await?;
    let engine = GlEngine::new(
        LedgerPolicy::from(&config),
        Arc::new(PgStore::new(db.clone())),
        collaborators(&db),
    );

    let output = match cli.command {
        Command::Escalations(args) => {
            let report = engine.run_escalation_sweep(Utc::now(), args.tenant).await?;
            info!(
                examined = report.examined,
                failed = report.failed,
                "Escalation sweep finished"
            );
            serde_json::to_string_pretty(&report)?
        }
        Command::FxRevaluation(args) => {
            let batch = engine
                .run_fx_revaluation(args.tenant, Actor::System, &args.command())
                .await?;
            info!(
                tenant_id = %args.tenant,
                batch_key = %batch.key,
                status = ?batch.status,
                "FX revaluation finished"
            );
            serde_json::to_string_pretty(&batch)?
        }
    };

    println!("{output}");
    Ok(())
}
