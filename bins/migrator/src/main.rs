//! Database migration runner for Ledgerline.
//!
//! Usage:
//!   ledgerline-migrator up [-n N]    - Run pending migrations
//!   ledgerline-migrator down [-n N]  - Roll back migrations (default 1)
//!   ledgerline-migrator status       - Show migration status
//!   ledgerline-migrator fresh        - Drop all tables and re-run migrations
//!
//! The connection comes from the usual configuration layers
//! (`LEDGERLINE__DATABASE__URL` and friends).

use anyhow::Context;
use clap::{Parser, Subcommand};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use ledgerline_db::{connect, migration::Migrator};
use ledgerline_shared::{AppConfig, telemetry};

#[derive(Debug, Parser)]
#[command(name = "ledgerline-migrator", about = "Apply Ledgerline schema migrations")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending migrations.
    Up {
        /// Apply at most this many.
        #[arg(short = 'n', long)]
        steps: Option<u32>,
    },
    /// Roll back applied migrations.
    Down {
        /// Roll back this many.
        #[arg(short = 'n', long, default_value_t = 1)]
        steps: u32,
    },
    /// Print applied and pending migrations.
    Status,
    /// Drop everything and re-apply all migrations.
    Fresh,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::load().context("Failed to load configuration")?;
    let db = connect(&config.database).await?;

    match cli.command {
        Command::Up { steps } => {
            Migrator::up(&db, steps).await?;
            info!("Migrations applied");
        }
        Command::Down { steps } => {
            Migrator::down(&db, Some(steps)).await?;
            info!(steps, "Migrations rolled back");
        }
        Command::Status => Migrator::status(&db).await?,
        Command::Fresh => {
            Migrator::fresh(&db).await?;
            info!("Schema recreated");
        }
    }
    Ok(())
}
