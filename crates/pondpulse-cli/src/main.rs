mod commands;

use clap::{Parser, Subcommand};
use pondpulse_core::timekeys;

#[derive(Debug, Parser)]
#[command(name = "pondpulse-cli")]
#[command(about = "PondPulse report pipeline command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run pending database migrations
    Migrate,
    /// Register (or reactivate) an owner in the tenant registry
    Owner {
        /// Owner id (e.g. farm-1)
        owner: String,
        /// Display name; defaults to the owner id
        #[arg(long)]
        name: Option<String>,
    },
    /// Create current-period seed documents for every active owner
    Seed,
    /// Run a rollup across all active owners
    Rollup {
        #[command(subcommand)]
        level: RollupCommands,
    },
    /// Rebuild report documents from stored data
    Backfill {
        #[command(subcommand)]
        target: BackfillCommands,
    },
}

#[derive(Debug, Subcommand)]
enum RollupCommands {
    /// Roll hour records into a daily report (defaults to yesterday)
    Day {
        /// Day key, e.g. 2025-01-15
        #[arg(long)]
        period: Option<String>,
    },
    /// Roll daily reports into a weekly report (defaults to last week)
    Week {
        /// ISO week key, e.g. 2025-W03
        #[arg(long)]
        period: Option<String>,
    },
    /// Roll daily reports into a monthly report (defaults to last month)
    Month {
        /// Month key, e.g. 2025-01
        #[arg(long)]
        period: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum BackfillCommands {
    /// Rebuild hour records from raw sensor and feed logs
    Hours {
        /// Owner id to backfill
        #[arg(long)]
        owner: String,
        /// First day of the range (inclusive), e.g. 2025-01-01
        #[arg(long)]
        from: String,
        /// Last day of the range (inclusive), e.g. 2025-01-31
        #[arg(long)]
        to: String,
    },
    /// Re-run the day rollup for every date with hour data
    Days {
        /// Restrict to one owner; defaults to all active owners
        #[arg(long)]
        owner: Option<String>,
    },
    /// Re-run the week rollup for every week with daily reports
    Weeks {
        #[arg(long)]
        owner: Option<String>,
    },
    /// Re-run the month rollup for every month with daily reports
    Months {
        #[arg(long)]
        owner: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let pool = pondpulse_store::connect_pool_from_env().await?;
    let store = pondpulse_store::PgStore::new(pool);

    match cli.command {
        Commands::Migrate => {
            pondpulse_store::run_migrations(store.pool()).await?;
            println!("migrations up to date");
        }
        Commands::Owner { owner, name } => {
            store
                .upsert_owner(&owner, name.as_deref().unwrap_or(&owner))
                .await?;
            println!("owner {owner} registered");
        }
        Commands::Seed => commands::run_seed(&store).await?,
        Commands::Rollup { level } => {
            let (level, period) = match level {
                RollupCommands::Day { period } => (commands::Level::Day, period),
                RollupCommands::Week { period } => (commands::Level::Week, period),
                RollupCommands::Month { period } => (commands::Level::Month, period),
            };
            commands::run_rollup(&store, level, period.as_deref()).await?;
        }
        Commands::Backfill { target } => match target {
            BackfillCommands::Hours { owner, from, to } => {
                let from = timekeys::parse_day_key(&from)?;
                let to = timekeys::parse_day_key(&to)?;
                commands::run_backfill_hours(&store, &owner, from, to).await?;
            }
            BackfillCommands::Days { owner } => {
                commands::run_backfill(&store, commands::Level::Day, owner.as_deref()).await?;
            }
            BackfillCommands::Weeks { owner } => {
                commands::run_backfill(&store, commands::Level::Week, owner.as_deref()).await?;
            }
            BackfillCommands::Months { owner } => {
                commands::run_backfill(&store, commands::Level::Month, owner.as_deref()).await?;
            }
        },
    }

    Ok(())
}
