//! Command handlers for the CLI, called from `main` after the database pool
//! is established. Each prints the run summary as JSON so the output can be
//! piped into scripts.

use pondpulse_agg::{backfill, jobs, BackfillSummary};
use pondpulse_core::timekeys;
use pondpulse_store::{AggregationStore, PgStore};

#[derive(Debug, Clone, Copy)]
pub(crate) enum Level {
    Day,
    Week,
    Month,
}

/// Seed current-period documents for every active owner.
pub(crate) async fn run_seed(store: &PgStore) -> anyhow::Result<()> {
    let summary = jobs::ensure_seeds_all(store).await?;
    print_summary(&serde_json::to_value(&summary)?);
    Ok(())
}

/// Run one rollup level across all active owners.
pub(crate) async fn run_rollup(
    store: &PgStore,
    level: Level,
    period: Option<&str>,
) -> anyhow::Result<()> {
    let summary = match level {
        Level::Day => {
            let date = period.map(timekeys::parse_day_key).transpose()?;
            jobs::rollup_day_all(store, date).await?
        }
        Level::Week => jobs::rollup_week_all(store, period).await?,
        Level::Month => jobs::rollup_month_all(store, period).await?,
    };
    print_summary(&serde_json::to_value(&summary)?);
    Ok(())
}

/// Rebuild one owner's hour records from raw logs for an inclusive range.
pub(crate) async fn run_backfill_hours(
    store: &PgStore,
    owner: &str,
    from: chrono::NaiveDate,
    to: chrono::NaiveDate,
) -> anyhow::Result<()> {
    anyhow::ensure!(from <= to, "--from must not be after --to");
    let summary = backfill::backfill_hours(store, store, owner, from, to).await?;
    println!(
        "{owner}: {} hour records written, {} empty hours skipped",
        summary.written, summary.skipped
    );
    Ok(())
}

/// Re-run a rollup level over every period with child data, for one owner
/// or the whole fleet. Per-owner failures are logged and the run continues.
pub(crate) async fn run_backfill(
    store: &PgStore,
    level: Level,
    owner: Option<&str>,
) -> anyhow::Result<()> {
    let owners = match owner {
        Some(owner) => vec![owner.to_string()],
        None => store.list_owners().await?,
    };

    for owner in owners {
        let result = match level {
            Level::Day => backfill::backfill_days(store, &owner).await,
            Level::Week => backfill::backfill_weeks(store, &owner).await,
            Level::Month => backfill::backfill_months(store, &owner).await,
        };
        match result {
            Ok(BackfillSummary { written, skipped }) => {
                println!("{owner}: {written} periods written, {skipped} skipped");
            }
            Err(e) => {
                tracing::warn!(owner, error = %e, "backfill failed");
                println!("{owner}: failed ({e})");
            }
        }
    }
    Ok(())
}

fn print_summary(summary: &serde_json::Value) {
    println!("{summary}");
}
