//! Fleet-wide batch entry points, shared by the scheduler and the CLI.
//!
//! Every job iterates the owner registry and isolates failures: one owner's
//! sensor outage or corrupt document is logged and counted, and the loop
//! moves on to the next owner. A job only returns `Err` when the owner
//! registry itself cannot be read.

use chrono::{Datelike, Days, NaiveDate, Utc};
use pondpulse_core::timekeys;
use pondpulse_store::AggregationStore;
use serde::Serialize;
use std::future::Future;

use crate::rollup::{rollup, RollupLevel, RollupOutcome};
use crate::sampler::{self, SensorSnapshot};
use crate::seed;
use crate::{AggError, BoxError};

/// Live readings provider, one snapshot per owner. The production
/// implementation talks to the sensor gateway over HTTP.
pub trait SensorSource: Send + Sync {
    fn snapshot(
        &self,
        owner: &str,
    ) -> impl Future<Output = Result<SensorSnapshot, BoxError>> + Send;
}

/// Outcome counts for one fleet-wide job run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Owners whose period was computed and written.
    pub processed: u32,
    /// Owners with no data for the period (nothing written).
    pub skipped: u32,
    /// Owners whose run failed; the others were unaffected.
    pub errors: u32,
    /// The period the run targeted, when the job has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_key: Option<String>,
    pub timestamp: chrono::DateTime<Utc>,
}

impl RunSummary {
    fn new(period_key: Option<String>) -> Self {
        Self {
            processed: 0,
            skipped: 0,
            errors: 0,
            period_key,
            timestamp: Utc::now(),
        }
    }
}

/// Samples every active owner's live sensors into their current hour bucket.
///
/// # Errors
///
/// Returns [`AggError::Store`] only if the owner registry cannot be listed.
pub async fn sample_all<S, G>(store: &S, source: &G) -> Result<RunSummary, AggError>
where
    S: AggregationStore,
    G: SensorSource,
{
    let mut summary = RunSummary::new(None);
    for owner in store.list_owners().await? {
        let result = async {
            let snapshot = source
                .snapshot(&owner)
                .await
                .map_err(AggError::Source)?;
            sample(store, &owner, snapshot).await
        }
        .await;
        match result {
            Ok(true) => summary.processed += 1,
            Ok(false) => summary.skipped += 1,
            Err(err) => {
                tracing::warn!(owner, error = %err, "hourly sample failed");
                summary.errors += 1;
            }
        }
    }
    Ok(summary)
}

async fn sample<S: AggregationStore>(
    store: &S,
    owner: &str,
    snapshot: SensorSnapshot,
) -> Result<bool, AggError> {
    sampler::sample(store, owner, snapshot, Utc::now()).await
}

/// Rolls up one day for every active owner; defaults to yesterday.
///
/// # Errors
///
/// Returns [`AggError::TimeKey`] for an invalid explicit key, or
/// [`AggError::Store`] if the owner registry cannot be listed.
pub async fn rollup_day_all<S: AggregationStore>(
    store: &S,
    date: Option<NaiveDate>,
) -> Result<RunSummary, AggError> {
    let target = date.unwrap_or_else(|| default_day(Utc::now().date_naive()));
    let key = timekeys::day_key(target);
    rollup_all(store, RollupLevel::Day, key).await
}

/// Rolls up one ISO week for every active owner; defaults to last week.
///
/// # Errors
///
/// Returns [`AggError::TimeKey`] for an invalid explicit key, or
/// [`AggError::Store`] if the owner registry cannot be listed.
pub async fn rollup_week_all<S: AggregationStore>(
    store: &S,
    week_key: Option<&str>,
) -> Result<RunSummary, AggError> {
    let key = match week_key {
        Some(key) => {
            timekeys::iso_week_monday(key)?;
            key.to_string()
        }
        None => default_week_key(Utc::now().date_naive()),
    };
    rollup_all(store, RollupLevel::Week, key).await
}

/// Rolls up one month for every active owner; defaults to last month.
///
/// # Errors
///
/// Returns [`AggError::TimeKey`] for an invalid explicit key, or
/// [`AggError::Store`] if the owner registry cannot be listed.
pub async fn rollup_month_all<S: AggregationStore>(
    store: &S,
    month_key: Option<&str>,
) -> Result<RunSummary, AggError> {
    let key = match month_key {
        Some(key) => {
            timekeys::month_first_day(key)?;
            key.to_string()
        }
        None => default_month_key(Utc::now().date_naive()),
    };
    rollup_all(store, RollupLevel::Month, key).await
}

async fn rollup_all<S: AggregationStore>(
    store: &S,
    level: RollupLevel,
    key: String,
) -> Result<RunSummary, AggError> {
    let mut summary = RunSummary::new(Some(key.clone()));
    for owner in store.list_owners().await? {
        match rollup(store, &owner, level, &key).await {
            Ok(RollupOutcome::Written(_)) => summary.processed += 1,
            Ok(RollupOutcome::NoData) => summary.skipped += 1,
            Err(err) => {
                tracing::warn!(owner, %level, key, error = %err, "rollup failed");
                summary.errors += 1;
            }
        }
    }
    tracing::info!(
        %level,
        key,
        processed = summary.processed,
        skipped = summary.skipped,
        errors = summary.errors,
        "rollup run complete"
    );
    Ok(summary)
}

/// Seeds the current hour, day, week, and month keys for every active owner.
///
/// `processed` counts owners that had at least one seed created.
///
/// # Errors
///
/// Returns [`AggError::Store`] only if the owner registry cannot be listed.
pub async fn ensure_seeds_all<S: AggregationStore>(store: &S) -> Result<RunSummary, AggError> {
    let now = Utc::now();
    let mut summary = RunSummary::new(None);
    for owner in store.list_owners().await? {
        match seed::ensure_current_seeds(store, &owner, now).await {
            Ok(0) => summary.skipped += 1,
            Ok(_) => summary.processed += 1,
            Err(err) => {
                tracing::warn!(owner, error = %err, "seeding failed");
                summary.errors += 1;
            }
        }
    }
    Ok(summary)
}

/// Default day-rollup target: yesterday.
fn default_day(today: NaiveDate) -> NaiveDate {
    today.checked_sub_days(Days::new(1)).unwrap_or(today)
}

/// Default week-rollup target: the ISO week containing seven days ago,
/// which is the most recent fully elapsed week when the job runs on Monday.
fn default_week_key(today: NaiveDate) -> String {
    timekeys::iso_week_key(today.checked_sub_days(Days::new(7)).unwrap_or(today))
}

/// Default month-rollup target: the month before today's.
fn default_month_key(today: NaiveDate) -> String {
    let first = today.with_day(1).unwrap_or(today);
    timekeys::month_key(default_day(first))
}
