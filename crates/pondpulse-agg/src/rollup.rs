//! The rollup engine: hour buckets into daily reports, daily reports into
//! weekly and monthly reports.
//!
//! Day-level averages weight each hour by its sample count, so an hour with
//! twelve samples counts twelve times what an hour with one sample does.
//! Week and month levels average the child daily averages directly; days
//! are the natural unit at those granularities. Seeds and malformed
//! documents are excluded everywhere, and each metric is aggregated
//! independently so a dead pH probe never blanks out temperature.

use pondpulse_core::{timekeys, Collection, DailyReport, HourRecord};
use pondpulse_store::AggregationStore;
use serde_json::{json, Value};

use crate::AggError;

pub const SOURCE_ROLLUP: &str = "rollup";

/// Which aggregation level a rollup call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollupLevel {
    Day,
    Week,
    Month,
}

impl RollupLevel {
    #[must_use]
    pub fn target_collection(self) -> Collection {
        match self {
            RollupLevel::Day => Collection::DailyReports,
            RollupLevel::Week => Collection::WeeklyReports,
            RollupLevel::Month => Collection::MonthlyReports,
        }
    }
}

impl std::fmt::Display for RollupLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RollupLevel::Day => "day",
            RollupLevel::Week => "week",
            RollupLevel::Month => "month",
        })
    }
}

/// Result of one rollup call for one owner and period.
#[derive(Debug, Clone, PartialEq)]
pub enum RollupOutcome {
    /// The field patch that was merged into the target document.
    Written(Value),
    /// No child data for the period; nothing was written, so an existing
    /// seed (or stale report) at the key is left untouched.
    NoData,
}

/// Rolls one owner's period up from the level beneath it.
///
/// The write is a field merge keyed by the period, so re-running a rollup
/// overwrites the metric fields with freshly computed values and the
/// operation is idempotent.
///
/// # Errors
///
/// Returns [`AggError::TimeKey`] if `period_key` is not a valid key for the
/// level, or [`AggError::Store`] on storage failure.
pub async fn rollup<S: AggregationStore>(
    store: &S,
    owner: &str,
    level: RollupLevel,
    period_key: &str,
) -> Result<RollupOutcome, AggError> {
    match level {
        RollupLevel::Day => rollup_day(store, owner, period_key).await,
        RollupLevel::Week => {
            let dates = timekeys::dates_in_iso_week(period_key)?;
            rollup_over_days(store, owner, level, period_key, &dates).await
        }
        RollupLevel::Month => {
            let dates = timekeys::dates_in_month(period_key)?;
            rollup_over_days(store, owner, level, period_key, &dates).await
        }
    }
}

async fn rollup_day<S: AggregationStore>(
    store: &S,
    owner: &str,
    date_key: &str,
) -> Result<RollupOutcome, AggError> {
    timekeys::parse_day_key(date_key)?;

    let hours: Vec<HourRecord> = store
        .list_documents(owner, Collection::HourRecords)
        .await?
        .into_iter()
        .filter_map(|doc| serde_json::from_value::<HourRecord>(doc).ok())
        .filter(|r| r.date == date_key && !r.is_seed)
        .collect();

    // Coverage counts hours with at least one sensor reading. A feed-only
    // hour contributes its feed total but not coverage, and a day with no
    // readings at all is skipped outright.
    let coverage_hours =
        u32::try_from(hours.iter().filter(|r| r.has_reading()).count()).unwrap_or(u32::MAX);
    if coverage_hours == 0 {
        return Ok(RollupOutcome::NoData);
    }
    let has_feed = hours.iter().any(|r| r.feed_used_kg > 0.0);

    let avg_temperature = weighted_avg(
        hours
            .iter()
            .filter(|r| r.temperature_count > 0)
            .map(|r| (r.temperature_avg, r.temperature_count)),
    );
    let avg_ph = weighted_avg(
        hours
            .iter()
            .filter(|r| r.ph_count > 0)
            .map(|r| (r.ph_avg, r.ph_count)),
    );
    let total_feed_kg = has_feed.then(|| hours.iter().map(|r| r.feed_used_kg).sum::<f64>());

    let patch = json!({
        "date": date_key,
        "avgTemperature": avg_temperature,
        "avgPh": avg_ph,
        "totalFeedKg": total_feed_kg,
        "coverageHours": coverage_hours,
        "isSeed": false,
        "source": SOURCE_ROLLUP,
        "generatedAt": chrono::Utc::now(),
    });
    store
        .merge_document(owner, Collection::DailyReports, date_key, patch.clone())
        .await?;
    Ok(RollupOutcome::Written(patch))
}

async fn rollup_over_days<S: AggregationStore>(
    store: &S,
    owner: &str,
    level: RollupLevel,
    period_key: &str,
    dates: &[chrono::NaiveDate],
) -> Result<RollupOutcome, AggError> {
    let wanted: std::collections::HashSet<String> =
        dates.iter().copied().map(timekeys::day_key).collect();

    let days: Vec<DailyReport> = store
        .list_documents(owner, Collection::DailyReports)
        .await?
        .into_iter()
        .filter_map(|doc| serde_json::from_value::<DailyReport>(doc).ok())
        .filter(|d| wanted.contains(&d.date) && !d.is_seed)
        .collect();

    if days.is_empty() {
        return Ok(RollupOutcome::NoData);
    }

    let coverage_days = u32::try_from(days.len()).unwrap_or(u32::MAX);
    let avg_temperature = mean(days.iter().filter_map(|d| d.avg_temperature));
    let avg_ph = mean(days.iter().filter_map(|d| d.avg_ph));
    let feed: Vec<f64> = days.iter().filter_map(|d| d.total_feed_kg).collect();
    let total_feed_kg = (!feed.is_empty()).then(|| feed.iter().sum::<f64>());

    let period_field = match level {
        RollupLevel::Week => "week",
        _ => "month",
    };
    let patch = json!({
        period_field: period_key,
        "avgTemperature": avg_temperature,
        "avgPh": avg_ph,
        "totalFeedKg": total_feed_kg,
        "coverageDays": coverage_days,
        "isSeed": false,
        "source": SOURCE_ROLLUP,
        "generatedAt": chrono::Utc::now(),
    });
    store
        .merge_document(owner, level.target_collection(), period_key, patch.clone())
        .await?;
    Ok(RollupOutcome::Written(patch))
}

/// Mean weighted by sample count; `None` when the iterator is empty.
fn weighted_avg(values: impl Iterator<Item = (f64, u32)>) -> Option<f64> {
    let (sum, weight) = values.fold((0.0_f64, 0.0_f64), |(s, w), (avg, count)| {
        let count = f64::from(count);
        (s + avg * count, w + count)
    });
    (weight > 0.0).then(|| sum / weight)
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0_f64, 0u32), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / f64::from(count))
}
