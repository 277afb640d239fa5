//! Backfill: rebuilding report documents from raw history.
//!
//! Hour-level backfill recomputes buckets from the raw sensor and feed logs
//! and overwrites whatever is at the key, seed or not — the logs are the
//! ground truth for past periods. The higher levels simply re-run the
//! rollup over every period that has child data, which makes the whole
//! chain safe to replay after an outage.

use chrono::{Days, NaiveDate, Timelike, Utc};
use pondpulse_core::{timekeys, Collection, DailyReport, HourRecord};
use pondpulse_store::{AggregationStore, SensorHistory};
use std::collections::BTreeSet;

use crate::rollup::{rollup, RollupLevel, RollupOutcome};
use crate::{to_doc, AggError};

pub const SOURCE_BACKFILL: &str = "backfill";

/// Counts for one backfill run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillSummary {
    /// Periods recomputed and written.
    pub written: u32,
    /// Periods with no underlying data, left untouched.
    pub skipped: u32,
}

/// Rebuilds one owner's hour buckets for an inclusive date range from the
/// raw sensor and feed logs.
///
/// Hours with neither readings nor feed are skipped, not zeroed, so a seed
/// placed at an empty hour survives.
///
/// # Errors
///
/// Propagates [`AggError::Store`] from history reads or document writes.
pub async fn backfill_hours<S, H>(
    store: &S,
    history: &H,
    owner: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<BackfillSummary, AggError>
where
    S: AggregationStore,
    H: SensorHistory,
{
    let mut summary = BackfillSummary::default();
    let mut date = from;
    while date <= to {
        let readings = history.readings_on(owner, date).await?;
        let feed_events = history.feed_events_on(owner, date).await?;

        for hour in 0..24 {
            let mut record = HourRecord::empty(date, hour, SOURCE_BACKFILL, Utc::now());
            for reading in readings.iter().filter(|r| r.at.hour() == hour) {
                if let Some(temp) = reading.temperature_c.filter(|v| v.is_finite()) {
                    record.temperature_sum += temp;
                    record.temperature_count += 1;
                }
                if let Some(ph) = reading.ph.filter(|v| v.is_finite()) {
                    record.ph_sum += ph;
                    record.ph_count += 1;
                }
            }
            if record.temperature_count > 0 {
                record.temperature_avg =
                    record.temperature_sum / f64::from(record.temperature_count);
            }
            if record.ph_count > 0 {
                record.ph_avg = record.ph_sum / f64::from(record.ph_count);
            }
            record.feed_used_kg = feed_events
                .iter()
                .filter(|e| e.at.hour() == hour && e.amount_kg.is_finite() && e.amount_kg > 0.0)
                .map(|e| e.amount_kg)
                .sum();

            if !record.has_reading() && record.feed_used_kg <= 0.0 {
                summary.skipped += 1;
                continue;
            }

            let key = timekeys::hour_key(date, hour);
            // Full overwrite: recomputed history replaces whatever is there.
            store
                .update_document(owner, Collection::HourRecords, &key, move |_| {
                    to_doc(&record)
                })
                .await?;
            summary.written += 1;
        }
        match date.checked_add_days(Days::new(1)) {
            Some(next) => date = next,
            None => break,
        }
    }
    Ok(summary)
}

/// Re-runs the day rollup for every date that has at least one non-seed
/// hour bucket.
///
/// # Errors
///
/// Propagates storage failures from listing or rollup.
pub async fn backfill_days<S: AggregationStore>(
    store: &S,
    owner: &str,
) -> Result<BackfillSummary, AggError> {
    let dates: BTreeSet<String> = store
        .list_documents(owner, Collection::HourRecords)
        .await?
        .into_iter()
        .filter_map(|doc| serde_json::from_value::<HourRecord>(doc).ok())
        .filter(|r| !r.is_seed)
        .map(|r| r.date)
        .collect();
    rollup_each(store, owner, RollupLevel::Day, dates).await
}

/// Re-runs the week rollup for every ISO week touched by a non-seed daily
/// report.
///
/// # Errors
///
/// Propagates storage failures from listing or rollup.
pub async fn backfill_weeks<S: AggregationStore>(
    store: &S,
    owner: &str,
) -> Result<BackfillSummary, AggError> {
    let weeks = daily_period_keys(store, owner, timekeys::iso_week_key).await?;
    rollup_each(store, owner, RollupLevel::Week, weeks).await
}

/// Re-runs the month rollup for every month touched by a non-seed daily
/// report.
///
/// # Errors
///
/// Propagates storage failures from listing or rollup.
pub async fn backfill_months<S: AggregationStore>(
    store: &S,
    owner: &str,
) -> Result<BackfillSummary, AggError> {
    let months = daily_period_keys(store, owner, timekeys::month_key).await?;
    rollup_each(store, owner, RollupLevel::Month, months).await
}

async fn daily_period_keys<S: AggregationStore>(
    store: &S,
    owner: &str,
    key_of: fn(NaiveDate) -> String,
) -> Result<BTreeSet<String>, AggError> {
    Ok(store
        .list_documents(owner, Collection::DailyReports)
        .await?
        .into_iter()
        .filter_map(|doc| serde_json::from_value::<DailyReport>(doc).ok())
        .filter(|d| !d.is_seed)
        .filter_map(|d| timekeys::parse_day_key(&d.date).ok())
        .map(key_of)
        .collect())
}

async fn rollup_each<S: AggregationStore>(
    store: &S,
    owner: &str,
    level: RollupLevel,
    keys: BTreeSet<String>,
) -> Result<BackfillSummary, AggError> {
    let mut summary = BackfillSummary::default();
    for key in keys {
        match rollup(store, owner, level, &key).await? {
            RollupOutcome::Written(_) => summary.written += 1,
            RollupOutcome::NoData => summary.skipped += 1,
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use pondpulse_store::{FeedEvent, MemoryHistory, MemoryStore, RawReading};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        format!("2025-01-{day:02}T{hour:02}:{minute:02}:00Z")
            .parse()
            .unwrap()
    }

    fn reading(at: DateTime<Utc>, temperature_c: Option<f64>, ph: Option<f64>) -> RawReading {
        RawReading {
            at,
            temperature_c,
            ph,
        }
    }

    #[tokio::test]
    async fn hours_are_rebuilt_from_raw_logs() {
        let store = MemoryStore::new();
        let history = MemoryHistory::new();
        history.add_reading("farm-1", reading(at(15, 8, 0), Some(24.0), Some(7.0)));
        history.add_reading("farm-1", reading(at(15, 8, 30), Some(26.0), None));
        history.add_reading("farm-1", reading(at(15, 10, 0), None, Some(7.4)));
        history.add_feed_event(
            "farm-1",
            FeedEvent {
                at: at(15, 8, 15),
                amount_kg: 1.5,
            },
        );

        let summary = backfill_hours(&store, &history, "farm-1", date(2025, 1, 15), date(2025, 1, 15))
            .await
            .unwrap();
        assert_eq!(summary.written, 2);
        assert_eq!(summary.skipped, 22);

        let doc = store
            .get_document("farm-1", Collection::HourRecords, "2025-01-15:08")
            .await
            .unwrap()
            .unwrap();
        let record: HourRecord = serde_json::from_value(doc).unwrap();
        assert_eq!(record.temperature_count, 2);
        assert!((record.temperature_avg - 25.0).abs() < 1e-9);
        assert_eq!(record.ph_count, 1);
        assert!((record.feed_used_kg - 1.5).abs() < 1e-9);
        assert_eq!(record.source, SOURCE_BACKFILL);
    }

    #[tokio::test]
    async fn backfill_overwrites_stale_buckets_but_spares_empty_hours() {
        let store = MemoryStore::new();
        let history = MemoryHistory::new();
        history.add_reading("farm-1", reading(at(15, 8, 0), Some(20.0), None));

        // Stale bucket at hour 8 and a seed at hour 9.
        let stale = HourRecord::empty(date(2025, 1, 15), 8, "sampler", Utc::now());
        store
            .merge_document(
                "farm-1",
                Collection::HourRecords,
                "2025-01-15:08",
                serde_json::to_value(&stale).unwrap(),
            )
            .await
            .unwrap();
        let seed = HourRecord::seed(date(2025, 1, 15), 9, Utc::now());
        store
            .merge_document(
                "farm-1",
                Collection::HourRecords,
                "2025-01-15:09",
                serde_json::to_value(&seed).unwrap(),
            )
            .await
            .unwrap();

        backfill_hours(&store, &history, "farm-1", date(2025, 1, 15), date(2025, 1, 15))
            .await
            .unwrap();

        let rebuilt: HourRecord = serde_json::from_value(
            store
                .get_document("farm-1", Collection::HourRecords, "2025-01-15:08")
                .await
                .unwrap()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(rebuilt.source, SOURCE_BACKFILL);
        assert_eq!(rebuilt.temperature_count, 1);

        let untouched: HourRecord = serde_json::from_value(
            store
                .get_document("farm-1", Collection::HourRecords, "2025-01-15:09")
                .await
                .unwrap()
                .unwrap(),
        )
        .unwrap();
        assert!(untouched.is_seed, "empty hour must not erase the seed");
    }

    #[tokio::test]
    async fn day_backfill_covers_every_date_with_hour_data() {
        let store = MemoryStore::new();
        for (day, hour) in [(13, 8), (13, 9), (15, 10)] {
            let d = date(2025, 1, day);
            let mut record = HourRecord::empty(d, hour, "sampler", Utc::now());
            record.temperature_sum = 25.0;
            record.temperature_count = 1;
            record.temperature_avg = 25.0;
            store
                .merge_document(
                    "farm-1",
                    Collection::HourRecords,
                    &timekeys::hour_key(d, hour),
                    serde_json::to_value(&record).unwrap(),
                )
                .await
                .unwrap();
        }

        let summary = backfill_days(&store, "farm-1").await.unwrap();
        assert_eq!(summary.written, 2);
        assert_eq!(summary.skipped, 0);
        assert!(store
            .get_document("farm-1", Collection::DailyReports, "2025-01-13")
            .await
            .unwrap()
            .is_some());
        assert!(store
            .get_document("farm-1", Collection::DailyReports, "2025-01-15")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn week_and_month_backfill_follow_daily_reports() {
        let store = MemoryStore::new();
        for key in ["2025-01-13", "2025-01-20", "2025-02-03"] {
            let report = DailyReport {
                date: key.to_string(),
                avg_temperature: Some(25.0),
                avg_ph: Some(7.0),
                total_feed_kg: Some(1.0),
                coverage_hours: 4,
                is_seed: false,
                source: "rollup".to_string(),
                generated_at: Utc::now(),
            };
            store
                .merge_document(
                    "farm-1",
                    Collection::DailyReports,
                    key,
                    serde_json::to_value(&report).unwrap(),
                )
                .await
                .unwrap();
        }

        let weeks = backfill_weeks(&store, "farm-1").await.unwrap();
        assert_eq!(weeks.written, 3); // W03, W04, W06

        let months = backfill_months(&store, "farm-1").await.unwrap();
        assert_eq!(months.written, 2); // 2025-01, 2025-02
        assert!(store
            .get_document("farm-1", Collection::MonthlyReports, "2025-02")
            .await
            .unwrap()
            .is_some());
    }
}
