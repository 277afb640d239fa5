//! Report document types for the four aggregation levels.
//!
//! Documents are stored as JSON with camelCase field names (the historical
//! wire format shared with the export service). Every level carries the
//! same provenance trio: `isSeed`, `source`, and `generatedAt`. Seed
//! documents are placeholders with all metrics zeroed/nulled; they exist so
//! consumers never see "not found" for the current period and are excluded
//! from all aggregation math.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::timekeys;

/// The four per-owner document collections, one per granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    HourRecords,
    DailyReports,
    WeeklyReports,
    MonthlyReports,
}

impl Collection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::HourRecords => "hour_records",
            Collection::DailyReports => "daily_reports",
            Collection::WeeklyReports => "weekly_reports",
            Collection::MonthlyReports => "monthly_reports",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One hour bucket of sensor samples and feed usage, per `(owner, date, hour)`.
///
/// Averages are running sums persisted in the document itself; the
/// invariant `avg == sum / count` holds whenever `count > 0`, with `0.0` as
/// the neutral value at count 0 so the document shape stays stable under
/// field merges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourRecord {
    pub date: String,
    pub hour: u32,
    #[serde(default)]
    pub temperature_sum: f64,
    #[serde(default)]
    pub temperature_count: u32,
    #[serde(default)]
    pub temperature_avg: f64,
    #[serde(default)]
    pub ph_sum: f64,
    #[serde(default)]
    pub ph_count: u32,
    #[serde(default)]
    pub ph_avg: f64,
    #[serde(default)]
    pub feed_used_kg: f64,
    #[serde(default)]
    pub is_seed: bool,
    #[serde(default)]
    pub source: String,
    pub generated_at: DateTime<Utc>,
}

impl HourRecord {
    /// An empty non-seed bucket, ready to absorb the first sample.
    #[must_use]
    pub fn empty(date: NaiveDate, hour: u32, source: &str, now: DateTime<Utc>) -> Self {
        Self {
            date: timekeys::day_key(date),
            hour,
            temperature_sum: 0.0,
            temperature_count: 0,
            temperature_avg: 0.0,
            ph_sum: 0.0,
            ph_count: 0,
            ph_avg: 0.0,
            feed_used_kg: 0.0,
            is_seed: false,
            source: source.to_string(),
            generated_at: now,
        }
    }

    /// Placeholder bucket for a period with no data yet.
    #[must_use]
    pub fn seed(date: NaiveDate, hour: u32, now: DateTime<Utc>) -> Self {
        Self {
            is_seed: true,
            ..Self::empty(date, hour, "seed", now)
        }
    }

    /// Whether this bucket holds at least one real sensor reading.
    #[must_use]
    pub fn has_reading(&self) -> bool {
        self.temperature_count > 0 || self.ph_count > 0
    }
}

/// One day's rollup of hour buckets, per `(owner, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReport {
    pub date: String,
    pub avg_temperature: Option<f64>,
    pub avg_ph: Option<f64>,
    /// Older documents stored this field as `totalFeed`; accept both on read.
    #[serde(alias = "totalFeed")]
    pub total_feed_kg: Option<f64>,
    #[serde(default)]
    pub coverage_hours: u32,
    #[serde(default)]
    pub is_seed: bool,
    #[serde(default)]
    pub source: String,
    pub generated_at: DateTime<Utc>,
}

impl DailyReport {
    #[must_use]
    pub fn seed(date: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            date: timekeys::day_key(date),
            avg_temperature: None,
            avg_ph: None,
            total_feed_kg: None,
            coverage_hours: 0,
            is_seed: true,
            source: "seed".to_string(),
            generated_at: now,
        }
    }
}

/// One ISO week's rollup of daily reports, per `(owner, isoWeek)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyReport {
    pub week: String,
    pub avg_temperature: Option<f64>,
    pub avg_ph: Option<f64>,
    #[serde(alias = "totalFeed")]
    pub total_feed_kg: Option<f64>,
    #[serde(default)]
    pub coverage_days: u32,
    #[serde(default)]
    pub is_seed: bool,
    #[serde(default)]
    pub source: String,
    pub generated_at: DateTime<Utc>,
}

impl WeeklyReport {
    #[must_use]
    pub fn seed(week: &str, now: DateTime<Utc>) -> Self {
        Self {
            week: week.to_string(),
            avg_temperature: None,
            avg_ph: None,
            total_feed_kg: None,
            coverage_days: 0,
            is_seed: true,
            source: "seed".to_string(),
            generated_at: now,
        }
    }
}

/// One calendar month's rollup of daily reports, per `(owner, yearMonth)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyReport {
    pub month: String,
    pub avg_temperature: Option<f64>,
    pub avg_ph: Option<f64>,
    #[serde(alias = "totalFeed")]
    pub total_feed_kg: Option<f64>,
    #[serde(default)]
    pub coverage_days: u32,
    #[serde(default)]
    pub is_seed: bool,
    #[serde(default)]
    pub source: String,
    pub generated_at: DateTime<Utc>,
}

impl MonthlyReport {
    #[must_use]
    pub fn seed(month: &str, now: DateTime<Utc>) -> Self {
        Self {
            month: month.to_string(),
            avg_temperature: None,
            avg_ph: None,
            total_feed_kg: None,
            coverage_days: 0,
            is_seed: true,
            source: "seed".to_string(),
            generated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn hour_record_serializes_with_camel_case_fields() {
        let record = HourRecord::empty(date(2025, 1, 15), 8, "sampler", Utc::now());
        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["date"], "2025-01-15");
        assert_eq!(json["temperatureSum"], 0.0);
        assert_eq!(json["feedUsedKg"], 0.0);
        assert_eq!(json["isSeed"], false);
        assert_eq!(json["source"], "sampler");
    }

    #[test]
    fn hour_record_tolerates_missing_metric_fields() {
        // Partial documents from older writers only carry some fields.
        let json = serde_json::json!({
            "date": "2025-01-15",
            "hour": 3,
            "temperatureSum": 48.0,
            "temperatureCount": 2,
            "temperatureAvg": 24.0,
            "generatedAt": "2025-01-15T03:05:00Z",
        });
        let record: HourRecord = serde_json::from_value(json).expect("deserialize");
        assert_eq!(record.temperature_count, 2);
        assert_eq!(record.ph_count, 0);
        assert!(!record.is_seed);
        assert!(record.has_reading());
    }

    #[test]
    fn daily_report_accepts_legacy_total_feed_field() {
        let json = serde_json::json!({
            "date": "2025-01-15",
            "avgTemperature": 25.0,
            "avgPh": null,
            "totalFeed": 3.5,
            "coverageHours": 2,
            "generatedAt": "2025-01-16T00:10:00Z",
        });
        let report: DailyReport = serde_json::from_value(json).expect("deserialize");
        assert_eq!(report.total_feed_kg, Some(3.5));
    }

    #[test]
    fn seed_documents_are_flagged_and_zeroed() {
        let now = Utc::now();
        let hour = HourRecord::seed(date(2025, 1, 15), 0, now);
        assert!(hour.is_seed);
        assert!(!hour.has_reading());

        let daily = DailyReport::seed(date(2025, 1, 15), now);
        assert!(daily.is_seed);
        assert_eq!(daily.coverage_hours, 0);
        assert!(daily.avg_temperature.is_none());

        let weekly = WeeklyReport::seed("2025-W03", now);
        assert!(weekly.is_seed);
        assert_eq!(weekly.week, "2025-W03");

        let monthly = MonthlyReport::seed("2025-01", now);
        assert!(monthly.is_seed);
        assert_eq!(monthly.coverage_days, 0);
    }
}
