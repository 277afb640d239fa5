//! Hourly aggregation of live sensor snapshots.
//!
//! Each sample is folded into the current hour bucket with running
//! sum/count/average fields persisted in the document itself — there is no
//! in-process accumulator state. The read-modify-write runs inside the
//! store's atomic update so a concurrent backfill or a second sampler
//! instance cannot lose updates. Averages are plain arithmetic means over
//! the samples taken within the hour; sampling happens on a fixed cadence,
//! so this is equivalent to time-weighting.

use chrono::{DateTime, Timelike, Utc};
use pondpulse_core::{timekeys, Collection, HourRecord};
use pondpulse_store::AggregationStore;
use serde::Deserialize;

use crate::{to_doc, AggError};

pub const SOURCE_SAMPLER: &str = "sampler";

/// Instantaneous gateway readings for one owner. Either metric may be
/// absent when the corresponding probe is offline. Mirrors the gateway's
/// JSON payload (`{"temperatureC": .., "ph": ..}`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorSnapshot {
    pub temperature_c: Option<f64>,
    pub ph: Option<f64>,
}

impl SensorSnapshot {
    /// Drops non-finite readings; a NaN from a flaky probe must never
    /// poison a running sum.
    #[must_use]
    pub fn sanitized(self) -> Self {
        Self {
            temperature_c: self.temperature_c.filter(|v| v.is_finite()),
            ph: self.ph.filter(|v| v.is_finite()),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.temperature_c.is_none() && self.ph.is_none()
    }
}

/// Folds one snapshot into the owner's current hour bucket.
///
/// Returns `false` (and performs no write) when both readings are absent.
/// A seed placeholder at the key is superseded in place by the first real
/// sample.
///
/// # Errors
///
/// Propagates [`AggError::Store`] if the atomic update fails.
pub async fn sample<S: AggregationStore>(
    store: &S,
    owner: &str,
    snapshot: SensorSnapshot,
    now: DateTime<Utc>,
) -> Result<bool, AggError> {
    let snapshot = snapshot.sanitized();
    if snapshot.is_empty() {
        return Ok(false);
    }

    let date = now.date_naive();
    let hour = now.hour();
    let key = timekeys::hour_key(date, hour);

    store
        .update_document(owner, Collection::HourRecords, &key, move |doc| {
            let mut record = doc
                .and_then(|d| serde_json::from_value::<HourRecord>(d).ok())
                .filter(|r| !r.is_seed)
                .unwrap_or_else(|| HourRecord::empty(date, hour, SOURCE_SAMPLER, now));
            absorb(&mut record, snapshot);
            record.is_seed = false;
            record.source = SOURCE_SAMPLER.to_string();
            record.generated_at = now;
            to_doc(&record)
        })
        .await?;

    Ok(true)
}

/// Adds a feed-schedule event's quantity to the owner's current hour bucket.
///
/// Non-positive or non-finite amounts are ignored.
///
/// # Errors
///
/// Propagates [`AggError::Store`] if the atomic update fails.
pub async fn record_feed<S: AggregationStore>(
    store: &S,
    owner: &str,
    amount_kg: f64,
    now: DateTime<Utc>,
) -> Result<bool, AggError> {
    if !amount_kg.is_finite() || amount_kg <= 0.0 {
        return Ok(false);
    }

    let date = now.date_naive();
    let hour = now.hour();
    let key = timekeys::hour_key(date, hour);

    store
        .update_document(owner, Collection::HourRecords, &key, move |doc| {
            let mut record = doc
                .and_then(|d| serde_json::from_value::<HourRecord>(d).ok())
                .filter(|r| !r.is_seed)
                .unwrap_or_else(|| HourRecord::empty(date, hour, SOURCE_SAMPLER, now));
            record.feed_used_kg += amount_kg;
            record.is_seed = false;
            record.generated_at = now;
            to_doc(&record)
        })
        .await?;

    Ok(true)
}

fn absorb(record: &mut HourRecord, snapshot: SensorSnapshot) {
    if let Some(temp) = snapshot.temperature_c {
        record.temperature_sum += temp;
        record.temperature_count += 1;
        record.temperature_avg = record.temperature_sum / f64::from(record.temperature_count);
    }
    if let Some(ph) = snapshot.ph {
        record.ph_sum += ph;
        record.ph_count += 1;
        record.ph_avg = record.ph_sum / f64::from(record.ph_count);
    }
}
