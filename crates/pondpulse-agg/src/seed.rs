//! Seed placeholders for current periods.
//!
//! Consumers should never see "not found" for the period that is currently
//! in progress, so before real data arrives each current key gets a
//! placeholder document with zeroed metrics and `isSeed: true`. Creation
//! goes through the store's atomic update so a seed can never clobber a
//! document that a sampler or rollup wrote first.

use chrono::{DateTime, Timelike, Utc};
use pondpulse_core::{
    timekeys, Collection, DailyReport, HourRecord, MonthlyReport, WeeklyReport,
};
use pondpulse_store::AggregationStore;
use serde_json::Value;

use crate::{to_doc, AggError};

/// Creates a seed document at `key` unless a document already exists.
///
/// Returns `true` if a seed was created, `false` if the key was already
/// occupied (by a seed or a real document; either way nothing changes).
///
/// # Errors
///
/// Returns [`AggError::TimeKey`] if `key` is not a valid key for the
/// collection, or [`AggError::Store`] on storage failure.
pub async fn ensure_seed<S: AggregationStore>(
    store: &S,
    owner: &str,
    collection: Collection,
    key: &str,
    now: DateTime<Utc>,
) -> Result<bool, AggError> {
    let template = seed_template(collection, key, now)?;
    let marker = template.clone();
    let written = store
        .update_document(owner, collection, key, move |doc| match doc {
            Some(existing) => existing,
            None => template,
        })
        .await?;
    Ok(written == marker)
}

/// Seeds the owner's current hour, day, week, and month keys.
///
/// Returns how many seeds were actually created.
///
/// # Errors
///
/// Propagates the first storage failure.
pub async fn ensure_current_seeds<S: AggregationStore>(
    store: &S,
    owner: &str,
    now: DateTime<Utc>,
) -> Result<u32, AggError> {
    let today = now.date_naive();
    let targets = [
        (Collection::HourRecords, timekeys::hour_key(today, now.hour())),
        (Collection::DailyReports, timekeys::day_key(today)),
        (Collection::WeeklyReports, timekeys::iso_week_key(today)),
        (Collection::MonthlyReports, timekeys::month_key(today)),
    ];
    let mut created = 0;
    for (collection, key) in targets {
        if ensure_seed(store, owner, collection, &key, now).await? {
            created += 1;
        }
    }
    Ok(created)
}

/// Builds the placeholder document for a collection, validating the key.
fn seed_template(collection: Collection, key: &str, now: DateTime<Utc>) -> Result<Value, AggError> {
    let doc = match collection {
        Collection::HourRecords => {
            let (date, hour) = timekeys::parse_hour_key(key)?;
            to_doc(&HourRecord::seed(date, hour, now))
        }
        Collection::DailyReports => {
            let date = timekeys::parse_day_key(key)?;
            to_doc(&DailyReport::seed(date, now))
        }
        Collection::WeeklyReports => {
            timekeys::iso_week_monday(key)?;
            to_doc(&WeeklyReport::seed(key, now))
        }
        Collection::MonthlyReports => {
            timekeys::month_first_day(key)?;
            to_doc(&MonthlyReport::seed(key, now))
        }
    };
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pondpulse_store::MemoryStore;

    fn now() -> DateTime<Utc> {
        "2025-01-15T08:30:00Z".parse().unwrap()
    }

    #[tokio::test]
    async fn seed_is_created_once_and_never_replaces() {
        let store = MemoryStore::new();
        let created = ensure_seed(
            &store,
            "farm-1",
            Collection::DailyReports,
            "2025-01-15",
            now(),
        )
        .await
        .unwrap();
        assert!(created);

        let again = ensure_seed(
            &store,
            "farm-1",
            Collection::DailyReports,
            "2025-01-15",
            now(),
        )
        .await
        .unwrap();
        assert!(!again);

        let doc = store
            .get_document("farm-1", Collection::DailyReports, "2025-01-15")
            .await
            .unwrap()
            .unwrap();
        let report: DailyReport = serde_json::from_value(doc).unwrap();
        assert!(report.is_seed);
        assert_eq!(report.source, "seed");
    }

    #[tokio::test]
    async fn seed_never_clobbers_a_real_document() {
        let store = MemoryStore::new();
        let real = serde_json::json!({
            "date": "2025-01-15",
            "avgTemperature": 25.0,
            "avgPh": 7.1,
            "totalFeedKg": 3.0,
            "coverageHours": 20,
            "isSeed": false,
            "source": "rollup",
            "generatedAt": "2025-01-16T00:10:00Z",
        });
        store
            .merge_document("farm-1", Collection::DailyReports, "2025-01-15", real.clone())
            .await
            .unwrap();

        let created = ensure_seed(
            &store,
            "farm-1",
            Collection::DailyReports,
            "2025-01-15",
            now(),
        )
        .await
        .unwrap();
        assert!(!created);

        let doc = store
            .get_document("farm-1", Collection::DailyReports, "2025-01-15")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc, real);
    }

    #[tokio::test]
    async fn current_seeds_cover_all_four_levels() {
        let store = MemoryStore::new();
        let created = ensure_current_seeds(&store, "farm-1", now()).await.unwrap();
        assert_eq!(created, 4);

        for (collection, key) in [
            (Collection::HourRecords, "2025-01-15:08"),
            (Collection::DailyReports, "2025-01-15"),
            (Collection::WeeklyReports, "2025-W03"),
            (Collection::MonthlyReports, "2025-01"),
        ] {
            let doc = store
                .get_document("farm-1", collection, key)
                .await
                .unwrap();
            assert!(doc.is_some(), "missing seed in {collection} at {key}");
            assert_eq!(doc.unwrap()["isSeed"], true);
        }
    }

    #[tokio::test]
    async fn seed_rejects_malformed_keys() {
        let store = MemoryStore::new();
        let err = ensure_seed(
            &store,
            "farm-1",
            Collection::WeeklyReports,
            "2025-W60",
            now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AggError::TimeKey(_)));
    }
}
