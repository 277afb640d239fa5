//! In-memory [`AggregationStore`] and [`SensorHistory`] used by the
//! aggregation test suites and local experiments. Locks are never held
//! across await points, so every future stays Send.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use pondpulse_core::Collection;
use serde_json::Value;

use crate::store::{
    merge_fields, AggregationStore, FeedEvent, RawReading, SensorHistory,
};
use crate::StoreError;

type DocKey = (String, Collection);

#[derive(Debug, Default)]
struct Inner {
    owners: BTreeSet<String>,
    docs: HashMap<DocKey, BTreeMap<String, Value>>,
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only happens after a panic in another test thread;
        // recover the data rather than cascading the panic.
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn add_owner(&self, owner: &str) {
        self.lock().owners.insert(owner.to_string());
    }

    /// Number of documents in a collection, across seeds and real records.
    #[must_use]
    pub fn document_count(&self, owner: &str, collection: Collection) -> usize {
        self.lock()
            .docs
            .get(&(owner.to_string(), collection))
            .map_or(0, BTreeMap::len)
    }
}

impl AggregationStore for MemoryStore {
    async fn get_document(
        &self,
        owner: &str,
        collection: Collection,
        key: &str,
    ) -> Result<Option<Value>, StoreError> {
        Ok(self
            .lock()
            .docs
            .get(&(owner.to_string(), collection))
            .and_then(|coll| coll.get(key))
            .cloned())
    }

    async fn merge_document(
        &self,
        owner: &str,
        collection: Collection,
        key: &str,
        fields: Value,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let coll = inner
            .docs
            .entry((owner.to_string(), collection))
            .or_default();
        let merged = merge_fields(coll.get(key).cloned(), &fields);
        coll.insert(key.to_string(), merged);
        Ok(())
    }

    async fn list_documents(
        &self,
        owner: &str,
        collection: Collection,
    ) -> Result<Vec<Value>, StoreError> {
        Ok(self
            .lock()
            .docs
            .get(&(owner.to_string(), collection))
            .map(|coll| coll.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn update_document<F>(
        &self,
        owner: &str,
        collection: Collection,
        key: &str,
        apply: F,
    ) -> Result<Value, StoreError>
    where
        F: FnOnce(Option<Value>) -> Value + Send,
    {
        let mut inner = self.lock();
        let coll = inner
            .docs
            .entry((owner.to_string(), collection))
            .or_default();
        let next = apply(coll.get(key).cloned());
        coll.insert(key.to_string(), next.clone());
        Ok(next)
    }

    async fn list_owners(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.lock().owners.iter().cloned().collect())
    }
}

#[derive(Debug, Default)]
struct HistoryInner {
    readings: HashMap<String, Vec<RawReading>>,
    feeds: HashMap<String, Vec<FeedEvent>>,
}

#[derive(Debug, Default, Clone)]
pub struct MemoryHistory {
    inner: Arc<Mutex<HistoryInner>>,
}

impl MemoryHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HistoryInner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn add_reading(&self, owner: &str, reading: RawReading) {
        self.lock()
            .readings
            .entry(owner.to_string())
            .or_default()
            .push(reading);
    }

    pub fn add_feed_event(&self, owner: &str, event: FeedEvent) {
        self.lock()
            .feeds
            .entry(owner.to_string())
            .or_default()
            .push(event);
    }
}

impl SensorHistory for MemoryHistory {
    async fn readings_on(
        &self,
        owner: &str,
        date: NaiveDate,
    ) -> Result<Vec<RawReading>, StoreError> {
        Ok(self
            .lock()
            .readings
            .get(owner)
            .map(|rs| {
                rs.iter()
                    .filter(|r| r.at.date_naive() == date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn feed_events_on(
        &self,
        owner: &str,
        date: NaiveDate,
    ) -> Result<Vec<FeedEvent>, StoreError> {
        Ok(self
            .lock()
            .feeds
            .get(owner)
            .map(|fs| {
                fs.iter()
                    .filter(|f| f.at.date_naive() == date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn merge_document_creates_then_patches() {
        let store = MemoryStore::new();
        store
            .merge_document(
                "farm-1",
                Collection::DailyReports,
                "2025-01-15",
                json!({"avgTemperature": 25.0, "coverageHours": 2}),
            )
            .await
            .unwrap();
        store
            .merge_document(
                "farm-1",
                Collection::DailyReports,
                "2025-01-15",
                json!({"coverageHours": 3}),
            )
            .await
            .unwrap();

        let doc = store
            .get_document("farm-1", Collection::DailyReports, "2025-01-15")
            .await
            .unwrap()
            .expect("document exists");
        assert_eq!(doc["avgTemperature"], 25.0);
        assert_eq!(doc["coverageHours"], 3);
    }

    #[tokio::test]
    async fn update_document_sees_prior_state() {
        let store = MemoryStore::new();
        for _ in 0..3 {
            store
                .update_document("farm-1", Collection::HourRecords, "2025-01-15:08", |doc| {
                    let count = doc
                        .as_ref()
                        .and_then(|d| d["count"].as_i64())
                        .unwrap_or(0);
                    json!({"count": count + 1})
                })
                .await
                .unwrap();
        }
        let doc = store
            .get_document("farm-1", Collection::HourRecords, "2025-01-15:08")
            .await
            .unwrap()
            .expect("document exists");
        assert_eq!(doc["count"], 3);
    }

    #[tokio::test]
    async fn collections_are_isolated_per_owner() {
        let store = MemoryStore::new();
        store
            .merge_document("farm-1", Collection::DailyReports, "2025-01-15", json!({"a": 1}))
            .await
            .unwrap();

        let other = store
            .list_documents("farm-2", Collection::DailyReports)
            .await
            .unwrap();
        assert!(other.is_empty());
        assert_eq!(store.document_count("farm-1", Collection::DailyReports), 1);
    }

    #[tokio::test]
    async fn history_filters_by_date() {
        let history = MemoryHistory::new();
        let on_day: chrono::DateTime<chrono::Utc> =
            "2025-01-15T08:00:00Z".parse().unwrap();
        let off_day: chrono::DateTime<chrono::Utc> =
            "2025-01-16T08:00:00Z".parse().unwrap();
        history.add_reading(
            "farm-1",
            RawReading {
                at: on_day,
                temperature_c: Some(24.0),
                ph: Some(7.0),
            },
        );
        history.add_reading(
            "farm-1",
            RawReading {
                at: off_day,
                temperature_c: Some(30.0),
                ph: None,
            },
        );

        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let readings = history.readings_on("farm-1", date).await.unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].temperature_c, Some(24.0));
    }
}
