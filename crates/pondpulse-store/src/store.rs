//! The document-store contract consumed by the aggregation pipeline.
//!
//! Reports live in per-owner, per-collection keyed JSON documents. The
//! pipeline needs exactly four operations on them — point read, field-merge
//! write, collection listing, and an atomic read-modify-write — plus the
//! owner registry. Merge semantics are explicit: a write applies a partial
//! field patch to the document at a key, creating it if absent and never
//! removing fields the patch does not mention, so any backend that can
//! implement that contract can sit behind the trait.

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};
use pondpulse_core::Collection;
use serde_json::Value;

use crate::StoreError;

pub trait AggregationStore: Send + Sync {
    /// Fetch the document at `key`, if present.
    fn get_document(
        &self,
        owner: &str,
        collection: Collection,
        key: &str,
    ) -> impl Future<Output = Result<Option<Value>, StoreError>> + Send;

    /// Merge `fields` into the document at `key`, creating it if absent.
    ///
    /// Only the fields present in the patch are touched; everything else in
    /// an existing document is preserved.
    fn merge_document(
        &self,
        owner: &str,
        collection: Collection,
        key: &str,
        fields: Value,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// All documents in the owner's collection, unordered.
    fn list_documents(
        &self,
        owner: &str,
        collection: Collection,
    ) -> impl Future<Output = Result<Vec<Value>, StoreError>> + Send;

    /// Atomic read-modify-write of a single document.
    ///
    /// The closure receives the current document (if any) and returns the
    /// full replacement; no other writer observes an intermediate state.
    /// This is the only transactional operation the pipeline needs — it
    /// backs the hourly sampler's running-average update.
    fn update_document<F>(
        &self,
        owner: &str,
        collection: Collection,
        key: &str,
        apply: F,
    ) -> impl Future<Output = Result<Value, StoreError>> + Send
    where
        F: FnOnce(Option<Value>) -> Value + Send;

    /// Active owner ids, ordered, for batch iteration.
    fn list_owners(&self) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;
}

/// One raw instantaneous sensor sample, as logged by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    pub at: DateTime<Utc>,
    pub temperature_c: Option<f64>,
    pub ph: Option<f64>,
}

/// One feed-schedule event.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEvent {
    pub at: DateTime<Utc>,
    pub amount_kg: f64,
}

/// Raw historical sensor and feed logs, consumed only by hour-level
/// backfill (live sampling never reads history).
pub trait SensorHistory: Send + Sync {
    fn readings_on(
        &self,
        owner: &str,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<RawReading>, StoreError>> + Send;

    fn feed_events_on(
        &self,
        owner: &str,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<FeedEvent>, StoreError>> + Send;
}

/// Shallow field-merge: `patch`'s top-level fields overwrite `existing`'s,
/// everything else is kept. Non-object inputs are replaced wholesale.
#[must_use]
pub fn merge_fields(existing: Option<Value>, patch: &Value) -> Value {
    let (Some(Value::Object(mut base)), Value::Object(fields)) = (existing, patch) else {
        return patch.clone();
    };
    for (k, v) in fields {
        base.insert(k.clone(), v.clone());
    }
    Value::Object(base)
}
