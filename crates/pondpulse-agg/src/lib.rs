//! The aggregation pipeline: hourly sampling, the four-level rollup engine,
//! seed placeholders, backfill, and the per-owner batch job entry points.
//!
//! Data flows strictly upward: raw sensors → hour records → daily reports →
//! weekly/monthly reports. Each level reads only the level directly beneath
//! it, and every batch entry point isolates per-owner failures so one bad
//! tenant never blanks out reports for the rest of the fleet.

pub mod backfill;
pub mod jobs;
pub mod rollup;
pub mod sampler;
pub mod seed;

use thiserror::Error;

pub use backfill::BackfillSummary;
pub use jobs::{RunSummary, SensorSource};
pub use rollup::{rollup, RollupLevel, RollupOutcome};
pub use sampler::SensorSnapshot;

/// Errors raised by external collaborators feeding the pipeline.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum AggError {
    #[error(transparent)]
    TimeKey(#[from] pondpulse_core::TimeKeyError),
    #[error(transparent)]
    Store(#[from] pondpulse_store::StoreError),
    #[error("sensor source failed: {0}")]
    Source(#[source] BoxError),
}

/// Serialize a report type into its document form.
///
/// The report types contain only strings, finite floats, counters, and
/// timestamps, so serialization cannot fail; the fallback exists to satisfy
/// the store closure's infallible signature.
pub(crate) fn to_doc<T: serde::Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}
