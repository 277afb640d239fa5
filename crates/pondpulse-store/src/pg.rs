//! Postgres-backed [`AggregationStore`] and [`SensorHistory`].
//!
//! All report documents live in one `report_documents` table keyed by
//! `(owner_id, collection, doc_key)` with the document body in a JSONB
//! column. Field-merge writes use the JSONB `||` concatenation operator in
//! an upsert; the atomic read-modify-write takes a row lock inside a
//! transaction so concurrent writers (scheduled sampler vs. backfill) never
//! lose updates.

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use pondpulse_core::Collection;
use serde_json::Value;
use sqlx::PgPool;

use crate::store::{AggregationStore, FeedEvent, RawReading, SensorHistory};
use crate::StoreError;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Register (or reactivate) an owner in the tenant registry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlx`] if the upsert fails.
    pub async fn upsert_owner(&self, owner: &str, display_name: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO owners (owner_id, display_name, is_active) \
             VALUES ($1, $2, TRUE) \
             ON CONFLICT (owner_id) DO UPDATE SET \
                 display_name = EXCLUDED.display_name, \
                 is_active    = TRUE",
        )
        .bind(owner)
        .bind(display_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

impl AggregationStore for PgStore {
    async fn get_document(
        &self,
        owner: &str,
        collection: Collection,
        key: &str,
    ) -> Result<Option<Value>, StoreError> {
        let doc = sqlx::query_scalar::<_, Value>(
            "SELECT doc FROM report_documents \
             WHERE owner_id = $1 AND collection = $2 AND doc_key = $3",
        )
        .bind(owner)
        .bind(collection.as_str())
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(doc)
    }

    async fn merge_document(
        &self,
        owner: &str,
        collection: Collection,
        key: &str,
        fields: Value,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO report_documents (owner_id, collection, doc_key, doc) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (owner_id, collection, doc_key) DO UPDATE SET \
                 doc        = report_documents.doc || EXCLUDED.doc, \
                 updated_at = NOW()",
        )
        .bind(owner)
        .bind(collection.as_str())
        .bind(key)
        .bind(fields)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_documents(
        &self,
        owner: &str,
        collection: Collection,
    ) -> Result<Vec<Value>, StoreError> {
        let docs = sqlx::query_scalar::<_, Value>(
            "SELECT doc FROM report_documents \
             WHERE owner_id = $1 AND collection = $2",
        )
        .bind(owner)
        .bind(collection.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(docs)
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
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_scalar::<_, Value>(
            "SELECT doc FROM report_documents \
             WHERE owner_id = $1 AND collection = $2 AND doc_key = $3 \
             FOR UPDATE",
        )
        .bind(owner)
        .bind(collection.as_str())
        .bind(key)
        .fetch_optional(&mut *tx)
        .await?;

        let next = apply(existing);

        sqlx::query(
            "INSERT INTO report_documents (owner_id, collection, doc_key, doc) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (owner_id, collection, doc_key) DO UPDATE SET \
                 doc        = EXCLUDED.doc, \
                 updated_at = NOW()",
        )
        .bind(owner)
        .bind(collection.as_str())
        .bind(key)
        .bind(&next)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(next)
    }

    async fn list_owners(&self) -> Result<Vec<String>, StoreError> {
        let owners = sqlx::query_scalar::<_, String>(
            "SELECT owner_id FROM owners WHERE is_active = TRUE ORDER BY owner_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(owners)
    }
}

fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
    (start, start + TimeDelta::days(1))
}

impl SensorHistory for PgStore {
    async fn readings_on(
        &self,
        owner: &str,
        date: NaiveDate,
    ) -> Result<Vec<RawReading>, StoreError> {
        let (start, end) = day_bounds(date);
        let rows = sqlx::query_as::<_, (DateTime<Utc>, Option<f64>, Option<f64>)>(
            "SELECT reading_at, temperature_c, ph FROM sensor_readings \
             WHERE owner_id = $1 AND reading_at >= $2 AND reading_at < $3 \
             ORDER BY reading_at",
        )
        .bind(owner)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(at, temperature_c, ph)| RawReading {
                at,
                temperature_c,
                ph,
            })
            .collect())
    }

    async fn feed_events_on(
        &self,
        owner: &str,
        date: NaiveDate,
    ) -> Result<Vec<FeedEvent>, StoreError> {
        let (start, end) = day_bounds(date);
        let rows = sqlx::query_as::<_, (DateTime<Utc>, f64)>(
            "SELECT fed_at, amount_kg FROM feed_events \
             WHERE owner_id = $1 AND fed_at >= $2 AND fed_at < $3 \
             ORDER BY fed_at",
        )
        .bind(owner)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(at, amount_kg)| FeedEvent { at, amount_kg })
            .collect())
    }
}
