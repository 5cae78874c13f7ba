//! Postgres-backed prediction store.
//!
//! Rows live in `predictions`; each key has a row in `prediction_revisions`
//! carrying its revision counter. A replace runs as one transaction:
//!
//! 1. Ensure the key's revision row exists (`INSERT .. ON CONFLICT DO NOTHING`)
//! 2. Lock it with `SELECT .. FOR UPDATE` and check the expected revision
//! 3. Delete the key's rows, insert the new set
//! 4. Bump the revision and commit
//!
//! Concurrent replaces of one key serialize on the row lock; the loser either
//! sees a newer revision (`Conflict`) or, under stricter isolation, fails with
//! a serialization error that also maps to `Conflict`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};
use uuid::Uuid;

use stockcast_core::{ExpectedRevision, ForecastKey, KeyType, PredictionId};
use stockcast_forecast::ForecastPoint;

use super::{
    PersistedPrediction, PredictionFilter, PredictionStore, ReplaceOutcome, validate_points,
};
use crate::error::StoreError;
use crate::pg::map_sqlx_error;

#[derive(Debug, Clone)]
pub struct PostgresPredictionStore {
    pool: Arc<PgPool>,
}

impl PostgresPredictionStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl PredictionStore for PostgresPredictionStore {
    #[instrument(skip(self), fields(rows), err)]
    async fn list_predictions(
        &self,
        filter: &PredictionFilter,
    ) -> Result<Vec<PersistedPrediction>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, key_type, key_value, year, month, quantity, created_at
            FROM predictions
            WHERE ($1::TEXT IS NULL OR key_type = $1)
              AND ($2::TEXT IS NULL OR key_value = $2)
            ORDER BY key_type ASC, key_value ASC, year ASC, month ASC
            "#,
        )
        .bind(filter.key_type.map(|t| t.as_str()))
        .bind(filter.key_value.as_deref())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_predictions", None, e))?;

        let predictions = rows
            .iter()
            .map(row_to_prediction)
            .collect::<Result<Vec<_>, _>>()?;

        Span::current().record("rows", predictions.len());
        Ok(predictions)
    }

    #[instrument(skip(self), fields(key_type = %key.key_type, key_value = %key.key_value), err)]
    async fn revision(&self, key: &ForecastKey) -> Result<u64, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT revision
            FROM prediction_revisions
            WHERE key_type = $1 AND key_value = $2
            "#,
        )
        .bind(key.key_type.as_str())
        .bind(&key.key_value)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("revision", Some(key), e))?;

        match row {
            Some(row) => decode_revision(&row, key),
            None => Ok(0),
        }
    }

    #[instrument(
        skip(self, points),
        fields(
            key_type = %key.key_type,
            key_value = %key.key_value,
            points = points.len(),
            revision
        ),
        err
    )]
    async fn replace_predictions(
        &self,
        key: &ForecastKey,
        points: &[ForecastPoint],
        expected: ExpectedRevision,
    ) -> Result<ReplaceOutcome, StoreError> {
        validate_points(key, points)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", Some(key), e))?;

        let current = lock_revision(&mut tx, key).await?;

        if !expected.matches(current) {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", Some(key), e))?;
            return Err(StoreError::Conflict {
                key: key.clone(),
                detail: format!("expected {expected:?}, found revision {current}"),
            });
        }

        let removed = sqlx::query("DELETE FROM predictions WHERE key_type = $1 AND key_value = $2")
            .bind(key.key_type.as_str())
            .bind(&key.key_value)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_predictions", Some(key), e))?
            .rows_affected();

        let now = Utc::now();
        let mut inserted = Vec::with_capacity(points.len());
        for point in points {
            let prediction = PersistedPrediction::from_point(point, now);
            let quantity = i64::try_from(prediction.quantity).map_err(|_| {
                StoreError::storage(format!(
                    "quantity {} exceeds BIGINT range",
                    prediction.quantity
                ))
            })?;

            sqlx::query(
                r#"
                INSERT INTO predictions (id, key_type, key_value, year, month, quantity, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(prediction.id.as_uuid())
            .bind(prediction.key_type.as_str())
            .bind(&prediction.key_value)
            .bind(prediction.year)
            .bind(prediction.month as i32)
            .bind(quantity)
            .bind(prediction.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_prediction", Some(key), e))?;

            inserted.push(prediction);
        }

        let revision = current + 1;
        sqlx::query(
            r#"
            UPDATE prediction_revisions
            SET revision = $3
            WHERE key_type = $1 AND key_value = $2
            "#,
        )
        .bind(key.key_type.as_str())
        .bind(&key.key_value)
        .bind(revision as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("bump_revision", Some(key), e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", Some(key), e))?;

        Span::current().record("revision", revision);
        Ok(ReplaceOutcome {
            revision,
            removed,
            inserted,
        })
    }
}

/// Create the key's revision row if missing, then lock it for this transaction.
async fn lock_revision(
    tx: &mut Transaction<'_, Postgres>,
    key: &ForecastKey,
) -> Result<u64, StoreError> {
    sqlx::query(
        r#"
        INSERT INTO prediction_revisions (key_type, key_value, revision)
        VALUES ($1, $2, 0)
        ON CONFLICT (key_type, key_value) DO NOTHING
        "#,
    )
    .bind(key.key_type.as_str())
    .bind(&key.key_value)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("ensure_revision_row", Some(key), e))?;

    let row = sqlx::query(
        r#"
        SELECT revision
        FROM prediction_revisions
        WHERE key_type = $1 AND key_value = $2
        FOR UPDATE
        "#,
    )
    .bind(key.key_type.as_str())
    .bind(&key.key_value)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("lock_revision", Some(key), e))?;

    decode_revision(&row, key)
}

fn decode_revision(row: &PgRow, key: &ForecastKey) -> Result<u64, StoreError> {
    let revision: i64 = row
        .try_get("revision")
        .map_err(|e| map_sqlx_error("decode_revision", Some(key), e))?;
    u64::try_from(revision)
        .map_err(|_| StoreError::storage(format!("negative revision {revision} for {key}")))
}

fn row_to_prediction(row: &PgRow) -> Result<PersistedPrediction, StoreError> {
    let decode = |e| map_sqlx_error("decode_prediction", None, e);

    let id: Uuid = row.try_get("id").map_err(decode)?;
    let key_type: String = row.try_get("key_type").map_err(decode)?;
    let key_value: String = row.try_get("key_value").map_err(decode)?;
    let year: i32 = row.try_get("year").map_err(decode)?;
    let month: i32 = row.try_get("month").map_err(decode)?;
    let quantity: i64 = row.try_get("quantity").map_err(decode)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(decode)?;

    let invalid = |what: String| StoreError::storage(format!("invalid prediction row {id}: {what}"));
    let key_type: KeyType = key_type.parse().map_err(|e| invalid(format!("{e}")))?;
    let month = u32::try_from(month)
        .ok()
        .filter(|m| (1..=12).contains(m))
        .ok_or_else(|| invalid(format!("month {month}")))?;
    let quantity = u64::try_from(quantity).map_err(|_| invalid(format!("quantity {quantity}")))?;

    Ok(PersistedPrediction {
        id: PredictionId::from_uuid(id),
        year,
        month,
        quantity,
        key_type,
        key_value,
        created_at,
    })
}
