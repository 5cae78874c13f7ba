//! Postgres-backed monthly history.
//!
//! Aggregates raw rows of `inventory_movements` per UTC calendar month. The
//! grouping happens in SQL so only one row per month crosses the wire.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::{Span, instrument};

use stockcast_core::{Entity, ForecastKey, KeyType, MonthlyObservation, MovementId};
use stockcast_inventory::{InventoryMovement, RecordMovement};

use super::HistorySource;
use crate::error::{RecordError, StoreError};
use crate::pg::map_sqlx_error;

const CATEGORY_AGGREGATES: &str = r#"
    SELECT
        EXTRACT(YEAR FROM recorded_at AT TIME ZONE 'UTC')::INT AS year,
        EXTRACT(MONTH FROM recorded_at AT TIME ZONE 'UTC')::INT AS month,
        SUM(quantity)::BIGINT AS quantity
    FROM inventory_movements
    WHERE category = $1
    GROUP BY 1, 2
    ORDER BY 1, 2
"#;

const NAME_AGGREGATES: &str = r#"
    SELECT
        EXTRACT(YEAR FROM recorded_at AT TIME ZONE 'UTC')::INT AS year,
        EXTRACT(MONTH FROM recorded_at AT TIME ZONE 'UTC')::INT AS month,
        SUM(quantity)::BIGINT AS quantity
    FROM inventory_movements
    WHERE name = $1
    GROUP BY 1, 2
    ORDER BY 1, 2
"#;

const DISTINCT_CATEGORIES: &str =
    "SELECT DISTINCT category AS key_value FROM inventory_movements ORDER BY 1";

const DISTINCT_NAMES: &str = "SELECT DISTINCT name AS key_value FROM inventory_movements ORDER BY 1";

#[derive(Debug, Clone)]
pub struct PostgresHistorySource {
    pool: Arc<PgPool>,
}

impl PostgresHistorySource {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Validate and insert one movement.
    #[instrument(skip(self, cmd), fields(name = %cmd.name, category = %cmd.category), err)]
    pub async fn record_movement(&self, cmd: RecordMovement) -> Result<MovementId, RecordError> {
        let movement = InventoryMovement::record(cmd)?;

        sqlx::query(
            r#"
            INSERT INTO inventory_movements (id, name, category, quantity, recorded_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(movement.id().as_uuid())
        .bind(movement.name())
        .bind(movement.category())
        .bind(to_db_quantity(movement.quantity())?)
        .bind(movement.recorded_at())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("record_movement", None, e))?;

        Ok(*movement.id())
    }
}

fn to_db_quantity(quantity: u64) -> Result<i64, StoreError> {
    i64::try_from(quantity)
        .map_err(|_| StoreError::storage(format!("quantity {quantity} exceeds BIGINT range")))
}

#[async_trait]
impl HistorySource for PostgresHistorySource {
    #[instrument(
        skip(self),
        fields(key_type = %key.key_type, key_value = %key.key_value, months),
        err
    )]
    async fn fetch_monthly_aggregates(
        &self,
        key: &ForecastKey,
    ) -> Result<Vec<MonthlyObservation>, StoreError> {
        let sql = match key.key_type {
            KeyType::Category => CATEGORY_AGGREGATES,
            KeyType::Name => NAME_AGGREGATES,
        };

        let rows = sqlx::query(sql)
            .bind(&key.key_value)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_monthly_aggregates", Some(key), e))?;

        let mut history = Vec::with_capacity(rows.len());
        for row in rows {
            let year: i32 = row
                .try_get("year")
                .map_err(|e| map_sqlx_error("decode_year", Some(key), e))?;
            let month: i32 = row
                .try_get("month")
                .map_err(|e| map_sqlx_error("decode_month", Some(key), e))?;
            let quantity: i64 = row
                .try_get("quantity")
                .map_err(|e| map_sqlx_error("decode_quantity", Some(key), e))?;

            history.push(observation_from_row(year, month, quantity)?);
        }

        Span::current().record("months", history.len());
        Ok(history)
    }

    #[instrument(skip(self), fields(key_type = %key_type), err)]
    async fn list_keys(&self, key_type: KeyType) -> Result<Vec<String>, StoreError> {
        let sql = match key_type {
            KeyType::Category => DISTINCT_CATEGORIES,
            KeyType::Name => DISTINCT_NAMES,
        };

        let rows = sqlx::query(sql)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_keys", None, e))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("key_value")
                    .map_err(|e| map_sqlx_error("decode_key_value", None, e))
            })
            .collect()
    }
}

fn observation_from_row(year: i32, month: i32, quantity: i64) -> Result<MonthlyObservation, StoreError> {
    let invalid = |detail: String| StoreError::storage(format!("invalid aggregate row: {detail}"));
    let month = u32::try_from(month).map_err(|_| invalid(format!("month {month}")))?;
    let quantity = u64::try_from(quantity).map_err(|_| invalid(format!("negative quantity {quantity}")))?;
    MonthlyObservation::new(year, month, quantity).map_err(|e| invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_outside_bigint_is_a_storage_error() {
        assert_eq!(to_db_quantity(12).unwrap(), 12);
        assert!(matches!(
            to_db_quantity(u64::MAX),
            Err(StoreError::Storage(_))
        ));
    }

    #[test]
    fn malformed_aggregate_rows_are_rejected() {
        assert_eq!(
            observation_from_row(2024, 3, 7).unwrap(),
            MonthlyObservation::new(2024, 3, 7).unwrap()
        );
        assert!(observation_from_row(2024, 13, 7).is_err());
        assert!(observation_from_row(2024, -1, 7).is_err());
        assert!(observation_from_row(2024, 3, -7).is_err());
    }

    #[test]
    fn aggregate_query_is_selected_by_key_type() {
        assert!(CATEGORY_AGGREGATES.contains("WHERE category = $1"));
        assert!(NAME_AGGREGATES.contains("WHERE name = $1"));
    }
}
