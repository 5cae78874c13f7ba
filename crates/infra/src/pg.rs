//! PostgreSQL schema and error mapping shared by the sqlx adapters.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (serialization failure) | `40001` | `Conflict` | Concurrent replace on the same key |
//! | Database (deadlock detected) | `40P01` | `Conflict` | Concurrent replace on the same key |
//! | Database (unique violation) | `23505` | `Conflict` | Concurrent insert of the same key/month |
//! | Database (other) | Any other | `Storage` | Constraint or schema errors |
//! | Other | N/A | `Storage` | Pool closed, network errors, decode failures |

use sqlx::PgPool;
use tracing::info;

use stockcast_core::ForecastKey;

use crate::error::StoreError;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS inventory_movements (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        category TEXT NOT NULL,
        quantity BIGINT NOT NULL CHECK (quantity >= 0),
        recorded_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS inventory_movements_category_idx
        ON inventory_movements (category, recorded_at)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS inventory_movements_name_idx
        ON inventory_movements (name, recorded_at)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS predictions (
        id UUID PRIMARY KEY,
        key_type TEXT NOT NULL CHECK (key_type IN ('category', 'name')),
        key_value TEXT NOT NULL,
        year INTEGER NOT NULL,
        month INTEGER NOT NULL CHECK (month BETWEEN 1 AND 12),
        quantity BIGINT NOT NULL CHECK (quantity >= 0),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (key_type, key_value, year, month)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS prediction_revisions (
        key_type TEXT NOT NULL,
        key_value TEXT NOT NULL,
        revision BIGINT NOT NULL DEFAULT 0,
        PRIMARY KEY (key_type, key_value)
    )
    "#,
];

/// Create the tables used by the PostgreSQL adapters if they do not exist.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", None, e))?;
    }
    info!(tables = 3, "database schema ensured");
    Ok(())
}

pub(crate) fn map_sqlx_error(
    operation: &str,
    key: Option<&ForecastKey>,
    err: sqlx::Error,
) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            let conflict = matches!(
                db_err.code().as_deref(),
                Some("40001") | Some("40P01") | Some("23505")
            );
            match (conflict, key) {
                (true, Some(key)) => StoreError::Conflict {
                    key: key.clone(),
                    detail: msg,
                },
                _ => StoreError::Storage(msg),
            }
        }
        other => StoreError::Storage(format!("{operation}: {other}")),
    }
}
