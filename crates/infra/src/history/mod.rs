//! Monthly history suppliers.

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryMovementLedger;
pub use postgres::PostgresHistorySource;

use std::sync::Arc;

use async_trait::async_trait;

use stockcast_core::{ForecastKey, KeyType, MonthlyObservation};

use crate::error::StoreError;

/// Supplier of aggregated monthly history for a key.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Quantities grouped and summed per calendar month, ascending, for `key`
    /// only. Empty (not an error) when the key has no history.
    async fn fetch_monthly_aggregates(
        &self,
        key: &ForecastKey,
    ) -> Result<Vec<MonthlyObservation>, StoreError>;

    /// Distinct, sorted values known for a key type (all categories or all
    /// product names).
    async fn list_keys(&self, key_type: KeyType) -> Result<Vec<String>, StoreError>;
}

#[async_trait]
impl<S> HistorySource for Arc<S>
where
    S: HistorySource + ?Sized,
{
    async fn fetch_monthly_aggregates(
        &self,
        key: &ForecastKey,
    ) -> Result<Vec<MonthlyObservation>, StoreError> {
        (**self).fetch_monthly_aggregates(key).await
    }

    async fn list_keys(&self, key_type: KeyType) -> Result<Vec<String>, StoreError> {
        (**self).list_keys(key_type).await
    }
}
