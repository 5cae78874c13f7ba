//! Reconciliation sink: full replacement of a key's stored predictions.

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryPredictionStore;
pub use postgres::PostgresPredictionStore;

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockcast_core::{Entity, ExpectedRevision, ForecastKey, KeyType, PredictionId};
use stockcast_forecast::ForecastPoint;

use crate::error::StoreError;

/// A forecast point as stored, with its identity and insertion time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedPrediction {
    pub id: PredictionId,
    pub year: i32,
    pub month: u32,
    pub quantity: u64,
    pub key_type: KeyType,
    pub key_value: String,
    pub created_at: DateTime<Utc>,
}

impl PersistedPrediction {
    pub fn from_point(point: &ForecastPoint, created_at: DateTime<Utc>) -> Self {
        Self {
            id: PredictionId::new(),
            year: point.year,
            month: point.month,
            quantity: point.quantity,
            key_type: point.key_type,
            key_value: point.key_value.clone(),
            created_at,
        }
    }

    pub fn category(&self) -> Option<&str> {
        (self.key_type == KeyType::Category).then_some(self.key_value.as_str())
    }

    pub fn name(&self) -> Option<&str> {
        (self.key_type == KeyType::Name).then_some(self.key_value.as_str())
    }

    fn sort_key(&self) -> (KeyType, &str, i32, u32) {
        (self.key_type, self.key_value.as_str(), self.year, self.month)
    }
}

impl Entity for PersistedPrediction {
    type Id = PredictionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Which stored predictions to list. Empty filter lists everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionFilter {
    pub key_type: Option<KeyType>,
    pub key_value: Option<String>,
}

impl PredictionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_key(key: &ForecastKey) -> Self {
        Self {
            key_type: Some(key.key_type),
            key_value: Some(key.key_value.clone()),
        }
    }

    pub fn matches(&self, prediction: &PersistedPrediction) -> bool {
        self.key_type.is_none_or(|t| t == prediction.key_type)
            && self
                .key_value
                .as_deref()
                .is_none_or(|v| v == prediction.key_value)
    }
}

/// Result of a committed replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceOutcome {
    /// Revision of the key after the replace.
    pub revision: u64,
    /// Rows deleted by the replace.
    pub removed: u64,
    pub inserted: Vec<PersistedPrediction>,
}

/// Durable storage of forecast points, one replaceable set per key.
#[async_trait]
pub trait PredictionStore: Send + Sync {
    /// Stored predictions ordered by `(key_type, key_value, year, month)`.
    async fn list_predictions(
        &self,
        filter: &PredictionFilter,
    ) -> Result<Vec<PersistedPrediction>, StoreError>;

    /// Current revision of a key; `0` if it was never written.
    async fn revision(&self, key: &ForecastKey) -> Result<u64, StoreError>;

    /// Atomically delete every stored prediction of `key` and insert `points`.
    ///
    /// Either the whole new set is visible afterwards or the old set is left
    /// untouched.
    async fn replace_predictions(
        &self,
        key: &ForecastKey,
        points: &[ForecastPoint],
        expected: ExpectedRevision,
    ) -> Result<ReplaceOutcome, StoreError>;
}

#[async_trait]
impl<S> PredictionStore for Arc<S>
where
    S: PredictionStore + ?Sized,
{
    async fn list_predictions(
        &self,
        filter: &PredictionFilter,
    ) -> Result<Vec<PersistedPrediction>, StoreError> {
        (**self).list_predictions(filter).await
    }

    async fn revision(&self, key: &ForecastKey) -> Result<u64, StoreError> {
        (**self).revision(key).await
    }

    async fn replace_predictions(
        &self,
        key: &ForecastKey,
        points: &[ForecastPoint],
        expected: ExpectedRevision,
    ) -> Result<ReplaceOutcome, StoreError> {
        (**self).replace_predictions(key, points, expected).await
    }
}

/// Every point must belong to the key being replaced, at most once per month.
pub(crate) fn validate_points(
    key: &ForecastKey,
    points: &[ForecastPoint],
) -> Result<(), StoreError> {
    if let Some(stray) = points.iter().find(|p| !p.belongs_to(key)) {
        return Err(StoreError::KeyMismatch {
            expected: key.clone(),
            found: stray.key(),
        });
    }

    let mut seen = BTreeSet::new();
    if let Some(dup) = points.iter().find(|p| !seen.insert((p.year, p.month))) {
        return Err(StoreError::DuplicatePeriod {
            key: key.clone(),
            year: dup.year,
            month: dup.month,
        });
    }
    Ok(())
}

pub(crate) fn sort_predictions(rows: &mut [PersistedPrediction]) {
    rows.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}
