use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use stockcast_core::{ExpectedRevision, ForecastKey};
use stockcast_forecast::ForecastPoint;

use super::{
    PersistedPrediction, PredictionFilter, PredictionStore, ReplaceOutcome, validate_points,
    sort_predictions,
};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct KeySlot {
    revision: u64,
    rows: Vec<PersistedPrediction>,
}

/// In-memory prediction store.
///
/// Intended for tests/dev. A replace swaps the key's whole row set under one
/// write lock, so readers see either the old or the new set.
#[derive(Debug, Default)]
pub struct InMemoryPredictionStore {
    slots: RwLock<HashMap<ForecastKey, KeySlot>>,
}

impl InMemoryPredictionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PredictionStore for InMemoryPredictionStore {
    async fn list_predictions(
        &self,
        filter: &PredictionFilter,
    ) -> Result<Vec<PersistedPrediction>, StoreError> {
        let slots = self
            .slots
            .read()
            .map_err(|_| StoreError::storage("lock poisoned"))?;

        let mut rows: Vec<PersistedPrediction> = slots
            .values()
            .flat_map(|slot| slot.rows.iter())
            .filter(|row| filter.matches(row))
            .cloned()
            .collect();
        sort_predictions(&mut rows);
        Ok(rows)
    }

    async fn revision(&self, key: &ForecastKey) -> Result<u64, StoreError> {
        let slots = self
            .slots
            .read()
            .map_err(|_| StoreError::storage("lock poisoned"))?;
        Ok(slots.get(key).map(|slot| slot.revision).unwrap_or(0))
    }

    async fn replace_predictions(
        &self,
        key: &ForecastKey,
        points: &[ForecastPoint],
        expected: ExpectedRevision,
    ) -> Result<ReplaceOutcome, StoreError> {
        validate_points(key, points)?;

        let mut slots = self
            .slots
            .write()
            .map_err(|_| StoreError::storage("lock poisoned"))?;

        let slot = slots.entry(key.clone()).or_default();
        if !expected.matches(slot.revision) {
            return Err(StoreError::Conflict {
                key: key.clone(),
                detail: format!("expected {expected:?}, found revision {}", slot.revision),
            });
        }

        let now = Utc::now();
        let inserted: Vec<PersistedPrediction> = points
            .iter()
            .map(|p| PersistedPrediction::from_point(p, now))
            .collect();

        let removed = std::mem::replace(&mut slot.rows, inserted.clone()).len() as u64;
        slot.revision += 1;

        Ok(ReplaceOutcome {
            revision: slot.revision,
            removed,
            inserted,
        })
    }
}
