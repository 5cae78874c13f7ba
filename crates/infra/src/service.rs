//! Forecasting pipeline (application-level orchestration).
//!
//! `ForecastService` composes a [`HistorySource`] and a [`PredictionStore`]
//! around the pure forecasting engine:
//!
//! ```text
//! ForecastKey
//!   ↓
//! 1. Validate the key (non-empty value)
//!   ↓
//! 2. Read the key's stored revision
//!   ↓
//! 3. Fetch monthly aggregates for the key
//!   ↓
//! 4. Build lag features, fit, forecast (stockcast-forecast)
//!   ↓
//! 5. Replace the key's stored predictions, expecting the revision from step 2
//! ```
//!
//! Nothing is written when steps 1-4 fail. A run that loses a race against
//! another run of the same key fails in step 5 with a conflict instead of
//! overwriting the newer forecast; retrying the whole run is safe.

use serde::Serialize;
use thiserror::Error;
use tracing::{Span, info, instrument, warn};

use stockcast_core::{DomainError, ExpectedRevision, ForecastKey, KeyType};
use stockcast_forecast::{FitSummary, ForecastError, ForecastPoint};

use crate::config::ForecastConfig;
use crate::error::StoreError;
use crate::history::HistorySource;
use crate::predictions::{PersistedPrediction, PredictionFilter, PredictionStore};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid forecast key: {0}")]
    InvalidKey(#[from] DomainError),

    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    /// Only a lost replace race is worth retrying; every other failure is
    /// deterministic for the same history.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Store(StoreError::Conflict { .. }))
    }
}

/// A completed, persisted forecasting run.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastRun {
    pub key: ForecastKey,
    pub points: Vec<ForecastPoint>,
    /// Revision of the key's prediction set after this run.
    pub revision: u64,
    pub persisted: Vec<PersistedPrediction>,
    pub summary: FitSummary,
}

/// Per-key result of [`ForecastService::run_all`].
#[derive(Debug)]
pub struct KeyRunReport {
    pub key: ForecastKey,
    pub result: Result<ForecastRun, ServiceError>,
}

impl KeyRunReport {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Forecasting pipeline over injected history and prediction storage.
///
/// Generic over both collaborators so the same pipeline runs against
/// in-memory implementations in tests and PostgreSQL in production.
#[derive(Debug)]
pub struct ForecastService<H, P> {
    history: H,
    predictions: P,
    config: ForecastConfig,
}

impl<H, P> ForecastService<H, P>
where
    H: HistorySource,
    P: PredictionStore,
{
    pub fn new(history: H, predictions: P) -> Self {
        Self::with_config(history, predictions, ForecastConfig::default())
    }

    pub fn with_config(history: H, predictions: P, config: ForecastConfig) -> Self {
        Self {
            history,
            predictions,
            config,
        }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn history(&self) -> &H {
        &self.history
    }

    pub fn predictions(&self) -> &P {
        &self.predictions
    }

    /// Forecast one key and replace its stored predictions.
    #[instrument(
        skip(self),
        fields(
            key_type = %key.key_type,
            key_value = %key.key_value,
            observations,
            horizon,
            revision
        ),
        err
    )]
    pub async fn run(&self, key: &ForecastKey) -> Result<ForecastRun, ServiceError> {
        let key = ForecastKey::new(key.key_type, key.key_value.clone())?;
        let span = Span::current();

        let expected = self.predictions.revision(&key).await?;
        let history = self.history.fetch_monthly_aggregates(&key).await?;
        span.record("observations", history.len());

        let outcome = self.config.job(key.clone(), history).run()?;
        span.record("horizon", outcome.points.len());

        let replaced = self
            .predictions
            .replace_predictions(&key, &outcome.points, ExpectedRevision::Exact(expected))
            .await?;
        span.record("revision", replaced.revision);

        info!(
            removed = replaced.removed,
            inserted = replaced.inserted.len(),
            run = %outcome.metadata(),
            "forecast persisted"
        );

        Ok(ForecastRun {
            key,
            points: outcome.points,
            revision: replaced.revision,
            persisted: replaced.inserted,
            summary: outcome.summary,
        })
    }

    /// Forecast by category or product name; exactly one must be given.
    pub async fn run_for(
        &self,
        category: Option<&str>,
        name: Option<&str>,
    ) -> Result<ForecastRun, ServiceError> {
        let key = ForecastKey::from_parts(category, name)?;
        self.run(&key).await
    }

    /// Forecast every known key of a type. Keys run one after another; a
    /// failing key is reported and does not stop the rest.
    #[instrument(skip(self), fields(key_type = %key_type, keys, failed), err)]
    pub async fn run_all(&self, key_type: KeyType) -> Result<Vec<KeyRunReport>, ServiceError> {
        let values = self.history.list_keys(key_type).await?;
        let span = Span::current();
        span.record("keys", values.len());

        let mut reports = Vec::with_capacity(values.len());
        for value in values {
            let key = ForecastKey::new(key_type, value)?;
            let result = self.run(&key).await;
            if let Err(e) = &result {
                warn!(key_value = %key.key_value, error = %e, "forecast failed for key");
            }
            reports.push(KeyRunReport { key, result });
        }

        span.record("failed", reports.iter().filter(|r| !r.is_ok()).count());
        Ok(reports)
    }

    pub async fn list_predictions(
        &self,
        filter: &PredictionFilter,
    ) -> Result<Vec<PersistedPrediction>, ServiceError> {
        Ok(self.predictions.list_predictions(filter).await?)
    }

    pub async fn list_keys(&self, key_type: KeyType) -> Result<Vec<String>, ServiceError> {
        Ok(self.history.list_keys(key_type).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use stockcast_inventory::RecordMovement;

    use crate::history::InMemoryMovementLedger;
    use crate::predictions::{InMemoryPredictionStore, ReplaceOutcome};

    fn ledger_with(months: &[(i32, u32, u64)], name: &str, category: &str) -> InMemoryMovementLedger {
        let ledger = InMemoryMovementLedger::new();
        for (y, m, q) in months {
            let at = Utc.with_ymd_and_hms(*y, *m, 15, 12, 0, 0).unwrap();
            ledger
                .record(RecordMovement::new(name, category, *q, at))
                .unwrap();
        }
        ledger
    }

    #[tokio::test]
    async fn empty_key_is_rejected_before_any_io() {
        let service = ForecastService::new(InMemoryMovementLedger::new(), InMemoryPredictionStore::new());
        let key = ForecastKey {
            key_type: KeyType::Category,
            key_value: "  ".into(),
        };
        let err = service.run(&key).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidKey(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn both_or_neither_key_field_is_rejected() {
        let service = ForecastService::new(InMemoryMovementLedger::new(), InMemoryPredictionStore::new());
        assert!(matches!(
            service.run_for(Some("drinks"), Some("Cola")).await,
            Err(ServiceError::InvalidKey(_))
        ));
        assert!(matches!(
            service.run_for(None, None).await,
            Err(ServiceError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn insufficient_history_persists_nothing() {
        let ledger = ledger_with(&[(2023, 1, 5), (2023, 2, 6)], "Cola", "drinks");
        let store = Arc::new(InMemoryPredictionStore::new());
        let service = ForecastService::new(ledger, Arc::clone(&store));

        let err = service.run_for(Some("drinks"), None).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Forecast(ForecastError::InsufficientData { .. })
        ));
        assert!(store
            .list_predictions(&PredictionFilter::all())
            .await
            .unwrap()
            .is_empty());
    }

    /// Store whose revision moves between the read and the replace, as if
    /// another run committed in between.
    struct RacingStore {
        inner: InMemoryPredictionStore,
    }

    #[async_trait]
    impl PredictionStore for RacingStore {
        async fn list_predictions(
            &self,
            filter: &PredictionFilter,
        ) -> Result<Vec<PersistedPrediction>, StoreError> {
            self.inner.list_predictions(filter).await
        }

        async fn revision(&self, key: &ForecastKey) -> Result<u64, StoreError> {
            let seen = self.inner.revision(key).await?;
            self.inner
                .replace_predictions(key, &[], ExpectedRevision::Any)
                .await?;
            Ok(seen)
        }

        async fn replace_predictions(
            &self,
            key: &ForecastKey,
            points: &[ForecastPoint],
            expected: ExpectedRevision,
        ) -> Result<ReplaceOutcome, StoreError> {
            self.inner.replace_predictions(key, points, expected).await
        }
    }

    #[tokio::test]
    async fn lost_race_is_a_retryable_conflict() {
        let ledger = ledger_with(
            &[(2023, 1, 10), (2023, 2, 12), (2023, 3, 15), (2023, 4, 11), (2023, 5, 14)],
            "Cola",
            "drinks",
        );
        let service = ForecastService::new(
            ledger,
            RacingStore {
                inner: InMemoryPredictionStore::new(),
            },
        );

        let err = service.run_for(None, Some("Cola")).await.unwrap_err();
        assert!(err.is_retryable(), "{err}");
    }

    #[tokio::test]
    async fn run_all_reports_each_key() {
        let ledger = ledger_with(
            &[(2023, 1, 10), (2023, 2, 12), (2023, 3, 15), (2023, 4, 11), (2023, 5, 14)],
            "Cola",
            "drinks",
        );
        ledger
            .record(RecordMovement::new(
                "Bread",
                "bakery",
                3,
                Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap(),
            ))
            .unwrap();
        let service = ForecastService::new(ledger, InMemoryPredictionStore::new());

        let reports = service.run_all(KeyType::Category).await.unwrap();
        let summary: Vec<(&str, bool)> = reports
            .iter()
            .map(|r| (r.key.key_value.as_str(), r.is_ok()))
            .collect();
        assert_eq!(summary, vec![("bakery", false), ("drinks", true)]);

        let drinks = reports[1].result.as_ref().unwrap();
        assert_eq!(
            drinks
                .points
                .iter()
                .map(|p| (p.year, p.month))
                .collect::<Vec<_>>(),
            vec![(2023, 6), (2023, 7)]
        );
        assert_eq!(drinks.revision, 1);
        assert_eq!(
            service.list_keys(KeyType::Name).await.unwrap(),
            vec!["Bread".to_string(), "Cola".to_string()]
        );
    }
}
