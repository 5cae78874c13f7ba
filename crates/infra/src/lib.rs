//! Infrastructure layer: history sources, prediction storage, configuration
//! and the forecasting service that composes them.

pub mod config;
pub mod error;
pub mod history;
pub mod pg;
pub mod predictions;
pub mod service;


pub use config::ForecastConfig;
pub use error::{RecordError, StoreError};
pub use history::{HistorySource, InMemoryMovementLedger, PostgresHistorySource};
pub use pg::ensure_schema;
pub use predictions::{
    InMemoryPredictionStore, PersistedPrediction, PostgresPredictionStore, PredictionFilter,
    PredictionStore, ReplaceOutcome,
};
pub use service::{ForecastRun, ForecastService, KeyRunReport, ServiceError};
