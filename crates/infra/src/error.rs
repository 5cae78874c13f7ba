use thiserror::Error;

use stockcast_core::{DomainError, ForecastKey};

/// Failure of a history source or prediction store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Another run replaced the key's predictions first (stale revision or a
    /// serialization failure). Retry the whole forecasting run.
    #[error("concurrent replace on {key}: {detail}")]
    Conflict { key: ForecastKey, detail: String },

    /// A point tagged with a different key was handed to a replace.
    #[error("point for {found} cannot be stored under {expected}")]
    KeyMismatch {
        expected: ForecastKey,
        found: ForecastKey,
    },

    /// A point set holds two points for the same month.
    #[error("duplicate forecast month {year}-{month:02} for {key}")]
    DuplicatePeriod {
        key: ForecastKey,
        year: i32,
        month: u32,
    },

    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Failure to record an inventory movement.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Invalid(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
