use thiserror::Error;

use stockcast_core::ForecastKey;

/// Failure of a single forecasting invocation.
///
/// All variants are terminal for the invocation; nothing retries internally and
/// nothing is persisted when one is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    #[error("invalid forecast input: {0}")]
    InvalidInput(String),

    /// Not enough monthly history for the configured lag depth.
    #[error("{}insufficient data: at least {required} months required, {available} available", key_prefix(.key))]
    InsufficientData {
        key: Option<ForecastKey>,
        required: usize,
        available: usize,
    },

    /// The regression could not be fitted or produced non-finite output.
    #[error("{}model fit failed: {reason}", key_prefix(.key))]
    ModelFit {
        key: Option<ForecastKey>,
        reason: String,
    },
}

impl ForecastError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn model_fit(reason: impl Into<String>) -> Self {
        Self::ModelFit {
            key: None,
            reason: reason.into(),
        }
    }

    /// Attach the forecasting key to errors raised below the engine level.
    pub fn for_key(self, key: &ForecastKey) -> Self {
        match self {
            Self::InsufficientData {
                required,
                available,
                ..
            } => Self::InsufficientData {
                key: Some(key.clone()),
                required,
                available,
            },
            Self::ModelFit { reason, .. } => Self::ModelFit {
                key: Some(key.clone()),
                reason,
            },
            other => other,
        }
    }

    pub fn key(&self) -> Option<&ForecastKey> {
        match self {
            Self::InsufficientData { key, .. } | Self::ModelFit { key, .. } => key.as_ref(),
            Self::InvalidInput(_) => None,
        }
    }
}

fn key_prefix(key: &Option<ForecastKey>) -> String {
    match key {
        Some(k) => format!("{k}: "),
        None => String::new(),
    }
}
