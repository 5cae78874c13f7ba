//! Lag-feature construction.

use serde::{Deserialize, Serialize};

use stockcast_core::MonthlyObservation;

use crate::error::ForecastError;
use crate::scaling::{ScalingState, Standardizer};

/// One supervised-learning row: the `L` preceding quantities (most recent
/// first) and the quantity to predict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LagFeatureRow {
    pub lags: Vec<f64>,
    pub target: f64,
}

/// Training rows plus the scaling fitted on them.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    pub rows: Vec<LagFeatureRow>,
    pub scaling: ScalingState,
}

impl FeatureSet {
    /// Lag matrix in scaled space.
    pub fn scaled_inputs(&self) -> Vec<Vec<f64>> {
        self.rows
            .iter()
            .map(|r| self.scaling.scale_lags(&r.lags))
            .collect()
    }

    /// Target vector in scaled space.
    pub fn scaled_targets(&self) -> Vec<f64> {
        self.rows
            .iter()
            .map(|r| self.scaling.scale_target(r.target))
            .collect()
    }
}

/// Minimum number of observations needed for `lag_depth`.
pub fn required_observations(lag_depth: usize) -> usize {
    lag_depth + 1
}

/// Slide a window of width `lag_depth` over the history.
///
/// Works on the contiguous index, not on calendar time: a missing month is
/// skipped rather than read as a zero-quantity month.
pub fn lag_rows(
    observations: &[MonthlyObservation],
    lag_depth: usize,
) -> Result<Vec<LagFeatureRow>, ForecastError> {
    if lag_depth == 0 {
        return Err(ForecastError::invalid_input("lag depth must be >= 1"));
    }

    if let Some(idx) = observations
        .windows(2)
        .position(|w| w[0].period >= w[1].period)
    {
        return Err(ForecastError::invalid_input(format!(
            "observations must be strictly ascending by month ({} is followed by {})",
            observations[idx].period,
            observations[idx + 1].period
        )));
    }

    let required = required_observations(lag_depth);
    if observations.len() < required {
        return Err(ForecastError::InsufficientData {
            key: None,
            required,
            available: observations.len(),
        });
    }

    let quantities: Vec<f64> = observations.iter().map(|o| o.quantity as f64).collect();
    let rows = (lag_depth..quantities.len())
        .map(|i| LagFeatureRow {
            lags: (1..=lag_depth).map(|lag| quantities[i - lag]).collect(),
            target: quantities[i],
        })
        .collect();

    Ok(rows)
}

/// Fit input and target scaling on a set of rows.
pub fn fit_scaling(rows: &[LagFeatureRow], lag_depth: usize) -> Result<ScalingState, ForecastError> {
    let inputs: Vec<&[f64]> = rows.iter().map(|r| r.lags.as_slice()).collect();
    let targets: Vec<f64> = rows.iter().map(|r| r.target).collect();

    Ok(ScalingState {
        inputs: Standardizer::fit(&inputs, lag_depth)?,
        target: Standardizer::fit_column(&targets)?,
    })
}

/// Build the training set for one invocation.
pub fn build(
    observations: &[MonthlyObservation],
    lag_depth: usize,
) -> Result<FeatureSet, ForecastError> {
    let rows = lag_rows(observations, lag_depth)?;
    let scaling = fit_scaling(&rows, lag_depth)?;
    Ok(FeatureSet { rows, scaling })
}
