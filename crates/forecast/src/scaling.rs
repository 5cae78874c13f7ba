//! Standardization of lag inputs and targets.
//!
//! A [`ScalingState`] is fitted once per forecasting invocation from its
//! training rows and is then reused unchanged to scale future lag windows and
//! to map model output back to real quantity units.

use serde::{Deserialize, Serialize};

use crate::error::ForecastError;

/// Per-column standardizer: `(x - mean) / std`.
///
/// Uses the population standard deviation. A column with zero variance gets
/// `std = 1.0`, so it scales to all zeros instead of dividing by zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl Standardizer {
    /// Fit over `rows`, each of width `width`.
    pub fn fit<R: AsRef<[f64]>>(rows: &[R], width: usize) -> Result<Self, ForecastError> {
        if rows.is_empty() {
            return Err(ForecastError::invalid_input(
                "cannot fit a standardizer on zero rows",
            ));
        }
        if width == 0 {
            return Err(ForecastError::invalid_input(
                "cannot fit a standardizer on zero columns",
            ));
        }

        let n = rows.len() as f64;
        let mut means = vec![0.0; width];
        for row in rows {
            let row = row.as_ref();
            if row.len() != width {
                return Err(ForecastError::invalid_input(format!(
                    "row width {} does not match expected width {width}",
                    row.len()
                )));
            }
            for (m, x) in means.iter_mut().zip(row) {
                *m += x;
            }
        }
        for m in &mut means {
            *m /= n;
        }

        let mut stds = vec![0.0; width];
        for row in rows {
            for ((s, x), m) in stds.iter_mut().zip(row.as_ref()).zip(&means) {
                let d = x - m;
                *s += d * d;
            }
        }
        for s in &mut stds {
            *s = (*s / n).sqrt();
            if *s <= f64::EPSILON {
                *s = 1.0;
            }
        }

        if means.iter().chain(&stds).any(|v| !v.is_finite()) {
            return Err(ForecastError::model_fit(
                "non-finite statistics while fitting standardizer",
            ));
        }

        Ok(Self { means, stds })
    }

    /// Fit a single-column standardizer over a vector of values.
    pub fn fit_column(values: &[f64]) -> Result<Self, ForecastError> {
        let rows: Vec<[f64; 1]> = values.iter().map(|v| [*v]).collect();
        Self::fit(&rows, 1)
    }

    pub fn width(&self) -> usize {
        self.means.len()
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn stds(&self) -> &[f64] {
        &self.stds
    }

    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(x, (m, s))| (x - m) / s)
            .collect()
    }

    pub fn inverse_transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(z, (m, s))| z * s + m)
            .collect()
    }

    /// Scale a single value of a one-column standardizer.
    pub fn transform_value(&self, x: f64) -> f64 {
        (x - self.means[0]) / self.stds[0]
    }

    /// Inverse of [`Standardizer::transform_value`].
    pub fn inverse_value(&self, z: f64) -> f64 {
        z * self.stds[0] + self.means[0]
    }
}

/// Fitted scaling for one invocation: lag-input space and target space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingState {
    pub inputs: Standardizer,
    pub target: Standardizer,
}

impl ScalingState {
    pub fn lag_depth(&self) -> usize {
        self.inputs.width()
    }

    pub fn scale_lags(&self, lags: &[f64]) -> Vec<f64> {
        self.inputs.transform(lags)
    }

    pub fn scale_target(&self, y: f64) -> f64 {
        self.target.transform_value(y)
    }

    pub fn unscale_target(&self, z: f64) -> f64 {
        self.target.inverse_value(z)
    }
}
