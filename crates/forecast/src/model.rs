//! Ordinary least squares regression.
//!
//! Model:
//! - Center inputs and target, form the normal matrix `XᵀX`.
//! - Eigen-decompose it (cyclic Jacobi; the matrix is `L × L` with small `L`).
//! - Solve through the pseudo-inverse, dropping directions whose eigenvalue is
//!   negligible relative to the largest one.
//!
//! This yields the minimum-norm least-squares solution, so systems with fewer
//! rows than lags still fit. A single row fits an intercept-only model. With
//! two or more rows, a design with no usable direction at all (every column
//! constant) is a fit error.

use serde::{Deserialize, Serialize};

use crate::error::ForecastError;

/// Eigenvalues below `max_eigenvalue * RELATIVE_TOLERANCE` are treated as zero.
const RELATIVE_TOLERANCE: f64 = 1e-10;

/// Eigenvalues at or below this are zero even when they are the largest.
const ABSOLUTE_TOLERANCE: f64 = 1e-12;

const MAX_SWEEPS: usize = 64;

/// Fitted linear model `y = intercept + coefficients · x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    pub fn fit(inputs: &[Vec<f64>], targets: &[f64]) -> Result<Self, ForecastError> {
        if inputs.is_empty() {
            return Err(ForecastError::model_fit("no training rows"));
        }
        if inputs.len() != targets.len() {
            return Err(ForecastError::invalid_input(format!(
                "{} input rows but {} targets",
                inputs.len(),
                targets.len()
            )));
        }

        let width = inputs[0].len();
        if width == 0 || inputs.iter().any(|r| r.len() != width) {
            return Err(ForecastError::invalid_input(
                "input rows must share a non-zero width",
            ));
        }
        if inputs.iter().flatten().chain(targets).any(|v| !v.is_finite()) {
            return Err(ForecastError::model_fit("training data contains non-finite values"));
        }

        // One row carries no variance: every slope is zero and the intercept is
        // the only target seen.
        if inputs.len() == 1 {
            return Ok(Self {
                coefficients: vec![0.0; width],
                intercept: targets[0],
            });
        }

        let n = inputs.len() as f64;
        let x_mean: Vec<f64> = (0..width)
            .map(|j| inputs.iter().map(|r| r[j]).sum::<f64>() / n)
            .collect();
        let y_mean = targets.iter().sum::<f64>() / n;

        // Normal equations on centered data.
        let mut xtx = vec![vec![0.0; width]; width];
        let mut xty = vec![0.0; width];
        for (row, y) in inputs.iter().zip(targets) {
            let centered: Vec<f64> = row.iter().zip(&x_mean).map(|(x, m)| x - m).collect();
            let yc = y - y_mean;
            for ((xtx_row, xty_i), ci) in xtx.iter_mut().zip(xty.iter_mut()).zip(&centered) {
                *xty_i += ci * yc;
                for (cell, cj) in xtx_row.iter_mut().zip(&centered) {
                    *cell += ci * cj;
                }
            }
        }

        let (eigenvalues, eigenvectors) = symmetric_eigen(xtx);
        let max_eigenvalue = eigenvalues.iter().cloned().fold(0.0_f64, f64::max);
        if max_eigenvalue <= ABSOLUTE_TOLERANCE {
            return Err(ForecastError::model_fit(
                "lag matrix has no variance (singular design matrix)",
            ));
        }
        let cutoff = max_eigenvalue * RELATIVE_TOLERANCE;

        let mut coefficients = vec![0.0; width];
        for (k, lambda) in eigenvalues.iter().enumerate() {
            if *lambda <= cutoff {
                continue;
            }
            let projection: f64 = (0..width).map(|i| eigenvectors[i][k] * xty[i]).sum::<f64>() / lambda;
            for (i, c) in coefficients.iter_mut().enumerate() {
                *c += projection * eigenvectors[i][k];
            }
        }

        let intercept = y_mean - coefficients.iter().zip(&x_mean).map(|(c, m)| c * m).sum::<f64>();

        if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ForecastError::model_fit("solver produced non-finite coefficients"));
        }

        Ok(Self {
            coefficients,
            intercept,
        })
    }

    pub fn predict(&self, x: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(x)
                .map(|(c, v)| c * v)
                .sum::<f64>()
    }
}

/// Cyclic Jacobi eigen-decomposition of a symmetric matrix.
///
/// Returns eigenvalues and a matrix whose column `k` is the eigenvector of
/// eigenvalue `k`.
fn symmetric_eigen(mut a: Vec<Vec<f64>>) -> (Vec<f64>, Vec<Vec<f64>>) {
    let n = a.len();
    let mut v: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    let scale: f64 = a.iter().flatten().map(|x| x * x).sum::<f64>().max(f64::MIN_POSITIVE);

    for _ in 0..MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|i| (0..n).filter(move |j| *j != i).map(move |j| (i, j)))
            .map(|(i, j)| a[i][j] * a[i][j])
            .sum();
        if off <= scale * 1e-30 {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                if a[p][q] == 0.0 {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * a[p][q]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for row in a.iter_mut() {
                    let (akp, akq) = (row[p], row[q]);
                    row[p] = c * akp - s * akq;
                    row[q] = s * akp + c * akq;
                }
                let (head, tail) = a.split_at_mut(q);
                for (apk, aqk) in head[p].iter_mut().zip(tail[0].iter_mut()) {
                    let (x, y) = (*apk, *aqk);
                    *apk = c * x - s * y;
                    *aqk = s * x + c * y;
                }
                for row in v.iter_mut() {
                    let (vkp, vkq) = (row[p], row[q]);
                    row[p] = c * vkp - s * vkq;
                    row[q] = s * vkp + c * vkq;
                }
            }
        }
    }

    let eigenvalues = a.iter().enumerate().map(|(i, row)| row[i]).collect();
    (eigenvalues, v)
}
