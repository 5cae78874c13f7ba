//! Forecasting configuration, read from the process environment.

use std::env;

use serde::{Deserialize, Serialize};
use tracing::warn;

use stockcast_core::{ForecastKey, MonthlyObservation};
use stockcast_forecast::{
    AnchorPolicy, DEFAULT_LAG_DEPTH, DEFAULT_VALIDATION_FRACTION, ForecastJob, HorizonPolicy,
};

pub const LAG_DEPTH_VAR: &str = "STOCKCAST_LAG_DEPTH";
pub const HORIZON_VAR: &str = "STOCKCAST_HORIZON";
pub const ANCHOR_VAR: &str = "STOCKCAST_ANCHOR";
pub const VALIDATION_FRACTION_VAR: &str = "STOCKCAST_VALIDATION_FRACTION";

/// Model parameters applied to every forecasting run.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    pub lag_depth: usize,
    pub horizon: HorizonPolicy,
    pub anchor: AnchorPolicy,
    /// Trailing share of training rows scored for the holdout RMSE; `None`
    /// disables validation.
    pub validation_fraction: Option<f64>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            lag_depth: DEFAULT_LAG_DEPTH,
            horizon: HorizonPolicy::default(),
            anchor: AnchorPolicy::default(),
            validation_fraction: Some(DEFAULT_VALIDATION_FRACTION),
        }
    }
}

impl ForecastConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Unset variables keep their
    /// default; unparsable ones are logged and also keep their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let lag_depth = parse_var(&lookup, LAG_DEPTH_VAR, defaults.lag_depth, |raw| {
            raw.parse::<usize>()
                .ok()
                .filter(|l| *l >= 1)
                .ok_or_else(|| "expected a positive integer".to_string())
        });
        let horizon = parse_var(&lookup, HORIZON_VAR, defaults.horizon, |raw| raw.parse());
        let anchor = parse_var(&lookup, ANCHOR_VAR, defaults.anchor, |raw| raw.parse());
        let validation_fraction = parse_var(
            &lookup,
            VALIDATION_FRACTION_VAR,
            defaults.validation_fraction,
            parse_fraction,
        );

        Self {
            lag_depth,
            horizon,
            anchor,
            validation_fraction,
        }
    }

    /// Forecasting job for one key under this configuration.
    pub fn job(&self, key: ForecastKey, observations: Vec<MonthlyObservation>) -> ForecastJob {
        ForecastJob::new(key, observations)
            .with_lag_depth(self.lag_depth)
            .with_horizon(self.horizon)
            .with_anchor(self.anchor)
            .with_validation_fraction(self.validation_fraction)
    }
}

fn parse_var<T, F, P>(lookup: &F, name: &str, default: T, parse: P) -> T
where
    T: core::fmt::Debug,
    F: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Result<T, String>,
{
    let Some(raw) = lookup(name) else {
        return default;
    };
    match parse(raw.trim()) {
        Ok(value) => value,
        Err(reason) => {
            warn!(variable = name, value = %raw, %reason, ?default, "ignoring invalid setting");
            default
        }
    }
}

fn parse_fraction(raw: &str) -> Result<Option<f64>, String> {
    if raw.eq_ignore_ascii_case("none") || raw.eq_ignore_ascii_case("off") {
        return Ok(None);
    }
    let fraction: f64 = raw
        .parse()
        .map_err(|_| "expected a number or 'none'".to_string())?;
    if fraction > 0.0 && fraction < 1.0 {
        Ok(Some(fraction))
    } else {
        Err("fraction must lie strictly between 0 and 1".to_string())
    }
}
