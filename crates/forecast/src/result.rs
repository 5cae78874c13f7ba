use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};

use stockcast_core::{ForecastKey, KeyType, YearMonth};

/// One forecasted month for one key.
///
/// Transient: owned by the engine until handed to a prediction store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub year: i32,
    pub month: u32,
    pub quantity: u64,
    pub key_type: KeyType,
    pub key_value: String,
}

impl ForecastPoint {
    pub fn new(period: YearMonth, quantity: u64, key: &ForecastKey) -> Self {
        Self {
            year: period.year(),
            month: period.month(),
            quantity,
            key_type: key.key_type,
            key_value: key.key_value.clone(),
        }
    }

    pub fn key(&self) -> ForecastKey {
        ForecastKey {
            key_type: self.key_type,
            key_value: self.key_value.clone(),
        }
    }

    pub fn belongs_to(&self, key: &ForecastKey) -> bool {
        self.key_type == key.key_type && self.key_value == key.key_value
    }

    /// Category this point was forecast for, if it is a category forecast.
    pub fn category(&self) -> Option<&str> {
        (self.key_type == KeyType::Category).then_some(self.key_value.as_str())
    }

    /// Product name this point was forecast for, if it is a name forecast.
    pub fn name(&self) -> Option<&str> {
        (self.key_type == KeyType::Name).then_some(self.key_value.as_str())
    }
}

/// How the model was fit in one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    pub observations: usize,
    pub training_rows: usize,
    pub lag_depth: usize,
    pub horizon: usize,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    /// RMSE (real units) of a model fit on the leading rows and scored on the
    /// trailing holdout rows; `None` when validation was disabled or the
    /// history was too short to split.
    pub holdout_rmse: Option<f64>,
}

/// Result of one forecasting invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastOutcome {
    pub key: ForecastKey,
    pub points: Vec<ForecastPoint>,
    pub summary: FitSummary,
}

impl ForecastOutcome {
    /// Structured description of the run for logs and API payloads.
    pub fn metadata(&self) -> JsonValue {
        json!({
            "kind": "inventory.demand_forecast",
            "key_type": self.key.key_type,
            "key_value": self.key.key_value,
            "observations": self.summary.observations,
            "training_rows": self.summary.training_rows,
            "lag_depth": self.summary.lag_depth,
            "horizon": self.summary.horizon,
            "holdout_rmse": self.summary.holdout_rmse,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_matching_key_field_is_populated() {
        let period = YearMonth::new(2024, 2).unwrap();
        let by_category = ForecastPoint::new(period, 4, &ForecastKey::category("drinks").unwrap());
        assert_eq!(by_category.category(), Some("drinks"));
        assert_eq!(by_category.name(), None);

        let by_name = ForecastPoint::new(period, 4, &ForecastKey::name("Cola").unwrap());
        assert_eq!(by_name.category(), None);
        assert_eq!(by_name.name(), Some("Cola"));
        assert!(by_name.belongs_to(&ForecastKey::name("Cola").unwrap()));
        assert!(!by_name.belongs_to(&ForecastKey::category("Cola").unwrap()));
    }

    #[test]
    fn metadata_describes_the_run() {
        let key = ForecastKey::name("Cola").unwrap();
        let outcome = ForecastOutcome {
            key: key.clone(),
            points: vec![ForecastPoint::new(YearMonth::new(2024, 3).unwrap(), 9, &key)],
            summary: FitSummary {
                observations: 5,
                training_rows: 2,
                lag_depth: 3,
                horizon: 2,
                coefficients: vec![0.1, 0.2, 0.3],
                intercept: 0.0,
                holdout_rmse: None,
            },
        };

        let meta = outcome.metadata();
        assert_eq!(meta["kind"], "inventory.demand_forecast");
        assert_eq!(meta["key_type"], "name");
        assert_eq!(meta["key_value"], "Cola");
        assert_eq!(meta["training_rows"], 2);
        assert!(meta["holdout_rmse"].is_null());
    }
}
