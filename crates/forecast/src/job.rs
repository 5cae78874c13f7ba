use chrono::{NaiveDate, Utc};
use tracing::debug;

use stockcast_core::{ForecastKey, MonthlyObservation, YearMonth};

use crate::error::ForecastError;
use crate::features::{self, FeatureSet, LagFeatureRow};
use crate::model::LinearModel;
use crate::policy::{AnchorPolicy, HorizonPolicy};
use crate::result::{FitSummary, ForecastOutcome, ForecastPoint};
use crate::scaling::ScalingState;

/// Default number of preceding months used as regression inputs.
pub const DEFAULT_LAG_DEPTH: usize = 3;

/// Default share of training rows held out to score the model.
pub const DEFAULT_VALIDATION_FRACTION: f64 = 0.2;

/// A model fitted for one invocation, with the scaling it was trained in.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel {
    scaling: ScalingState,
    model: LinearModel,
}

impl TrainedModel {
    /// Fit OLS on the scaled lag matrix against the scaled target.
    pub fn fit(features: &FeatureSet) -> Result<Self, ForecastError> {
        let model = LinearModel::fit(&features.scaled_inputs(), &features.scaled_targets())?;
        Ok(Self {
            scaling: features.scaling.clone(),
            model,
        })
    }

    pub fn scaling(&self) -> &ScalingState {
        &self.scaling
    }

    pub fn model(&self) -> &LinearModel {
        &self.model
    }

    /// Predict the next quantity (real units, unrounded) from lags given most
    /// recent first.
    pub fn predict(&self, lags: &[f64]) -> f64 {
        let scaled = self.scaling.scale_lags(lags);
        self.scaling.unscale_target(self.model.predict(&scaled))
    }

    /// Forecast `horizon` months after `history`, feeding each prediction
    /// back in as the newest lag.
    pub fn forecast(
        &self,
        history: &[MonthlyObservation],
        first_month: YearMonth,
        horizon: usize,
        key: &ForecastKey,
    ) -> Result<Vec<ForecastPoint>, ForecastError> {
        let lag_depth = self.scaling.lag_depth();
        if history.len() < lag_depth {
            return Err(ForecastError::InsufficientData {
                key: Some(key.clone()),
                required: lag_depth,
                available: history.len(),
            });
        }

        // Oldest first; the lag vector is this buffer reversed.
        let mut window: Vec<f64> = history[history.len() - lag_depth..]
            .iter()
            .map(|o| o.quantity as f64)
            .collect();

        let mut period = first_month;
        let mut points = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            let lags: Vec<f64> = window.iter().rev().copied().collect();
            let raw = self.predict(&lags);
            if !raw.is_finite() {
                return Err(ForecastError::model_fit(format!(
                    "non-finite prediction for {period}"
                ))
                .for_key(key));
            }
            let quantity = to_quantity(raw);

            points.push(ForecastPoint::new(period, quantity, key));
            window.remove(0);
            window.push(quantity as f64);
            period = period.next();
        }

        Ok(points)
    }
}

/// Round to the nearest integer (halves away from zero), floor at zero.
fn to_quantity(raw: f64) -> u64 {
    raw.round().max(0.0) as u64
}

/// One forecasting invocation: train on a key's history, then forecast.
///
/// Lifecycle: built → trained → forecasting → done, all inside [`ForecastJob::run`].
/// Nothing is cached between runs; each run fits its own scaling and model.
#[derive(Debug, Clone)]
pub struct ForecastJob {
    key: ForecastKey,
    observations: Vec<MonthlyObservation>,
    lag_depth: usize,
    horizon: HorizonPolicy,
    anchor: AnchorPolicy,
    validation_fraction: Option<f64>,
    /// Reference date for [`AnchorPolicy::CurrentMonth`]; `None` means today.
    reference_date: Option<NaiveDate>,
}

impl ForecastJob {
    pub fn new(key: ForecastKey, observations: Vec<MonthlyObservation>) -> Self {
        Self {
            key,
            observations,
            lag_depth: DEFAULT_LAG_DEPTH,
            horizon: HorizonPolicy::default(),
            anchor: AnchorPolicy::default(),
            validation_fraction: None,
            reference_date: None,
        }
    }

    pub fn with_lag_depth(mut self, lag_depth: usize) -> Self {
        self.lag_depth = lag_depth;
        self
    }

    pub fn with_horizon(mut self, horizon: HorizonPolicy) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn with_anchor(mut self, anchor: AnchorPolicy) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn with_validation_fraction(mut self, fraction: Option<f64>) -> Self {
        self.validation_fraction = fraction;
        self
    }

    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    pub fn key(&self) -> &ForecastKey {
        &self.key
    }

    pub fn observations(&self) -> &[MonthlyObservation] {
        &self.observations
    }

    pub fn run(&self) -> Result<ForecastOutcome, ForecastError> {
        if let Some(f) = self.validation_fraction
            && !(f.is_finite() && f > 0.0 && f < 1.0)
        {
            return Err(ForecastError::invalid_input(format!(
                "validation fraction must be in (0, 1) (got {f})"
            )));
        }

        let features = features::build(&self.observations, self.lag_depth)
            .map_err(|e| e.for_key(&self.key))?;

        let holdout_rmse = self
            .validation_fraction
            .and_then(|f| self.holdout_rmse(&features.rows, f));

        let trained = TrainedModel::fit(&features).map_err(|e| e.for_key(&self.key))?;

        let n = self.observations.len();
        let horizon = self.horizon.horizon(n);
        // build() guarantees at least lag_depth + 1 observations.
        let last_observed = self.observations[n - 1].period;
        let reference = YearMonth::from_date(
            self.reference_date
                .unwrap_or_else(|| Utc::now().date_naive()),
        );
        let first_month = self.anchor.first_month(last_observed, reference);

        let points = trained.forecast(&self.observations, first_month, horizon, &self.key)?;

        debug!(
            key_type = %self.key.key_type,
            key_value = %self.key.key_value,
            observations = n,
            training_rows = features.rows.len(),
            horizon,
            first_month = %first_month,
            holdout_rmse = ?holdout_rmse,
            "forecast computed"
        );

        Ok(ForecastOutcome {
            key: self.key.clone(),
            points,
            summary: FitSummary {
                observations: n,
                training_rows: features.rows.len(),
                lag_depth: self.lag_depth,
                horizon,
                coefficients: trained.model().coefficients.clone(),
                intercept: trained.model().intercept,
                holdout_rmse,
            },
        })
    }

    /// Fit on the leading rows (with their own scaling) and score one-step
    /// predictions on the trailing rows. `None` when the rows cannot be split
    /// or the partial fit fails; validation never aborts a run.
    fn holdout_rmse(&self, rows: &[LagFeatureRow], fraction: f64) -> Option<f64> {
        let train = ((rows.len() as f64) * (1.0 - fraction)).floor() as usize;
        if train == 0 || train >= rows.len() {
            return None;
        }

        let (head, tail) = rows.split_at(train);
        let scaling = features::fit_scaling(head, self.lag_depth).ok()?;
        let partial = FeatureSet {
            rows: head.to_vec(),
            scaling,
        };
        let trained = match TrainedModel::fit(&partial) {
            Ok(t) => t,
            Err(e) => {
                debug!(key = %self.key, error = %e, "holdout fit skipped");
                return None;
            }
        };

        let sse: f64 = tail
            .iter()
            .map(|r| {
                let d = trained.predict(&r.lags) - r.target;
                d * d
            })
            .sum();
        let rmse = (sse / tail.len() as f64).sqrt();
        rmse.is_finite().then_some(rmse)
    }
}

/// Train on `observations` and forecast with the default horizon and anchor
/// policies.
pub fn train_and_forecast(
    observations: &[MonthlyObservation],
    key: &ForecastKey,
    lag_depth: usize,
) -> Result<Vec<ForecastPoint>, ForecastError> {
    ForecastJob::new(key.clone(), observations.to_vec())
        .with_lag_depth(lag_depth)
        .run()
        .map(|outcome| outcome.points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn series(start: (i32, u32), quantities: &[u64]) -> Vec<MonthlyObservation> {
        let first = YearMonth::new(start.0, start.1).unwrap();
        quantities
            .iter()
            .enumerate()
            .map(|(i, q)| MonthlyObservation {
                period: first.plus_months(i as u32),
                quantity: *q,
            })
            .collect()
    }

    fn drinks() -> ForecastKey {
        ForecastKey::category("drinks").unwrap()
    }

    #[test]
    fn five_month_scenario_forecasts_june_and_july() {
        let obs = vec![
            MonthlyObservation::new(2023, 1, 10).unwrap(),
            MonthlyObservation::new(2023, 2, 12).unwrap(),
            MonthlyObservation::new(2023, 3, 11).unwrap(),
            MonthlyObservation::new(2023, 4, 13).unwrap(),
            MonthlyObservation::new(2023, 5, 14).unwrap(),
        ];

        let outcome = ForecastJob::new(drinks(), obs).run().unwrap();

        assert_eq!(outcome.summary.training_rows, 2);
        assert_eq!(outcome.summary.horizon, 2);
        let months: Vec<(i32, u32)> = outcome.points.iter().map(|p| (p.year, p.month)).collect();
        assert_eq!(months, vec![(2023, 6), (2023, 7)]);
        for p in &outcome.points {
            assert_eq!(p.category(), Some("drinks"));
            assert_eq!(p.name(), None);
        }
        // Minimum-norm fit over the two rows: 13.5 - (1/3) * 0.5 rounds to 13.
        assert_eq!(outcome.points[0].quantity, 13);
    }

    #[test]
    fn forecast_rolls_over_year_boundary() {
        let obs = series((2023, 4), &[5, 9, 4, 8, 6, 7, 3, 9]);
        assert_eq!(obs.last().unwrap().period, YearMonth::new(2023, 11).unwrap());

        let points = train_and_forecast(&obs, &drinks(), 3).unwrap();

        assert_eq!(points.len(), 4);
        assert_eq!((points[0].year, points[0].month), (2023, 12));
        assert_eq!((points[1].year, points[1].month), (2024, 1));
        assert_eq!((points[3].year, points[3].month), (2024, 3));
    }

    #[test]
    fn linear_trend_is_extrapolated() {
        let obs = series((2022, 1), &[10, 20, 30, 40, 50, 60, 70, 80, 90, 100, 110, 120]);
        let outcome = ForecastJob::new(drinks(), obs).run().unwrap();

        let quantities: Vec<u64> = outcome.points.iter().map(|p| p.quantity).collect();
        assert_eq!(quantities, vec![130, 140, 150, 160, 170, 180]);
        assert_eq!(outcome.points[0].year, 2023);
        assert_eq!(outcome.points[0].month, 1);
    }

    #[test]
    fn falling_demand_is_floored_at_zero() {
        let obs = series((2023, 1), &[100, 80, 60, 40, 20, 10]);
        let points = train_and_forecast(&obs, &drinks(), 3).unwrap();
        assert_eq!(points.len(), 3);
        assert!(points.iter().any(|p| p.quantity == 0));
    }

    #[test]
    fn constant_series_is_a_model_fit_error() {
        let obs = series((2023, 1), &[7, 7, 7, 7, 7, 7]);
        let err = train_and_forecast(&obs, &drinks(), 3).unwrap_err();
        match err {
            ForecastError::ModelFit { key, .. } => assert_eq!(key, Some(drinks())),
            other => panic!("expected model fit error, got {other:?}"),
        }
    }

    #[test]
    fn insufficient_history_names_key_and_minimum() {
        let obs = series((2023, 1), &[1, 2]);
        let err = ForecastJob::new(drinks(), obs).run().unwrap_err();
        assert_eq!(
            err,
            ForecastError::InsufficientData {
                key: Some(drinks()),
                required: 4,
                available: 2
            }
        );
    }

    #[test]
    fn minimum_history_forecasts_the_last_target() {
        let obs = series((2023, 1), &[3, 5, 4, 6]);
        let points = train_and_forecast(&obs, &drinks(), 3).unwrap();

        assert_eq!((points[0].year, points[0].month), (2023, 5));
        assert_eq!(points[0].quantity, 6);
        assert!(points.iter().all(|p| p.quantity == 6));
    }

    #[test]
    fn two_observations_at_lag_one_forecast_one_month() {
        let obs = series((2023, 1), &[10, 12]);
        let points = train_and_forecast(&obs, &drinks(), 1).unwrap();

        assert_eq!(points.len(), 1);
        assert_eq!((points[0].year, points[0].month), (2023, 3));
        assert_eq!(points[0].quantity, 12);
    }

    #[test]
    fn empty_history_is_insufficient_data() {
        let err = ForecastJob::new(drinks(), Vec::new()).run().unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { available: 0, .. }));
    }

    #[test]
    fn current_month_anchor_uses_reference_date() {
        let obs = series((2021, 1), &[3, 5, 4, 6, 5, 7, 6, 8]);
        let outcome = ForecastJob::new(drinks(), obs)
            .with_anchor(AnchorPolicy::CurrentMonth)
            .with_reference_date(NaiveDate::from_ymd_opt(2025, 12, 18).unwrap())
            .run()
            .unwrap();

        assert_eq!((outcome.points[0].year, outcome.points[0].month), (2026, 1));
    }

    #[test]
    fn fixed_horizon_forecasts_six_months() {
        let obs = series((2023, 1), &[3, 5, 4, 6, 9]);
        let outcome = ForecastJob::new(drinks(), obs)
            .with_horizon(HorizonPolicy::Fixed { months: 6 })
            .run()
            .unwrap();
        assert_eq!(outcome.points.len(), 6);
    }

    #[test]
    fn holdout_is_scored_but_model_is_refit_on_all_rows() {
        let obs = series((2022, 1), &[10, 20, 30, 40, 50, 60, 70, 80, 90, 100, 110, 120]);
        let with_validation = ForecastJob::new(drinks(), obs.clone())
            .with_validation_fraction(Some(DEFAULT_VALIDATION_FRACTION))
            .run()
            .unwrap();
        let without = ForecastJob::new(drinks(), obs).run().unwrap();

        let rmse = with_validation.summary.holdout_rmse.unwrap();
        assert!(rmse < 1e-6);
        assert_eq!(with_validation.points, without.points);
        assert_eq!(without.summary.holdout_rmse, None);
    }

    #[test]
    fn out_of_range_validation_fraction_is_invalid() {
        let obs = series((2022, 1), &[1, 2, 3, 4, 5]);
        let err = ForecastJob::new(drinks(), obs)
            .with_validation_fraction(Some(1.5))
            .run()
            .unwrap_err();
        assert!(matches!(err, ForecastError::InvalidInput(_)));
    }

    #[test]
    fn rounding_is_half_away_from_zero_and_floored() {
        assert_eq!(to_quantity(2.5), 3);
        assert_eq!(to_quantity(2.49), 2);
        assert_eq!(to_quantity(-0.4), 0);
        assert_eq!(to_quantity(-12.0), 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: forecasts are never negative, have the policy horizon and
        /// start the month after the last observation.
        #[test]
        fn forecasts_are_non_negative_and_anchored(
            quantities in prop::collection::vec(0u64..1_000u64, 4..40),
            start_month in 1u32..=12u32
        ) {
            let obs = series((2020, start_month), &quantities);
            match ForecastJob::new(drinks(), obs.clone()).run() {
                Ok(outcome) => {
                    prop_assert_eq!(outcome.points.len(), HorizonPolicy::default().horizon(obs.len()));
                    let first = YearMonth::new(outcome.points[0].year, outcome.points[0].month).unwrap();
                    prop_assert_eq!(first, obs.last().unwrap().period.next());
                    // u64 quantities are non-negative by construction; check the
                    // key tagging instead.
                    prop_assert!(outcome.points.iter().all(|p| p.belongs_to(&drinks())));
                }
                // Constant lag windows legitimately fail to fit.
                Err(ForecastError::ModelFit { .. }) => {}
                Err(other) => prop_assert!(false, "unexpected error: {other}"),
            }
        }
    }
}
