//! `stockcast-forecast`
//!
//! **Responsibility:** monthly demand forecasting for one key at a time.
//!
//! This crate is pure computation:
//! - It does not read history or write predictions; callers (infra) supply
//!   observations and persist the returned points.
//! - Every invocation fits its own scaling and model; nothing is shared or
//!   cached between invocations.
//!
//! Pipeline: [`features::build`] → [`TrainedModel::fit`] → [`TrainedModel::forecast`],
//! driven by [`ForecastJob::run`].

pub mod error;
pub mod features;
pub mod job;
pub mod model;
pub mod policy;
pub mod result;
pub mod scaling;

pub use error::ForecastError;
pub use features::{FeatureSet, LagFeatureRow};
pub use job::{
    DEFAULT_LAG_DEPTH, DEFAULT_VALIDATION_FRACTION, ForecastJob, TrainedModel, train_and_forecast,
};
pub use model::LinearModel;
pub use policy::{AnchorPolicy, DEFAULT_MAX_HORIZON, HorizonPolicy};
pub use result::{FitSummary, ForecastOutcome, ForecastPoint};
pub use scaling::{ScalingState, Standardizer};
