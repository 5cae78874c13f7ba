//! `stockcast-core`: shared domain building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! calendar periods, forecasting keys, identifiers and the revision model used
//! for optimistic concurrency on stored predictions.

pub mod entity;
pub mod error;
pub mod id;
pub mod key;
pub mod observation;
pub mod period;
pub mod revision;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{MovementId, PredictionId};
pub use key::{ForecastKey, KeyType};
pub use observation::MonthlyObservation;
pub use period::YearMonth;
pub use revision::ExpectedRevision;
pub use value_object::ValueObject;
