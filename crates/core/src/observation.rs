//! Aggregated monthly history.

use serde::{Deserialize, Serialize};

use crate::error::DomainResult;
use crate::period::YearMonth;
use crate::value_object::ValueObject;

/// Total quantity moved for one key during one calendar month.
///
/// Produced by a history source after grouping and summing individual
/// movements; one value per distinct month.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonthlyObservation {
    pub period: YearMonth,
    pub quantity: u64,
}

impl ValueObject for MonthlyObservation {}

impl MonthlyObservation {
    pub fn new(year: i32, month: u32, quantity: u64) -> DomainResult<Self> {
        Ok(Self {
            period: YearMonth::new(year, month)?,
            quantity,
        })
    }

    pub fn year(&self) -> i32 {
        self.period.year()
    }

    pub fn month(&self) -> u32 {
        self.period.month()
    }
}
