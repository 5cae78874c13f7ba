//! Calendar month periods.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// A calendar month (`year`, `month` in `1..=12`).
///
/// Ordering is chronological. Month arithmetic is exact across year
/// boundaries: `2023-11 + 2 == 2024-01`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawYearMonth", into = "RawYearMonth")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl ValueObject for YearMonth {}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> DomainResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(DomainError::validation(format!(
                "month must be in 1..=12 (got {month})"
            )));
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self::from_date(at.date_naive())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The calendar month immediately following this one.
    pub fn next(self) -> Self {
        self.plus_months(1)
    }

    pub fn plus_months(self, months: u32) -> Self {
        // Zero-based month index avoids special-casing December.
        let index = i64::from(self.year) * 12 + i64::from(self.month - 1) + i64::from(months);
        Self {
            year: index.div_euclid(12) as i32,
            month: index.rem_euclid(12) as u32 + 1,
        }
    }
}

impl core::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Serialize, Deserialize)]
struct RawYearMonth {
    year: i32,
    month: u32,
}

impl TryFrom<RawYearMonth> for YearMonth {
    type Error = DomainError;

    fn try_from(raw: RawYearMonth) -> Result<Self, Self::Error> {
        YearMonth::new(raw.year, raw.month)
    }
}

impl From<YearMonth> for RawYearMonth {
    fn from(value: YearMonth) -> Self {
        RawYearMonth {
            year: value.year,
            month: value.month,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ym(year: i32, month: u32) -> YearMonth {
        YearMonth::new(year, month).unwrap()
    }

    #[test]
    fn next_rolls_over_year() {
        assert_eq!(ym(2023, 11).next(), ym(2023, 12));
        assert_eq!(ym(2023, 12).next(), ym(2024, 1));
        assert_eq!(ym(2023, 11).plus_months(2), ym(2024, 1));
        assert_eq!(ym(2023, 1).plus_months(25), ym(2025, 2));
    }

    #[test]
    fn month_out_of_range_is_rejected() {
        assert!(YearMonth::new(2023, 0).is_err());
        assert!(YearMonth::new(2023, 13).is_err());
    }

    #[test]
    fn ordering_is_chronological() {
        assert!(ym(2022, 12) < ym(2023, 1));
        assert!(ym(2023, 2) < ym(2023, 10));
    }

    #[test]
    fn serde_validates_month() {
        let ok: YearMonth = serde_json::from_str(r#"{"year":2024,"month":2}"#).unwrap();
        assert_eq!(ok, ym(2024, 2));
        assert!(serde_json::from_str::<YearMonth>(r#"{"year":2024,"month":14}"#).is_err());
    }

    #[test]
    fn display_is_zero_padded() {
        assert_eq!(ym(2024, 3).to_string(), "2024-03");
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 512,
            ..ProptestConfig::default()
        })]

        /// Property: adding months one at a time equals adding them at once.
        #[test]
        fn stepping_matches_plus_months(
            year in 1900i32..2200i32,
            month in 1u32..=12u32,
            steps in 0u32..48u32
        ) {
            let start = ym(year, month);
            let mut stepped = start;
            for _ in 0..steps {
                stepped = stepped.next();
            }
            prop_assert_eq!(stepped, start.plus_months(steps));
            prop_assert!(stepped.month() >= 1 && stepped.month() <= 12);
        }
    }
}
