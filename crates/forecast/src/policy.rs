//! How many months to forecast, and where the first forecast month lands.

use serde::{Deserialize, Serialize};

use stockcast_core::YearMonth;

/// Default cap of the proportional horizon.
pub const DEFAULT_MAX_HORIZON: usize = 6;

/// Number of months forecast in one run.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HorizonPolicy {
    /// Grows with history: `n <= 2 -> 1`, otherwise `clamp(n / 2, 1, max)`.
    Proportional { max: usize },
    /// Always the same number of months (at least one).
    Fixed { months: usize },
}

impl Default for HorizonPolicy {
    fn default() -> Self {
        HorizonPolicy::Proportional {
            max: DEFAULT_MAX_HORIZON,
        }
    }
}

impl HorizonPolicy {
    /// Horizon for `observations` raw monthly observations.
    pub fn horizon(&self, observations: usize) -> usize {
        match *self {
            HorizonPolicy::Proportional { max } => {
                if observations <= 2 {
                    1
                } else {
                    (observations / 2).clamp(1, max.max(1))
                }
            }
            HorizonPolicy::Fixed { months } => months.max(1),
        }
    }
}

impl core::str::FromStr for HorizonPolicy {
    type Err = String;

    /// Parses `proportional`, `proportional:<max>` or `fixed:<months>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let (kind, arg) = match s.split_once(':') {
            Some((k, a)) => (k.trim().to_string(), Some(a.trim().to_string())),
            None => (s.clone(), None),
        };
        let parse_months = |a: &str| {
            a.parse::<usize>()
                .ok()
                .filter(|m| *m >= 1)
                .ok_or_else(|| format!("invalid month count '{a}'"))
        };

        match (kind.as_str(), arg) {
            ("proportional", None) => Ok(HorizonPolicy::default()),
            ("proportional", Some(a)) => Ok(HorizonPolicy::Proportional {
                max: parse_months(&a)?,
            }),
            ("fixed", Some(a)) => Ok(HorizonPolicy::Fixed {
                months: parse_months(&a)?,
            }),
            _ => Err(format!(
                "unknown horizon policy '{s}' (expected proportional, proportional:<max> or fixed:<months>)"
            )),
        }
    }
}

/// Which month the forecast starts after.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorPolicy {
    /// Month after the last observed month (reproducible, backfill-safe).
    #[default]
    LastObservation,
    /// Month after the reference date's month ("today" unless overridden).
    CurrentMonth,
}

impl AnchorPolicy {
    pub fn first_month(&self, last_observed: YearMonth, reference: YearMonth) -> YearMonth {
        match self {
            AnchorPolicy::LastObservation => last_observed.next(),
            AnchorPolicy::CurrentMonth => reference.next(),
        }
    }
}

impl core::str::FromStr for AnchorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "last-observation" => Ok(AnchorPolicy::LastObservation),
            "current-month" | "now" => Ok(AnchorPolicy::CurrentMonth),
            other => Err(format!(
                "unknown anchor policy '{other}' (expected last-observation or current-month)"
            )),
        }
    }
}
