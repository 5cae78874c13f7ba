use std::collections::BTreeMap;

use stockcast_core::{ForecastKey, MonthlyObservation, YearMonth};

use crate::movement::InventoryMovement;

/// Group a key's movements by calendar month and sum their quantities.
///
/// Output is ascending by month with one entry per month that has at least one
/// movement. Months without movements are absent, not zero. Returns an empty
/// vector when nothing matches the key.
pub fn monthly_aggregates<'a, I>(movements: I, key: &ForecastKey) -> Vec<MonthlyObservation>
where
    I: IntoIterator<Item = &'a InventoryMovement>,
{
    let mut totals: BTreeMap<YearMonth, u64> = BTreeMap::new();
    for movement in movements.into_iter().filter(|m| m.matches(key)) {
        let period = YearMonth::from_datetime(movement.recorded_at());
        let total = totals.entry(period).or_insert(0);
        *total = total.saturating_add(movement.quantity());
    }

    totals
        .into_iter()
        .map(|(period, quantity)| MonthlyObservation { period, quantity })
        .collect()
}
