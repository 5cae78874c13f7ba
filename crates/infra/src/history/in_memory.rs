use std::collections::BTreeSet;
use std::sync::RwLock;

use async_trait::async_trait;

use stockcast_core::{Entity, ForecastKey, KeyType, MonthlyObservation, MovementId};
use stockcast_inventory::{InventoryMovement, RecordMovement, monthly_aggregates};

use super::HistorySource;
use crate::error::{RecordError, StoreError};

/// In-memory movement ledger for tests/dev.
///
/// Keeps raw movements and aggregates them per month on every fetch.
#[derive(Debug, Default)]
pub struct InMemoryMovementLedger {
    movements: RwLock<Vec<InventoryMovement>>,
}

impl InMemoryMovementLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and append a movement.
    pub fn record(&self, cmd: RecordMovement) -> Result<MovementId, RecordError> {
        let movement = InventoryMovement::record(cmd)?;
        let id = *movement.id();
        self.movements
            .write()
            .map_err(|_| StoreError::storage("lock poisoned"))?
            .push(movement);
        Ok(id)
    }
}

#[async_trait]
impl HistorySource for InMemoryMovementLedger {
    async fn fetch_monthly_aggregates(
        &self,
        key: &ForecastKey,
    ) -> Result<Vec<MonthlyObservation>, StoreError> {
        let movements = self
            .movements
            .read()
            .map_err(|_| StoreError::storage("lock poisoned"))?;
        Ok(monthly_aggregates(movements.iter(), key))
    }

    async fn list_keys(&self, key_type: KeyType) -> Result<Vec<String>, StoreError> {
        let movements = self
            .movements
            .read()
            .map_err(|_| StoreError::storage("lock poisoned"))?;
        let keys: BTreeSet<&str> = movements.iter().map(|m| m.key_value(key_type)).collect();
        Ok(keys.into_iter().map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ledger() -> InMemoryMovementLedger {
        let ledger = InMemoryMovementLedger::new();
        let at = |m| Utc.with_ymd_and_hms(2024, m, 10, 8, 0, 0).unwrap();
        ledger.record(RecordMovement::new("Cola", "drinks", 4, at(1))).unwrap();
        ledger.record(RecordMovement::new("Cola", "drinks", 6, at(1))).unwrap();
        ledger.record(RecordMovement::new("Juice", "drinks", 2, at(2))).unwrap();
        ledger.record(RecordMovement::new("Bread", "bakery", 9, at(2))).unwrap();
        ledger
    }

    #[tokio::test]
    async fn aggregates_by_month_for_key() {
        let ledger = ledger();
        let drinks = ledger
            .fetch_monthly_aggregates(&ForecastKey::category("drinks").unwrap())
            .await
            .unwrap();
        assert_eq!(
            drinks,
            vec![
                MonthlyObservation::new(2024, 1, 10).unwrap(),
                MonthlyObservation::new(2024, 2, 2).unwrap(),
            ]
        );
    }

    #[tokio::test]
    async fn unknown_key_is_empty_not_error() {
        let ledger = ledger();
        let history = ledger
            .fetch_monthly_aggregates(&ForecastKey::name("Milk").unwrap())
            .await
            .unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn lists_distinct_sorted_keys() {
        let ledger = ledger();
        assert_eq!(
            ledger.list_keys(KeyType::Category).await.unwrap(),
            vec!["bakery".to_string(), "drinks".to_string()]
        );
        assert_eq!(
            ledger.list_keys(KeyType::Name).await.unwrap(),
            vec!["Bread".to_string(), "Cola".to_string(), "Juice".to_string()]
        );
    }

    #[tokio::test]
    async fn invalid_movement_is_not_recorded() {
        let ledger = InMemoryMovementLedger::new();
        let err = ledger
            .record(RecordMovement::new("", "drinks", 1, Utc::now()))
            .unwrap_err();
        assert!(matches!(err, RecordError::Invalid(_)));
        assert!(ledger.list_keys(KeyType::Category).await.unwrap().is_empty());
    }

    #[test]
    fn poisoned_ledger_rejects_new_movements() {
        let ledger = std::sync::Arc::new(InMemoryMovementLedger::new());
        let poisoner = std::sync::Arc::clone(&ledger);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.movements.write().unwrap();
            panic!("poison the ledger lock");
        })
        .join();

        let err = ledger
            .record(RecordMovement::new("Cola", "drinks", 1, Utc::now()))
            .unwrap_err();
        assert!(matches!(err, RecordError::Store(StoreError::Storage(_))));
    }
}
