use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockcast_core::{DomainError, DomainResult, Entity, ForecastKey, KeyType, MovementId};

/// Command: RecordMovement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMovement {
    pub movement_id: MovementId,
    pub name: String,
    pub category: String,
    pub quantity: u64,
    pub recorded_at: DateTime<Utc>,
}

impl RecordMovement {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        quantity: u64,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            movement_id: MovementId::new(),
            name: name.into(),
            category: category.into(),
            quantity,
            recorded_at,
        }
    }
}

/// A single recorded inventory movement for a product.
///
/// Movements are the raw history that monthly forecasting aggregates over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryMovement {
    id: MovementId,
    name: String,
    category: String,
    quantity: u64,
    recorded_at: DateTime<Utc>,
}

impl InventoryMovement {
    /// Validate a command and produce the movement it records.
    pub fn record(cmd: RecordMovement) -> DomainResult<Self> {
        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        let category = cmd.category.trim();
        if category.is_empty() {
            return Err(DomainError::validation("category cannot be empty"));
        }

        Ok(Self {
            id: cmd.movement_id,
            name: name.to_string(),
            category: category.to_string(),
            quantity: cmd.quantity,
            recorded_at: cmd.recorded_at,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn quantity(&self) -> u64 {
        self.quantity
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    /// The attribute value this movement has for a key type.
    pub fn key_value(&self, key_type: KeyType) -> &str {
        match key_type {
            KeyType::Category => &self.category,
            KeyType::Name => &self.name,
        }
    }

    pub fn matches(&self, key: &ForecastKey) -> bool {
        self.key_value(key.key_type) == key.key_value
    }
}

impl Entity for InventoryMovement {
    type Id = MovementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn record_trims_and_keeps_fields() {
        let cmd = RecordMovement::new("  Cola 2L ", " drinks", 24, at(2024, 1, 5));
        let id = cmd.movement_id;
        let movement = InventoryMovement::record(cmd).unwrap();

        assert_eq!(movement.id(), &id);
        assert_eq!(movement.name(), "Cola 2L");
        assert_eq!(movement.category(), "drinks");
        assert_eq!(movement.quantity(), 24);
        assert_eq!(movement.recorded_at(), at(2024, 1, 5));
    }

    #[test]
    fn blank_name_or_category_is_rejected() {
        let err = InventoryMovement::record(RecordMovement::new(" ", "drinks", 1, at(2024, 1, 1)))
            .unwrap_err();
        assert_eq!(err, DomainError::validation("name cannot be empty"));

        let err = InventoryMovement::record(RecordMovement::new("Cola", "", 1, at(2024, 1, 1)))
            .unwrap_err();
        assert_eq!(err, DomainError::validation("category cannot be empty"));
    }

    #[test]
    fn matches_by_key_type() {
        let movement =
            InventoryMovement::record(RecordMovement::new("Cola", "drinks", 3, at(2024, 2, 1)))
                .unwrap();

        assert!(movement.matches(&ForecastKey::category("drinks").unwrap()));
        assert!(movement.matches(&ForecastKey::name("Cola").unwrap()));
        assert!(!movement.matches(&ForecastKey::name("drinks").unwrap()));
    }
}
