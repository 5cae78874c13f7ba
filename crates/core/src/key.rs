//! Forecasting partitions.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Which product attribute a forecast is partitioned by.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    Category,
    Name,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Category => "category",
            KeyType::Name => "name",
        }
    }
}

impl core::fmt::Display for KeyType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for KeyType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "category" => Ok(KeyType::Category),
            "name" => Ok(KeyType::Name),
            other => Err(DomainError::validation(format!(
                "unknown key type '{other}' (expected 'category' or 'name')"
            ))),
        }
    }
}

/// A forecasting key: either a product category or a product name, never both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ForecastKey {
    pub key_type: KeyType,
    pub key_value: String,
}

impl ValueObject for ForecastKey {}

impl ForecastKey {
    pub fn new(key_type: KeyType, key_value: impl Into<String>) -> DomainResult<Self> {
        let key_value = key_value.into();
        if key_value.trim().is_empty() {
            return Err(DomainError::validation(format!(
                "{key_type} key value cannot be empty"
            )));
        }
        Ok(Self {
            key_type,
            key_value,
        })
    }

    pub fn category(value: impl Into<String>) -> DomainResult<Self> {
        Self::new(KeyType::Category, value)
    }

    pub fn name(value: impl Into<String>) -> DomainResult<Self> {
        Self::new(KeyType::Name, value)
    }

    /// Build a key from an optional category/name pair.
    ///
    /// Exactly one of the two must be present.
    pub fn from_parts(category: Option<&str>, name: Option<&str>) -> DomainResult<Self> {
        match (category, name) {
            (Some(c), None) => Self::category(c),
            (None, Some(n)) => Self::name(n),
            (None, None) => Err(DomainError::validation("either category or name is required")),
            (Some(_), Some(_)) => Err(DomainError::validation(
                "provide only one of category or name, not both",
            )),
        }
    }
}

impl core::fmt::Display for ForecastKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}={}", self.key_type, self.key_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_value_is_rejected() {
        assert!(ForecastKey::category("   ").is_err());
        assert!(ForecastKey::name("").is_err());
    }

    #[test]
    fn from_parts_requires_exactly_one() {
        assert_eq!(
            ForecastKey::from_parts(Some("drinks"), None).unwrap(),
            ForecastKey::category("drinks").unwrap()
        );
        assert_eq!(
            ForecastKey::from_parts(None, Some("cola")).unwrap().key_type,
            KeyType::Name
        );
        assert!(ForecastKey::from_parts(None, None).is_err());
        assert!(ForecastKey::from_parts(Some("drinks"), Some("cola")).is_err());
    }

    #[test]
    fn key_type_parses_case_insensitively() {
        assert_eq!("Category".parse::<KeyType>().unwrap(), KeyType::Category);
        assert_eq!(" name ".parse::<KeyType>().unwrap(), KeyType::Name);
        assert!("sku".parse::<KeyType>().is_err());
    }
}
