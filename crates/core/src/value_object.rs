//! Value object trait: equality by value, not identity.
//!
//! Value objects are domain objects that have **no identity** - they are defined entirely
//! by their attribute values. Two value objects with the same values are considered equal.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. A `YearMonth`
/// of 2023-11 is the same month wherever it appears; a `ForecastKey` for the
/// category "beverages" names the same partition in every request.
///
/// ## Value Object vs Entity
///
/// - **Value Object**: No identity (two value objects with same values are equal)
/// - **Entity**: Has identity (two movements with the same quantity are still distinct)
///
/// The trait requires:
/// - **Clone**: value objects are passed around by value
/// - **PartialEq**: compared by their attribute values
/// - **Debug**: useful in logs and test failures
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
