//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Inventory movements and persisted predictions are entities: two records with
/// identical quantities are still distinct if their ids differ.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
