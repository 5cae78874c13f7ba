//! Optimistic concurrency for stored prediction sets.

/// Expected revision of a key's stored prediction set.
///
/// Every full replacement of a key's predictions bumps its revision by one. A
/// key that was never written is at revision `0`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedRevision {
    /// Skip revision checking (last writer wins).
    Any,
    /// Require the stored set to be at an exact revision.
    Exact(u64),
}

impl ExpectedRevision {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedRevision::Any => true,
            ExpectedRevision::Exact(v) => v == actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_matches_every_revision() {
        assert!(ExpectedRevision::Any.matches(0));
        assert!(ExpectedRevision::Any.matches(42));
    }

    #[test]
    fn exact_rejects_stale_revision() {
        assert!(ExpectedRevision::Exact(3).matches(3));
        assert!(!ExpectedRevision::Exact(3).matches(4));
        assert!(!ExpectedRevision::Exact(0).matches(1));
    }
}
