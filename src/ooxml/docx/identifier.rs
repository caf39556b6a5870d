//! Drawing object identifier reservation.
//!
//! Every `wp:docPr` in a package needs an id that no other drawing uses.
//! [`IdentifierManager`] records the ids granted so far and mints fresh ones
//! when a candidate collides.

use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct IdentifierManager {
    enabled: bool,
    used: HashSet<u32>,
    /// Every minted id is strictly greater than this.
    high_water: u32,
}

impl IdentifierManager {
    /// A manager that tracks reservations.
    pub fn new() -> Self {
        Self {
            enabled: true,
            used: HashSet::new(),
            high_water: 0,
        }
    }

    /// A manager in passthrough mode: `reserve` returns its argument and
    /// records nothing.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Grant `candidate` if it is free, otherwise mint and grant a new id.
    ///
    /// Returns the id the caller must use.
    pub fn reserve(&mut self, candidate: u32) -> u32 {
        if !self.enabled {
            return candidate;
        }
        let id = if self.used.contains(&candidate) {
            self.mint()
        } else {
            candidate
        };
        self.used.insert(id);
        self.high_water = self.high_water.max(id);
        id
    }

    /// Raise the minting floor above `id` without granting it.
    ///
    /// Used before importing foreign drawings so that ids minted for the
    /// first colliding drawing cannot take an id a later one still holds.
    pub fn observe(&mut self, id: u32) {
        if self.enabled {
            self.high_water = self.high_water.max(id);
        }
    }

    /// Whether `id` has been granted.
    #[inline]
    pub fn is_reserved(&self, id: u32) -> bool {
        self.used.contains(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.used.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    /// Largest id granted or observed so far.
    #[inline]
    pub fn max_id(&self) -> u32 {
        self.high_water
    }

    fn mint(&mut self) -> u32 {
        let mut next = self.high_water.saturating_add(1);
        while self.used.contains(&next) {
            next = next.saturating_add(1);
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_unused_candidate_is_kept() {
        let mut ids = IdentifierManager::new();
        assert_eq!(ids.reserve(5), 5);
        assert_eq!(ids.reserve(2), 2);
        assert!(ids.is_reserved(5));
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_collision_mints_above_maximum() {
        let mut ids = IdentifierManager::new();
        ids.reserve(5);
        assert_eq!(ids.reserve(5), 6);
        assert_eq!(ids.reserve(1), 1);
        assert_eq!(ids.reserve(1), 7);
    }

    #[test]
    fn test_observe_raises_floor() {
        let mut ids = IdentifierManager::new();
        ids.reserve(5);
        ids.observe(5);
        ids.observe(6);
        assert_eq!(ids.reserve(5), 7);
        assert_eq!(ids.reserve(6), 6);
        assert!(!ids.is_reserved(8));
    }

    #[test]
    fn test_disabled_is_passthrough() {
        let mut ids = IdentifierManager::disabled();
        assert_eq!(ids.reserve(3), 3);
        assert_eq!(ids.reserve(3), 3);
        assert!(ids.is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn prop_reserved_ids_are_distinct(candidates in prop::collection::vec(0u32..64, 0..200)) {
            let mut ids = IdentifierManager::new();
            let mut granted = HashSet::new();
            for candidate in candidates {
                let id = ids.reserve(candidate);
                prop_assert!(granted.insert(id), "id {} granted twice", id);
            }
        }
    }
}
