//! Ordered collection of pinned locations.
//!
//! Every mutation builds a fresh vector and swaps it in, so a snapshot handed out
//! by [`LocationRegistry::list`] never changes under its reader.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::model::{LocationId, PinnedLocation};

#[derive(Debug, Default)]
pub struct LocationRegistry {
    entries: RwLock<Arc<Vec<PinnedLocation>>>,
}

impl LocationRegistry {
    pub fn new(locations: Vec<PinnedLocation>) -> Self {
        let registry = Self::default();
        registry.reset(locations);
        registry
    }

    /// Append `location` unless an entry with the same id exists.
    ///
    /// Returns `true` if it was inserted.
    pub fn add(&self, location: PinnedLocation) -> bool {
        let mut entries = self.entries.write();
        if entries.iter().any(|l| l.id == location.id) {
            debug!(location_id = %location.id, "Location already pinned");
            return false;
        }

        let mut next = Vec::with_capacity(entries.len() + 1);
        next.extend(entries.iter().cloned());
        next.push(location);
        *entries = Arc::new(next);
        true
    }

    pub fn remove(&self, id: &LocationId) -> bool {
        let mut entries = self.entries.write();
        if !entries.iter().any(|l| &l.id == id) {
            return false;
        }

        let next: Vec<_> = entries.iter().filter(|l| &l.id != id).cloned().collect();
        *entries = Arc::new(next);
        true
    }

    pub fn find(&self, id: &LocationId) -> Option<PinnedLocation> {
        self.entries.read().iter().find(|l| &l.id == id).cloned()
    }

    pub fn contains(&self, id: &LocationId) -> bool {
        self.entries.read().iter().any(|l| &l.id == id)
    }

    /// Current entries in insertion order.
    pub fn list(&self) -> Arc<Vec<PinnedLocation>> {
        Arc::clone(&*self.entries.read())
    }

    pub fn ids(&self) -> Vec<LocationId> {
        self.entries.read().iter().map(|l| l.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Replace the entry with `id` by `update(old)`, keeping its position.
    ///
    /// The read and the write happen under one lock. Returns `false` (and does
    /// nothing) when no entry has that id.
    pub fn replace<F>(&self, id: &LocationId, update: F) -> bool
    where
        F: FnOnce(&PinnedLocation) -> PinnedLocation,
    {
        let mut entries = self.entries.write();
        let Some(pos) = entries.iter().position(|l| &l.id == id) else {
            return false;
        };

        let mut next: Vec<PinnedLocation> = (**entries).clone();
        let updated = update(&next[pos]);
        debug_assert_eq!(&updated.id, id, "replace must not change the id");
        next[pos] = updated;
        *entries = Arc::new(next);
        true
    }

    /// Swap in a whole new list; later duplicates of an id are dropped.
    pub fn reset(&self, locations: Vec<PinnedLocation>) {
        let mut next: Vec<PinnedLocation> = Vec::with_capacity(locations.len());
        for location in locations {
            if !next.iter().any(|l| l.id == location.id) {
                next.push(location);
            }
        }
        *self.entries.write() = Arc::new(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::pinned;

    #[test]
    fn add_is_idempotent_and_keeps_first_position() {
        let registry = LocationRegistry::default();

        assert!(registry.add(pinned("Colombo", 6.93, 79.85)));
        assert!(registry.add(pinned("London", 51.52, -0.11)));

        let mut dup = pinned("Colombo (renamed)", 6.93, 79.85);
        dup.region = "Elsewhere".into();
        assert!(!registry.add(dup));

        let list = registry.list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "Colombo");
        assert_eq!(list[1].name, "London");
    }

    #[test]
    fn remove_and_find() {
        let registry = LocationRegistry::default();
        let colombo = pinned("Colombo", 6.93, 79.85);
        let id = colombo.id.clone();
        registry.add(colombo);

        assert!(registry.find(&id).is_some());
        assert!(registry.remove(&id));
        assert!(registry.find(&id).is_none());
        assert!(!registry.remove(&id));
        assert!(registry.is_empty());
    }

    #[test]
    fn snapshots_are_not_affected_by_later_mutations() {
        let registry = LocationRegistry::default();
        registry.add(pinned("Colombo", 6.93, 79.85));

        let before = registry.list();
        registry.add(pinned("London", 51.52, -0.11));

        assert_eq!(before.len(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn replace_keeps_order() {
        let registry = LocationRegistry::default();
        registry.add(pinned("Colombo", 6.93, 79.85));
        registry.add(pinned("London", 51.52, -0.11));
        registry.add(pinned("Tokyo", 35.69, 139.69));

        let id = LocationId::from_coordinates(51.52, -0.11);
        let replaced = registry.replace(&id, |old| PinnedLocation {
            localtime: "2024-01-01 12:00".into(),
            ..old.clone()
        });
        assert!(replaced);

        let names: Vec<_> = registry.list().iter().map(|l| l.name.clone()).collect();
        assert_eq!(names, ["Colombo", "London", "Tokyo"]);
        assert_eq!(registry.find(&id).map(|l| l.localtime), Some("2024-01-01 12:00".into()));

        let missing = LocationId::from("0-0");
        assert!(!registry.replace(&missing, |old| old.clone()));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn reset_collapses_duplicates() {
        let registry = LocationRegistry::new(vec![
            pinned("Colombo", 6.93, 79.85),
            pinned("Colombo again", 6.93, 79.85),
            pinned("London", 51.52, -0.11),
        ]);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.list()[0].name, "Colombo");
    }
}
