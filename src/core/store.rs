//! # Latest-position store.
//!
//! One slot per watched subject, overwritten by every accepted inbound
//! update. Writes come from the subject's channel driver; reads from anyone.
//!
//! A watch writes through [`LatestPositionStore::put_if_active`] and is torn
//! down by [`LatestPositionStore::retire`]. Both run under the write lock, so
//! once `retire` returns no write from that watch can land.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::SystemTime;

use tokio_util::sync::CancellationToken;

use crate::channel::Subject;
use crate::geo::Position;

/// The newest accepted position for a subject.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionUpdate {
    /// Validated position as received.
    pub position: Position,
    /// Local time the update was accepted.
    pub last_update: SystemTime,
}

/// Single-slot map `subject → PositionUpdate`.
#[derive(Debug, Default)]
pub struct LatestPositionStore {
    slots: RwLock<HashMap<Subject, PositionUpdate>>,
}

impl LatestPositionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the slot for `subject`.
    pub fn get(&self, subject: Subject) -> Option<PositionUpdate> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&subject)
            .copied()
    }

    /// Overwrites the slot, returning the previous value.
    pub fn put(&self, subject: Subject, update: PositionUpdate) -> Option<PositionUpdate> {
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(subject, update)
    }

    /// Overwrites the slot only while `active` is not cancelled.
    ///
    /// Returns false (and leaves the slot alone) once it is.
    pub fn put_if_active(
        &self,
        subject: Subject,
        update: PositionUpdate,
        active: &CancellationToken,
    ) -> bool {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        if active.is_cancelled() {
            return false;
        }
        slots.insert(subject, update);
        true
    }

    /// Cancels `active` and clears the slot in one step.
    pub fn retire(&self, subject: Subject, active: &CancellationToken) -> Option<PositionUpdate> {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        active.cancel();
        slots.remove(&subject)
    }

    /// Clears the slot.
    pub fn remove(&self, subject: Subject) -> Option<PositionUpdate> {
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&subject)
    }

    /// Subjects that currently hold a position.
    pub fn subjects(&self) -> Vec<Subject> {
        let mut out: Vec<Subject> = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        out.sort();
        out
    }

    /// Number of filled slots.
    pub fn len(&self) -> usize {
        self.slots.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True when no slot is filled.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(lat: f64) -> PositionUpdate {
        PositionUpdate {
            position: Position::at(lat, 0.0).unwrap(),
            last_update: SystemTime::now(),
        }
    }

    #[test]
    fn latest_wins_per_subject() {
        let store = LatestPositionStore::new();
        let tech = Subject::technician(1);
        let client = Subject::client(1);

        assert!(store.put(tech, update(1.0)).is_none());
        assert!(store.put(tech, update(2.0)).is_some());
        store.put(client, update(3.0));

        assert_eq!(store.get(tech).unwrap().position.latitude(), 2.0);
        assert_eq!(store.get(client).unwrap().position.latitude(), 3.0);
        assert_eq!(store.len(), 2);
        assert_eq!(store.subjects(), vec![tech, client]);
    }

    #[test]
    fn retired_watch_cannot_write() {
        let store = LatestPositionStore::new();
        let tech = Subject::technician(3);
        let active = CancellationToken::new();

        assert!(store.put_if_active(tech, update(1.0), &active));
        assert!(store.retire(tech, &active).is_some());
        assert!(active.is_cancelled());

        assert!(!store.put_if_active(tech, update(2.0), &active));
        assert!(store.get(tech).is_none());
    }

    #[test]
    fn remove_clears_slot() {
        let store = LatestPositionStore::new();
        store.put(Subject::client(9), update(0.5));
        assert!(store.remove(Subject::client(9)).is_some());
        assert!(store.is_empty());
        assert!(store.get(Subject::client(9)).is_none());
    }
}
