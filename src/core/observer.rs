//! # Position observers.
//!
//! A [`PositionObserver`] is called synchronously, on the channel driver,
//! for every accepted inbound update. Keep it short: a slow observer delays
//! the next frame of that subject. Closures `Fn(Subject, &PositionUpdate)`
//! implement the trait.
//!
//! A panicking observer is logged and skipped; the other observers and the
//! channel keep running.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::channel::Subject;
use crate::core::PositionUpdate;

/// Receives accepted position updates.
pub trait PositionObserver: Send + Sync + 'static {
    /// Called once per accepted update.
    fn on_position(&self, subject: Subject, update: &PositionUpdate);
}

impl<F> PositionObserver for F
where
    F: Fn(Subject, &PositionUpdate) + Send + Sync + 'static,
{
    fn on_position(&self, subject: Subject, update: &PositionUpdate) {
        self(subject, update)
    }
}

/// Registration handle returned by `observe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

#[derive(Default)]
pub(crate) struct ObserverSet {
    next: AtomicU64,
    observers: RwLock<Vec<(ObserverId, Arc<dyn PositionObserver>)>>,
}

impl ObserverSet {
    pub(crate) fn add(&self, observer: Arc<dyn PositionObserver>) -> ObserverId {
        let id = ObserverId(self.next.fetch_add(1, Ordering::Relaxed));
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, observer));
        id
    }

    pub(crate) fn remove(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write().unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|(oid, _)| *oid != id);
        observers.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Calls every observer; the list is snapshotted so observers may (un)register.
    pub(crate) fn notify(&self, subject: Subject, update: &PositionUpdate) {
        let snapshot: Vec<(ObserverId, Arc<dyn PositionObserver>)> = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (id, observer) in snapshot {
            let call = AssertUnwindSafe(|| observer.on_position(subject, update));
            if catch_unwind(call).is_err() {
                tracing::error!(subject = %subject, observer = ?id, "position observer panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Position;
    use std::sync::Mutex;
    use std::time::SystemTime;

    fn update() -> PositionUpdate {
        PositionUpdate {
            position: Position::at(1.0, 1.0).unwrap(),
            last_update: SystemTime::now(),
        }
    }

    #[test]
    fn closures_are_observers_and_can_be_removed() {
        let set = ObserverSet::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = set.add(Arc::new(move |s: Subject, _: &PositionUpdate| {
            sink.lock().unwrap().push(s)
        }));

        set.notify(Subject::client(4), &update());
        assert!(set.remove(id));
        assert!(!set.remove(id));
        set.notify(Subject::client(5), &update());

        assert_eq!(*seen.lock().unwrap(), vec![Subject::client(4)]);
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn panicking_observer_does_not_stop_the_others() {
        let set = ObserverSet::default();
        let hits = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&hits);
        set.add(Arc::new(|_: Subject, _: &PositionUpdate| panic!("bad observer")));
        set.add(Arc::new(move |_: Subject, _: &PositionUpdate| {
            *sink.lock().unwrap() += 1
        }));

        set.notify(Subject::technician(1), &update());
        assert_eq!(*hits.lock().unwrap(), 1);
    }
}
