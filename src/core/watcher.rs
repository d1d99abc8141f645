//! # PositionSubscriber: consumer side of tracking.
//!
//! Watches any number of subjects, one supervised channel each, and keeps
//! the newest accepted position per subject in a [`LatestPositionStore`].
//!
//! ## Architecture
//! ```text
//! relay ──► TrackingChannel (supervised, per subject)
//!               │ on_message(text)
//!               ▼
//!        decode ── error ──► MessageDiscarded (debug log)
//!               │
//!               ├─ stale? (opt-in) ──► MessageDiscarded
//!               ▼
//!        store.put_if_active() ──► observers.notify() ──► PositionUpdated
//! ```
//!
//! ## Rules
//! - One channel per subject: watching a subject twice returns the same handle.
//! - Latest-wins in arrival order, unless `reject_stale_updates` is set.
//! - `unwatch` is idempotent and clears the subject's slot; a frame still in
//!   flight when it runs cannot refill the slot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::channel::{
    ChannelState, MessageHandler, Role, SessionIdentity, Subject, Transport, wire,
};
use crate::core::observer::ObserverSet;
use crate::core::{
    LatestPositionStore, ObserverId, PositionObserver, PositionUpdate, ReconnectSupervisor,
    TrackingConfig,
};
use crate::error::{MessageError, TrackingError};
use crate::events::{Bus, Event, EventKind};
use crate::geo::{Position, eta};
use crate::subscribers::{Subscribe, SubscriberSet, spawn_listener};

/// Identifies one watch. Returned by [`PositionSubscriber::watch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchHandle {
    subject: Subject,
    id: u64,
}

impl WatchHandle {
    /// The watched subject.
    pub fn subject(&self) -> Subject {
        self.subject
    }
}

struct Watch {
    id: u64,
    token: CancellationToken,
    supervisor: Arc<ReconnectSupervisor>,
}

/// Turns inbound frames of one subject into store updates.
struct Inbound {
    subject: Subject,
    label: Arc<str>,
    store: Arc<LatestPositionStore>,
    observers: Arc<ObserverSet>,
    bus: Bus,
    reject_stale: bool,
    token: CancellationToken,
}

impl Inbound {
    fn handle(&self, text: &str) {
        if self.token.is_cancelled() {
            return;
        }
        let received = SystemTime::now();
        let update = match wire::decode(text, received).and_then(|u| self.check_fresh(u)) {
            Ok(update) => update,
            Err(e) => {
                tracing::debug!(subject = %self.label, error = %e, "inbound message discarded");
                self.bus.publish(
                    Event::new(EventKind::MessageDiscarded)
                        .with_subject(Arc::clone(&self.label))
                        .with_error(e.as_label(), e.as_message()),
                );
                return;
            }
        };

        let entry = PositionUpdate {
            position: update.position,
            last_update: received,
        };
        if !self.store.put_if_active(self.subject, entry, &self.token)
            || self.token.is_cancelled()
        {
            return;
        }
        self.observers.notify(self.subject, &entry);
        self.bus.publish(
            Event::new(EventKind::PositionUpdated)
                .with_subject(Arc::clone(&self.label))
                .with_position(entry.position),
        );
    }

    fn check_fresh(&self, update: wire::InboundUpdate) -> Result<wire::InboundUpdate, MessageError> {
        if !self.reject_stale || !update.producer_timestamp {
            return Ok(update);
        }
        match self.store.get(self.subject) {
            Some(prev) if prev.position.captured_at() > update.position.captured_at() => {
                Err(MessageError::Stale {
                    captured_at_ms: update.position.captured_at_millis(),
                    stored_at_ms: prev.position.captured_at_millis(),
                })
            }
            _ => Ok(update),
        }
    }
}

/// Consumer composition: supervised channels, store and observers.
pub struct PositionSubscriber {
    cfg: TrackingConfig,
    token: SecretString,
    transport: Arc<dyn Transport>,
    bus: Bus,
    store: Arc<LatestPositionStore>,
    observers: Arc<ObserverSet>,
    watches: Mutex<HashMap<Subject, Watch>>,
    next_watch: AtomicU64,
    listener_token: CancellationToken,
    _listener: Option<JoinHandle<()>>,
}

impl PositionSubscriber {
    /// Starts building a subscriber authenticated by `token`.
    pub fn builder(
        cfg: TrackingConfig,
        token: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> SubscriberBuilder {
        SubscriberBuilder {
            cfg,
            token: SecretString::from(token.into()),
            transport,
            subscribers: Vec::new(),
        }
    }

    fn watches(&self) -> MutexGuard<'_, HashMap<Subject, Watch>> {
        self.watches.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts receiving positions for `(role, subject_id)`.
    ///
    /// Returns the existing handle when the subject is already watched.
    /// Must be called inside a Tokio runtime.
    pub fn watch(&self, role: Role, subject_id: u64) -> Result<WatchHandle, TrackingError> {
        let subject = Subject::new(role, subject_id);
        let mut watches = self.watches();
        if let Some(w) = watches.get(&subject) {
            return Ok(WatchHandle { subject, id: w.id });
        }

        let label: Arc<str> = subject.to_string().into();
        let token = CancellationToken::new();
        let inbound = Inbound {
            subject,
            label: Arc::clone(&label),
            store: Arc::clone(&self.store),
            observers: Arc::clone(&self.observers),
            bus: self.bus.clone(),
            reject_stale: self.cfg.reject_stale_updates,
            token: token.clone(),
        };
        let on_message: MessageHandler = Arc::new(move |text: &str| inbound.handle(text));

        let identity = SessionIdentity::new(subject, self.token.expose_secret().to_owned());
        let supervisor = ReconnectSupervisor::new(
            Arc::new(identity),
            &self.cfg,
            Arc::clone(&self.transport),
            on_message,
            self.bus.clone(),
            token.clone(),
        )?;
        supervisor.start();

        let id = self.next_watch.fetch_add(1, Ordering::Relaxed);
        watches.insert(
            subject,
            Watch {
                id,
                token,
                supervisor,
            },
        );
        self.bus
            .publish(Event::new(EventKind::WatchStarted).with_subject(label));
        Ok(WatchHandle { subject, id })
    }

    /// Stops receiving positions for the handle's subject. Idempotent.
    pub fn unwatch(&self, handle: &WatchHandle) {
        let removed = {
            let mut watches = self.watches();
            let live = watches
                .get(&handle.subject)
                .is_some_and(|w| w.id == handle.id);
            if live { watches.remove(&handle.subject) } else { None }
        };
        if let Some(watch) = removed {
            self.store.retire(handle.subject, &watch.token);
            watch.supervisor.stop();
            self.bus.publish(
                Event::new(EventKind::WatchStopped).with_subject(handle.subject.to_string()),
            );
        }
    }

    /// True while `handle` is the live watch of its subject.
    pub fn is_watching(&self, handle: &WatchHandle) -> bool {
        self.watches()
            .get(&handle.subject)
            .is_some_and(|w| w.id == handle.id)
    }

    /// Channel state of a watch (`Disconnected` once unwatched).
    pub fn state(&self, handle: &WatchHandle) -> ChannelState {
        self.watches()
            .get(&handle.subject)
            .filter(|w| w.id == handle.id)
            .map_or(ChannelState::Disconnected, |w| w.supervisor.state())
    }

    /// Registers an observer for all watched subjects.
    pub fn observe(&self, observer: impl PositionObserver) -> ObserverId {
        self.observers.add(Arc::new(observer))
    }

    /// Removes an observer; false if it was not registered.
    pub fn unobserve(&self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    /// Newest accepted position of `subject`.
    pub fn latest(&self, subject: Subject) -> Option<PositionUpdate> {
        self.store.get(subject)
    }

    /// Distance and ETA from `origin` to the newest position of `subject`.
    pub fn estimate_from(
        &self,
        subject: Subject,
        origin: &Position,
        speed_kmh: f64,
    ) -> Option<eta::Estimate> {
        self.latest(subject)
            .map(|u| eta::estimate(origin, &u.position, speed_kmh))
    }

    /// The shared store.
    pub fn store(&self) -> Arc<LatestPositionStore> {
        Arc::clone(&self.store)
    }

    /// Receiver of every event this subscriber publishes.
    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Stops every watch.
    pub fn unwatch_all(&self) {
        let handles: Vec<WatchHandle> = self
            .watches()
            .iter()
            .map(|(subject, w)| WatchHandle {
                subject: *subject,
                id: w.id,
            })
            .collect();
        for handle in &handles {
            self.unwatch(handle);
        }
    }
}

impl Drop for PositionSubscriber {
    fn drop(&mut self) {
        self.unwatch_all();
        self.listener_token.cancel();
    }
}

/// Builder for [`PositionSubscriber`].
pub struct SubscriberBuilder {
    cfg: TrackingConfig,
    token: SecretString,
    transport: Arc<dyn Transport>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SubscriberBuilder {
    /// Sets event subscribers (advisory callbacks, logging).
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Validates the config and builds the subscriber.
    ///
    /// With event subscribers this spawns their listener, so it must then run
    /// inside a Tokio runtime.
    pub fn build(self) -> Result<PositionSubscriber, TrackingError> {
        self.cfg.validate()?;
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let listener_token = CancellationToken::new();
        let listener = (!self.subscribers.is_empty()).then(|| {
            let set = SubscriberSet::new(self.subscribers, bus.clone());
            spawn_listener(&bus, set, listener_token.clone())
        });

        Ok(PositionSubscriber {
            cfg: self.cfg,
            token: self.token,
            transport: self.transport,
            bus,
            store: Arc::new(LatestPositionStore::new()),
            observers: Arc::new(ObserverSet::default()),
            watches: Mutex::new(HashMap::new()),
            next_watch: AtomicU64::new(0),
            listener_token,
            _listener: listener,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryRelay;
    use crate::core::RelayConfig;
    use std::time::Duration;
    use tokio::time;

    const ROOM: &str = "/technician-tracking/42/";

    fn subscriber(relay: &MemoryRelay, reject_stale: bool) -> PositionSubscriber {
        let mut cfg = TrackingConfig::for_relay(RelayConfig::new("relay.test", false));
        cfg.reject_stale_updates = reject_stale;
        PositionSubscriber::builder(cfg, "tok", Arc::new(relay.clone()))
            .build()
            .unwrap()
    }

    async fn wait_open(sub: &PositionSubscriber, h: &WatchHandle) {
        while sub.state(h) != ChannelState::Open {
            time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn settle() {
        time::sleep(Duration::from_millis(5)).await;
    }

    fn frame(lat: f64, lng: f64, captured_at: Option<i64>) -> String {
        match captured_at {
            Some(ms) => format!(
                r#"{{"type":"location_update","latitude":{lat},"longitude":{lng},"captured_at":{ms}}}"#
            ),
            None => format!(r#"{{"type":"location_update","latitude":{lat},"longitude":{lng}}}"#),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn accepted_update_fills_store_and_notifies() {
        let relay = MemoryRelay::new();
        let sub = subscriber(&relay, false);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        sub.observe(move |s: Subject, u: &PositionUpdate| {
            sink.lock().unwrap().push((s, u.position.coords()))
        });

        let h = sub.watch(Role::Technician, 42).unwrap();
        wait_open(&sub, &h).await;
        relay.inject(ROOM, &frame(12.65, -8.0, None));
        settle().await;

        let latest = sub.latest(Subject::technician(42)).unwrap();
        assert_eq!(latest.position.coords(), (12.65, -8.0));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(Subject::technician(42), (12.65, -8.0))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn bad_frames_never_reach_the_store() {
        let relay = MemoryRelay::new();
        let sub = subscriber(&relay, false);
        let mut events = sub.subscribe_events();
        let h = sub.watch(Role::Technician, 42).unwrap();
        wait_open(&sub, &h).await;

        relay.inject(ROOM, "garbage");
        relay.inject(ROOM, r#"{"type":"chat","text":"hi"}"#);
        relay.inject(ROOM, &frame(123.0, 0.0, None));
        settle().await;

        assert!(sub.latest(Subject::technician(42)).is_none());
        let mut discarded = 0;
        while let Ok(ev) = events.try_recv() {
            if ev.kind == EventKind::MessageDiscarded {
                discarded += 1;
            }
        }
        assert_eq!(discarded, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn last_arrival_wins_by_default() {
        let relay = MemoryRelay::new();
        let sub = subscriber(&relay, false);
        let h = sub.watch(Role::Technician, 42).unwrap();
        wait_open(&sub, &h).await;

        relay.inject(ROOM, &frame(1.0, 1.0, Some(2_000)));
        relay.inject(ROOM, &frame(2.0, 2.0, Some(1_000)));
        settle().await;
        assert_eq!(sub.latest(h.subject()).unwrap().position.coords(), (2.0, 2.0));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_updates_are_rejected_when_enabled() {
        let relay = MemoryRelay::new();
        let sub = subscriber(&relay, true);
        let h = sub.watch(Role::Technician, 42).unwrap();
        wait_open(&sub, &h).await;

        relay.inject(ROOM, &frame(1.0, 1.0, Some(2_000)));
        relay.inject(ROOM, &frame(2.0, 2.0, Some(1_000)));
        relay.inject(ROOM, &frame(3.0, 3.0, Some(3_000)));
        settle().await;
        assert_eq!(sub.latest(h.subject()).unwrap().position.coords(), (3.0, 3.0));
    }

    #[tokio::test(start_paused = true)]
    async fn watch_is_shared_and_unwatch_is_idempotent() {
        let relay = MemoryRelay::new();
        let sub = subscriber(&relay, false);
        let a = sub.watch(Role::Technician, 42).unwrap();
        let b = sub.watch(Role::Technician, 42).unwrap();
        assert_eq!(a, b);
        wait_open(&sub, &a).await;
        assert_eq!(relay.connections_in(ROOM), 1);

        relay.inject(ROOM, &frame(1.0, 1.0, None));
        settle().await;
        assert!(sub.latest(a.subject()).is_some());

        sub.unwatch(&a);
        sub.unwatch(&b);
        assert!(!sub.is_watching(&a));
        assert!(sub.latest(a.subject()).is_none());
        settle().await;
        assert_eq!(relay.connections_in(ROOM), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn frames_in_flight_cannot_refill_an_unwatched_slot() {
        use std::sync::atomic::AtomicBool;

        let relay = MemoryRelay::new();
        let sub = subscriber(&relay, false);
        let subject = Subject::technician(42);

        for round in 0..100 {
            let h = sub.watch(Role::Technician, 42).unwrap();
            wait_open(&sub, &h).await;

            let flooding = Arc::new(AtomicBool::new(true));
            let flood = {
                let relay = relay.clone();
                let flooding = Arc::clone(&flooding);
                std::thread::spawn(move || {
                    let mut i = 0u32;
                    while flooding.load(Ordering::Relaxed) {
                        let lat = f64::from(i % 80);
                        relay.inject(ROOM, &frame(lat, 0.0, None));
                        i = i.wrapping_add(1);
                        std::thread::yield_now();
                    }
                })
            };

            time::sleep(Duration::from_millis(2)).await;
            sub.unwatch(&h);
            time::sleep(Duration::from_millis(20)).await;
            flooding.store(false, Ordering::Relaxed);
            flood.join().unwrap();

            assert!(
                sub.latest(subject).is_none(),
                "slot refilled after unwatch in round {round}"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn estimate_uses_latest_position() {
        let relay = MemoryRelay::new();
        let sub = subscriber(&relay, false);
        let h = sub.watch(Role::Technician, 42).unwrap();
        wait_open(&sub, &h).await;
        relay.inject(ROOM, &frame(12.65, -8.0, None));
        settle().await;

        let origin = Position::at(12.6392, -8.0029).unwrap();
        let est = sub
            .estimate_from(h.subject(), &origin, eta::DEFAULT_SPEED_KMH)
            .unwrap();
        assert!((est.distance_km - 1.25).abs() < 0.05);
        assert!(sub.estimate_from(Subject::client(1), &origin, 30.0).is_none());
    }
}
