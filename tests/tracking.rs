//! End-to-end: a publisher and a subscriber talking through an in-process relay.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time;

use trackvisor::geo::eta;
use trackvisor::{
    ChannelState, Event, EventKind, Fix, Locator, MemoryRelay, Position, PositionPublisher,
    PositionSubscriber, PositionUpdate, RelayConfig, Role, SamplerError, SessionIdentity, Subject,
    Subscribe, TrackingConfig,
};

/// Drives north by 0.001° per fix.
struct Driving {
    fixes: AtomicU32,
}

#[async_trait]
impl Locator for Driving {
    async fn current_position(&self, _max_age: Duration) -> Result<Fix, SamplerError> {
        let n = self.fixes.fetch_add(1, Ordering::SeqCst);
        Ok(Fix::now(12.6392 + f64::from(n) * 0.001, -8.0029))
    }
}

#[derive(Default)]
struct Collect(Mutex<Vec<EventKind>>);

impl Collect {
    fn count(&self, kind: EventKind) -> usize {
        self.0.lock().unwrap().iter().filter(|k| **k == kind).count()
    }
}

#[async_trait]
impl Subscribe for Collect {
    async fn on_event(&self, ev: &Event) {
        self.0.lock().unwrap().push(ev.kind);
    }

    fn name(&self) -> &'static str {
        "collect"
    }
}

fn config() -> TrackingConfig {
    TrackingConfig::for_relay(RelayConfig::new("relay.test", false))
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    while !cond() {
        time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn viewer_follows_technician_across_a_relay_outage() {
    let relay = MemoryRelay::new();
    let advisories = Arc::new(Collect::default());

    let viewer = PositionSubscriber::builder(config(), "viewer", Arc::new(relay.clone()))
        .build()
        .unwrap();
    let updates = Arc::new(Mutex::new(Vec::<f64>::new()));
    let sink = Arc::clone(&updates);
    viewer.observe(move |_: Subject, u: &PositionUpdate| {
        sink.lock().unwrap().push(u.position.latitude())
    });
    let watch = viewer.watch(Role::Technician, 42).unwrap();
    wait_until(|| viewer.state(&watch) == ChannelState::Open).await;

    let publisher = PositionPublisher::builder(
        config(),
        SessionIdentity::new(Subject::technician(42), "tech"),
        Arc::new(Driving {
            fixes: AtomicU32::new(0),
        }),
        Arc::new(relay.clone()),
    )
    .with_subscribers(vec![advisories.clone()])
    .build()
    .unwrap();
    publisher.start_tracking(Duration::from_secs(2)).unwrap();

    wait_until(|| updates.lock().unwrap().len() >= 2).await;

    // Cell tower handoff: every socket drops.
    relay.sever_all("handoff");
    let before = updates.lock().unwrap().len();
    wait_until(|| updates.lock().unwrap().len() >= before + 2).await;

    let seen = updates.lock().unwrap().clone();
    assert!(seen.windows(2).all(|w| w[0] < w[1]), "{seen:?}");

    let latest = viewer.latest(Subject::technician(42)).unwrap();
    let origin = Position::at(12.6392, -8.0029).unwrap();
    let est = eta::estimate(&origin, &latest.position, eta::DEFAULT_SPEED_KMH);
    assert!(est.distance_km > 0.0);

    publisher.stop_tracking();
    viewer.unwatch(&watch);
    time::sleep(Duration::from_secs(1)).await;

    assert!(advisories.count(EventKind::ConnectionLost) >= 1);
    assert!(advisories.count(EventKind::ReconnectScheduled) >= 1);
    assert_eq!(advisories.count(EventKind::TrackingStopped), 1);
    assert_eq!(relay.connections(), 0);
}

#[tokio::test(start_paused = true)]
async fn publisher_keeps_sampling_until_the_relay_accepts() {
    let relay = MemoryRelay::new();
    relay.fail_next_connects(3);

    let publisher = PositionPublisher::builder(
        config(),
        SessionIdentity::new(Subject::client(7), "client"),
        Arc::new(Driving {
            fixes: AtomicU32::new(0),
        }),
        Arc::new(relay.clone()),
    )
    .build()
    .unwrap();
    let mut events = publisher.subscribe_events();
    publisher.start_tracking(Duration::from_secs(1)).unwrap();

    wait_until(|| publisher.state() == ChannelState::Open).await;
    assert_eq!(publisher.connect_attempts(), 4);

    let mut dropped = 0;
    while let Ok(ev) = events.try_recv() {
        if ev.kind == EventKind::SampleDropped {
            dropped += 1;
        }
    }
    assert!(dropped >= 1);

    publisher.stop_tracking();
    publisher.stop_tracking();
    let attempts = relay.connect_attempts();
    time::sleep(Duration::from_secs(60)).await;
    assert_eq!(relay.connect_attempts(), attempts);
}
