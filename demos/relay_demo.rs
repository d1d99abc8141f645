//! Technician drives toward a client; the client watches the ETA.
//!
//! Runs entirely in-process on a `MemoryRelay`, drops every socket halfway
//! through to show reconnection.
//!
//! ```text
//! cargo run --example relay_demo
//! RUST_LOG=trackvisor=debug cargo run --example relay_demo
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing_subscriber::EnvFilter;
use trackvisor::geo::eta;
use trackvisor::{
    Fix, Locator, LogWriter, MemoryRelay, Position, PositionPublisher, PositionSubscriber,
    PositionUpdate, RelayConfig, Role, SamplerError, SessionIdentity, Subject, Subscribe,
    TrackingConfig,
};

const CLIENT: (f64, f64) = (12.6500, -8.0000);

/// Linear drive from Bamako centre to the client.
struct Drive {
    step: AtomicU32,
    steps: u32,
}

#[async_trait]
impl Locator for Drive {
    async fn current_position(&self, _max_age: Duration) -> Result<Fix, SamplerError> {
        let n = self.step.fetch_add(1, Ordering::SeqCst).min(self.steps);
        let t = f64::from(n) / f64::from(self.steps);
        let (lat0, lng0) = (12.6392, -8.0029);
        Ok(Fix::now(
            lat0 + (CLIENT.0 - lat0) * t,
            lng0 + (CLIENT.1 - lng0) * t,
        ))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trackvisor=info")),
        )
        .init();

    let relay = MemoryRelay::new();
    let mut cfg = TrackingConfig::for_relay(RelayConfig::from_origin("http://localhost:8000")?);
    cfg.reject_stale_updates = true;
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];

    let client = PositionSubscriber::builder(cfg.clone(), "client-token", Arc::new(relay.clone()))
        .with_subscribers(subs.clone())
        .build()?;
    let home = Position::at(CLIENT.0, CLIENT.1)?;
    client.observe(move |subject: Subject, u: &PositionUpdate| {
        let est = eta::estimate(&u.position, &home, eta::DEFAULT_SPEED_KMH);
        match est.eta_minutes {
            Some(min) => println!("{subject}: {:.2} km away, ~{min} min", est.distance_km),
            None => println!("{subject}: arrived"),
        }
    });
    let watch = client.watch(Role::Technician, 42)?;

    let technician = PositionPublisher::builder(
        cfg,
        SessionIdentity::new(Subject::technician(42), "tech-token"),
        Arc::new(Drive {
            step: AtomicU32::new(0),
            steps: 8,
        }),
        Arc::new(relay.clone()),
    )
    .with_subscribers(subs)
    .build()?;
    technician.start_tracking(Duration::from_secs(1))?;

    tokio::time::sleep(Duration::from_secs(4)).await;
    relay.sever_all("simulated tower handoff");
    tokio::time::sleep(Duration::from_secs(6)).await;

    technician.stop_tracking();
    client.unwatch(&watch);
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(())
}
