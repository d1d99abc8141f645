//! # trackvisor
//!
//! **Trackvisor** keeps a live position stream flowing between a mobile
//! producer (a technician or client device) and any number of viewers over
//! an unreliable network, and estimates arrival times from it.
//!
//! It provides a sampler over an injected location capability, single-use
//! relay channels, a supervisor that re-establishes them with backoff, and
//! producer/consumer compositions on top.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   producer device                                            viewer
//! ┌──────────────────────────────────┐          ┌───────────────────────────────────┐
//! │ PositionPublisher                │          │ PositionSubscriber                │
//! │  Locator ─► PositionSampler      │          │  watch(role, id) per subject      │
//! │               │ SampleStream     │          │   ReconnectSupervisor             │
//! │               ▼                  │          │     └─► TrackingChannel ─┐        │
//! │             pump ─► Reconnect-   │  relay   │                          ▼        │
//! │                     Supervisor ──┼─► ws ──► │               decode / validate   │
//! │                       └─► Tracking│          │                          ▼        │
//! │                           Channel │          │  LatestPositionStore ─► observers │
//! └────────────────┬─────────────────┘          └────────────────┬──────────────────┘
//!                  │ publish(Event)                               │ publish(Event)
//!                  ▼                                              ▼
//!          Bus ─► listener ─► SubscriberSet ─► LogWriter / UI banner / metrics
//! ```
//!
//! ### Reconnection
//! ```text
//! Disconnected ─open()─► Connecting ─ok─► Open ─lost─► Disconnected
//!                             └─failed─► Disconnected
//!
//! supervisor: failure → ReconnectScheduled{ delay = max(backoff, floor) } → fresh channel
//! ```
//!
//! ## Features
//! | Area              | Description                                             | Key types / traits                               |
//! |-------------------|---------------------------------------------------------|--------------------------------------------------|
//! | **Sampling**      | Periodic fixes with timeout, max age and range checks.  | [`PositionSampler`], [`Locator`]                 |
//! | **Channels**      | Token-authenticated duplex relay sessions.              | [`TrackingChannel`], [`Transport`]               |
//! | **Supervision**   | Debounced, backed-off reconnection per subject.         | [`ReconnectSupervisor`], [`ReconnectPolicy`]     |
//! | **Producer**      | Sample → send loop with a tracking session.             | [`PositionPublisher`]                            |
//! | **Consumer**      | Latest position per subject plus observers.             | [`PositionSubscriber`], [`PositionObserver`]     |
//! | **ETA**           | Haversine distance and arrival estimate.                | [`geo::eta`]                                     |
//! | **Subscriber API**| Advisory and lifecycle events.                          | [`Subscribe`], [`Event`]                         |
//! | **Configuration** | Centralized settings.                                   | [`TrackingConfig`], [`RelayConfig`]              |
//!
//! ## Optional features
//! - `logging` (default): exports the built-in [`LogWriter`] subscriber.
//! - `websocket` (default): exports `WsTransport` (tokio-tungstenite).
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use async_trait::async_trait;
//! use trackvisor::{
//!     Fix, Locator, MemoryRelay, PositionPublisher, PositionSubscriber, RelayConfig, Role,
//!     SamplerError, SessionIdentity, Subject, TrackingConfig,
//! };
//!
//! struct Parked;
//!
//! #[async_trait]
//! impl Locator for Parked {
//!     async fn current_position(&self, _max_age: Duration) -> Result<Fix, SamplerError> {
//!         Ok(Fix::now(12.6392, -8.0029))
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let relay = MemoryRelay::new();
//!     let cfg = TrackingConfig::for_relay(RelayConfig::new("relay.local", false));
//!
//!     let viewer = PositionSubscriber::builder(cfg.clone(), "viewer-token", Arc::new(relay.clone()))
//!         .build()?;
//!     viewer.watch(Role::Technician, 42)?;
//!
//!     let publisher = PositionPublisher::builder(
//!         cfg,
//!         SessionIdentity::new(Subject::technician(42), "tech-token"),
//!         Arc::new(Parked),
//!         Arc::new(relay),
//!     )
//!     .build()?;
//!     publisher.start_tracking(Duration::from_secs(5))?;
//!
//!     // ... later
//!     publisher.stop_tracking();
//!     Ok(())
//! }
//! ```

mod channel;
mod core;
mod error;
pub mod events;
pub mod geo;
mod policies;
mod sampler;
pub mod subscribers;

// ---- Public re-exports ----

pub use channel::{
    ChannelParams, ChannelState, Connection, MemoryRelay, MessageHandler, Role, SessionIdentity,
    Subject, TrackingChannel, Transport, endpoint, wire,
};
#[cfg(feature = "websocket")]
pub use channel::WsTransport;
pub use core::{
    LatestPositionStore, MIN_TRACKING_INTERVAL, ObserverId, PositionObserver, PositionPublisher,
    PositionSubscriber, PositionUpdate, PublisherBuilder, ReconnectSupervisor, RelayConfig,
    SubscriberBuilder, TrackingConfig, TrackingSession, WatchHandle,
};
pub use error::{
    ChannelError, ConfigError, MessageError, PositionError, SamplerError, TrackingError,
    TransportError,
};
pub use events::{Bus, Event, EventKind};
pub use geo::{LocationRecord, Position, eta};
pub use policies::{BackoffPolicy, JitterPolicy, MIN_RECONNECT_FLOOR, ReconnectPolicy};
pub use sampler::{Fix, Locator, PositionSampler, SampleStream, SamplerParams};
pub use subscribers::{Subscribe, SubscriberSet};

#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
