//! Tracking core: configuration, supervision and compositions.
//!
//! Internal modules:
//! - [`config`]: relay location and tracking settings;
//! - [`supervisor`]: keeps one channel alive per subject with backoff;
//! - [`publisher`]: producer composition (sampler + supervisor + pump);
//! - [`watcher`]: consumer composition (supervisors + store + observers);
//! - [`store`]: latest position per subject;
//! - [`observer`]: synchronous position callbacks.

mod config;
mod observer;
mod publisher;
mod store;
mod supervisor;
mod watcher;

pub use config::{MIN_TRACKING_INTERVAL, RelayConfig, TrackingConfig};
pub use observer::{ObserverId, PositionObserver};
pub use publisher::{PositionPublisher, PublisherBuilder, TrackingSession};
pub use store::{LatestPositionStore, PositionUpdate};
pub use supervisor::ReconnectSupervisor;
pub use watcher::{PositionSubscriber, SubscriberBuilder, WatchHandle};
