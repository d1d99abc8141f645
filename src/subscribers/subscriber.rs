//! # Event subscriber trait (advisory callback).
//!
//! [`Subscribe`] is how callers observe a tracking session: advisory failures
//! for UI display (`SampleFailed`, `ConnectFailed`, `ConnectionLost`) and
//! lifecycle progress (`ChannelOpened`, `ReconnectScheduled`, ...).
//!
//! Each subscriber gets:
//! - **Dedicated worker task** (runs independently)
//! - **Per-subscriber bounded queue** (capacity via [`Subscribe::queue_capacity`])
//! - **Panic isolation** (panics are caught and reported as `EventKind::SubscriberPanicked`)
//!
//! ## Rules
//! - A slow subscriber only affects its own queue; it never delays sampling or sends.
//! - Queue overflow drops the event **for this subscriber only** and publishes
//!   `EventKind::SubscriberOverflow`.
//! - Events are processed sequentially (FIFO) per subscriber.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use trackvisor::{Event, EventKind, Subscribe};
//!
//! struct Banner;
//!
//! #[async_trait]
//! impl Subscribe for Banner {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.is_advisory() {
//!             // show "location unavailable" / "reconnecting..." in the UI
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "banner" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Event subscriber for tracking sessions.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; do not panic.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event, from a dedicated worker task in FIFO order.
    async fn on_event(&self, event: &Event);

    /// Returns the subscriber name used in logs and overflow/panic events.
    ///
    /// The default uses `type_name::<Self>()`; override it with something short.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the preferred queue capacity (clamped to at least 1). Default: 256.
    fn queue_capacity(&self) -> usize {
        256
    }
}
