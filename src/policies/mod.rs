//! Reconnect timing policies.
//!
//! ## Contents
//! - [`ReconnectPolicy`] debounce floor + backoff combination used by the supervisor
//! - [`BackoffPolicy`] how waits evolve across consecutive failures (first / factor / max + jitter)
//! - [`JitterPolicy`] randomization strategy to avoid reconnect storms
//!
//! ## Quick wiring
//! ```text
//! TrackingConfig { reconnect: ReconnectPolicy { backoff, floor }, .. }
//!      └─► core::supervisor::ReconnectSupervisor uses:
//!           - reconnect.delay(failures, since_attempt_start) before each new channel
//! ```
//!
//! ## Defaults
//! - floor = 1s (at most one attempt per second)
//! - backoff: first=1s, factor=2.0, max=30s, jitter=None

mod backoff;
mod jitter;
mod reconnect;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use reconnect::{MIN_RECONNECT_FLOOR, ReconnectPolicy};
