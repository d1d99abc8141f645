//! # Event subscribers for tracking sessions.
//!
//! This module provides the [`Subscribe`] trait (the advisory callback) and
//! the plumbing that delivers [`Bus`](crate::events::Bus) events to it.
//!
//! ## Architecture
//! ```text
//! Sampler / Channel / Supervisor ── publish(Event) ──► Bus ──► listener
//!                                                                │
//!                                                                ▼
//!                                                          SubscriberSet
//!                                                   ┌────────────┼────────────┐
//!                                                   ▼            ▼            ▼
//!                                               LogWriter    UI banner     metrics
//! ```

#[cfg(feature = "logging")]
mod embedded;
mod subscriber;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub use subscriber::Subscribe;
pub use subscriber_set::{SubscriberSet, spawn_listener};
