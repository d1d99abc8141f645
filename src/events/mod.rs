//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish runtime events emitted by samplers, channels, supervisors,
//! publisher pumps and watch handlers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `PositionSampler`, `TrackingChannel`, `ReconnectSupervisor`,
//!   `PositionPublisher` pump, `PositionSubscriber` handlers, `SubscriberSet`
//!   workers (overflow/panic).
//! - **Consumers**: the listener spawned by each publisher/subscriber, which
//!   fans out to its `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
