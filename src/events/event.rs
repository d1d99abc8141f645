//! # Runtime events emitted by samplers, channels, supervisors and watchers.
//!
//! The [`EventKind`] enum classifies events across four groups:
//! - **Session events**: tracking/watch started and stopped
//! - **Sampling events**: fixes taken, failed, rejected, dropped
//! - **Channel events**: connecting, opened, failed, lost, closed, reconnect scheduled
//! - **Consumer events**: position accepted into the store, message discarded
//!
//! Sampler and channel failures are **advisory**: they are delivered here for
//! UI display while the underlying loop keeps going.
//!
//! ## Ordering guarantees
//! Each event carries a process-wide sequence number (`seq`) that increases
//! monotonically. Use it to restore publish order across subscribers.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use trackvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ReconnectScheduled)
//!     .with_subject("technician/42")
//!     .with_attempt(3)
//!     .with_delay(Duration::from_secs(2));
//!
//! assert_eq!(ev.kind, EventKind::ReconnectScheduled);
//! assert_eq!(ev.subject.as_deref(), Some("technician/42"));
//! assert_eq!(ev.delay_ms, Some(2000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::geo::Position;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing (`subject` = subscriber name).
    SubscriberPanicked,
    /// Subscriber dropped an event, queue full or closed (`subject` = subscriber name).
    SubscriberOverflow,

    // === Session events ===
    /// Producer session started (`delay_ms` carries the sampling interval).
    TrackingStarted,
    /// Producer session stopped by the caller.
    TrackingStopped,
    /// Consumer started watching a subject.
    WatchStarted,
    /// Consumer released a subject.
    WatchStopped,

    // === Sampling events ===
    /// A valid fix was produced (`position`).
    SampleTaken,
    /// Fix acquisition failed (`label`, `reason`); sampling continues.
    SampleFailed,
    /// Fix had out-of-range coordinates and was discarded.
    SampleRejected,
    /// Sample not transmitted: channel not open, queue full, or consumer behind.
    SampleDropped,
    /// Sample handed to an open channel (`position`).
    SampleSent,

    // === Channel events ===
    /// Channel began connecting (`attempt`).
    ChannelConnecting,
    /// Channel reached `Open` (`attempt`).
    ChannelOpened,
    /// Connect attempt failed (`attempt`, `reason`).
    ConnectFailed,
    /// Open channel lost its transport (`reason`).
    ConnectionLost,
    /// Channel closed deliberately.
    ChannelClosed,
    /// Next connect attempt scheduled (`attempt` = previous attempt, `delay_ms`).
    ReconnectScheduled,

    // === Consumer events ===
    /// Inbound position accepted into the latest-position store (`position`).
    PositionUpdated,
    /// Inbound payload discarded (`label`, `reason`).
    MessageDiscarded,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Tracked subject (`"<role>/<id>"`) or subscriber name.
    pub subject: Option<Arc<str>>,
    /// Connect attempt number (starting from 1, per supervisor).
    pub attempt: Option<u32>,
    /// Delay in milliseconds (reconnect wait, or sampling interval).
    pub delay_ms: Option<u32>,
    /// Stable error label (see the `as_label` helpers in [`crate::error`]).
    pub label: Option<&'static str>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Position carried by sampling/consumer events.
    pub position: Option<Position>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            subject: None,
            attempt: None,
            delay_ms: None,
            label: None,
            reason: None,
            position: None,
        }
    }

    /// Attaches a subject.
    #[inline]
    pub fn with_subject(mut self, subject: impl Into<Arc<str>>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Attaches an error label and its message.
    #[inline]
    pub fn with_error(mut self, label: &'static str, reason: impl Into<Arc<str>>) -> Self {
        self.label = Some(label);
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a position.
    #[inline]
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_subject(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_subject(subscriber)
            .with_reason(info)
    }

    /// True for failures that should be shown to the user as advisories.
    #[inline]
    pub fn is_advisory(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SampleFailed | EventKind::ConnectFailed | EventKind::ConnectionLost
        )
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::SampleTaken);
        let b = Event::new(EventKind::SampleTaken);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn huge_durations_saturate() {
        let ev = Event::new(EventKind::ReconnectScheduled).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }

    #[test]
    fn advisory_kinds() {
        assert!(Event::new(EventKind::ConnectionLost).is_advisory());
        assert!(Event::new(EventKind::SampleFailed).is_advisory());
        assert!(!Event::new(EventKind::PositionUpdated).is_advisory());
    }
}
