//! # LogWriter: events to `tracing`
//!
//! A subscriber that writes every [`Event`] as a structured `tracing` record.
//! Advisory failures log at `warn`, lifecycle progress at `info`, per-sample
//! chatter at `debug`/`trace`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO  trackvisor: channel opened subject="technician/42" attempt=1
//! WARN  trackvisor: connection lost subject="technician/42" reason="reset by peer"
//! INFO  trackvisor: reconnect scheduled subject="technician/42" delay_ms=1000 attempt=1
//! WARN  trackvisor: sample failed subject="technician/42" label="sampler_timeout"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let subject = e.subject.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::TrackingStarted => {
                tracing::info!(subject, interval_ms = e.delay_ms, "tracking started");
            }
            EventKind::TrackingStopped => tracing::info!(subject, "tracking stopped"),
            EventKind::WatchStarted => tracing::info!(subject, "watch started"),
            EventKind::WatchStopped => tracing::info!(subject, "watch stopped"),
            EventKind::SampleTaken => {
                let (lat, lng) = e.position.map(|p| p.coords()).unzip();
                tracing::trace!(subject, lat, lng, "sample taken");
            }
            EventKind::SampleSent => tracing::trace!(subject, "sample sent"),
            EventKind::SampleFailed => {
                tracing::warn!(subject, label = e.label, reason, "sample failed");
            }
            EventKind::SampleRejected => {
                tracing::warn!(subject, reason, "sample rejected: coordinates out of range");
            }
            EventKind::SampleDropped => tracing::debug!(subject, reason, "sample dropped"),
            EventKind::ChannelConnecting => {
                tracing::debug!(subject, attempt = e.attempt, "channel connecting");
            }
            EventKind::ChannelOpened => {
                tracing::info!(subject, attempt = e.attempt, "channel opened");
            }
            EventKind::ConnectFailed => {
                tracing::warn!(subject, attempt = e.attempt, reason, "connect failed");
            }
            EventKind::ConnectionLost => tracing::warn!(subject, reason, "connection lost"),
            EventKind::ChannelClosed => tracing::debug!(subject, "channel closed"),
            EventKind::ReconnectScheduled => {
                tracing::info!(
                    subject,
                    delay_ms = e.delay_ms,
                    attempt = e.attempt,
                    "reconnect scheduled"
                );
            }
            EventKind::PositionUpdated => tracing::trace!(subject, "position updated"),
            EventKind::MessageDiscarded => {
                tracing::debug!(subject, label = e.label, reason, "inbound message discarded");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(subscriber = subject, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(subscriber = subject, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
