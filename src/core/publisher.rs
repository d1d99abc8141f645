//! # PositionPublisher: producer side of tracking.
//!
//! Composes a [`PositionSampler`], a [`ReconnectSupervisor`] and a pump that
//! forwards samples to whichever channel is currently open.
//!
//! ## Architecture
//! ```text
//! start_tracking(interval)
//!   ├─► sampler.start(interval) ──► SampleStream
//!   ├─► supervisor.start()           (channel to <role>-tracking/<id>/)
//!   └─► pump: for each sample
//!              supervisor.send(&sample)
//!                 ├─► Ok   → SampleSent
//!                 └─► Err  → SampleDropped  (not open / saturated; never buffered)
//!
//! stop_tracking()
//!   └─► session token cancelled → sampler.stop(), supervisor.stop()
//! ```
//!
//! ## Rules
//! - Interval below 1s is rejected; starting an active session is a no-op.
//! - The pump discards samples once its session is no longer active.
//! - Dropping the publisher stops tracking.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use tokio::select;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::channel::{ChannelState, MessageHandler, SessionIdentity, Transport, endpoint};
use crate::core::{MIN_TRACKING_INTERVAL, ReconnectSupervisor, TrackingConfig};
use crate::error::TrackingError;
use crate::events::{Bus, Event, EventKind};
use crate::sampler::{Locator, PositionSampler, SampleStream};
use crate::subscribers::{Subscribe, SubscriberSet, spawn_listener};

/// Snapshot of the active tracking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingSession {
    /// True while tracking.
    pub is_active: bool,
    /// Sampling interval.
    pub interval: Duration,
}

struct ActiveSession {
    interval: Duration,
    token: CancellationToken,
    supervisor: Arc<ReconnectSupervisor>,
}

/// Producer composition: sampler, supervised channel and pump.
pub struct PositionPublisher {
    cfg: TrackingConfig,
    identity: Arc<SessionIdentity>,
    subject: Arc<str>,
    transport: Arc<dyn Transport>,
    sampler: PositionSampler,
    bus: Bus,
    session: Mutex<Option<ActiveSession>>,
    listener_token: CancellationToken,
    _listener: Option<JoinHandle<()>>,
}

impl PositionPublisher {
    /// Starts building a publisher streaming `identity`'s position.
    pub fn builder(
        cfg: TrackingConfig,
        identity: SessionIdentity,
        locator: Arc<dyn Locator>,
        transport: Arc<dyn Transport>,
    ) -> PublisherBuilder {
        PublisherBuilder {
            cfg,
            identity,
            locator,
            transport,
            subscribers: Vec::new(),
        }
    }

    fn session_slot(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts sampling every `interval` and publishing to the relay.
    ///
    /// No-op when a session is already active. Must be called inside a Tokio
    /// runtime.
    pub fn start_tracking(&self, interval: Duration) -> Result<(), TrackingError> {
        if interval < MIN_TRACKING_INTERVAL {
            return Err(TrackingError::InvalidInterval { interval });
        }
        let mut slot = self.session_slot();
        if slot.is_some() {
            return Ok(());
        }

        let token = CancellationToken::new();
        let subject = Arc::clone(&self.subject);
        let on_message: MessageHandler = Arc::new(move |text: &str| {
            tracing::trace!(subject = %subject, bytes = text.len(), "ignoring inbound frame on producer channel");
        });
        let supervisor = ReconnectSupervisor::new(
            Arc::clone(&self.identity),
            &self.cfg,
            Arc::clone(&self.transport),
            on_message,
            self.bus.clone(),
            token.child_token(),
        )?;

        supervisor.start();
        let samples = self.sampler.start(interval);
        tokio::spawn(pump(
            samples,
            Arc::clone(&supervisor),
            self.bus.clone(),
            Arc::clone(&self.subject),
            token.clone(),
        ));

        tracing::info!(subject = %self.subject, interval_ms = interval.as_millis() as u64, "tracking started");
        self.bus.publish(
            Event::new(EventKind::TrackingStarted)
                .with_subject(Arc::clone(&self.subject))
                .with_delay(interval),
        );
        *slot = Some(ActiveSession {
            interval,
            token,
            supervisor,
        });
        Ok(())
    }

    /// [`start_tracking`](Self::start_tracking) with the configured interval.
    pub fn start_tracking_default(&self) -> Result<(), TrackingError> {
        self.start_tracking(self.cfg.interval)
    }

    /// Stops sampling, the pump and the channel. Idempotent.
    pub fn stop_tracking(&self) {
        let Some(session) = self.session_slot().take() else {
            return;
        };
        session.token.cancel();
        self.sampler.stop();
        session.supervisor.stop();

        tracing::info!(subject = %self.subject, "tracking stopped");
        self.bus.publish(
            Event::new(EventKind::TrackingStopped).with_subject(Arc::clone(&self.subject)),
        );
    }

    /// The active session, if any.
    pub fn session(&self) -> Option<TrackingSession> {
        self.session_slot().as_ref().map(|s| TrackingSession {
            is_active: !s.token.is_cancelled(),
            interval: s.interval,
        })
    }

    /// True while a session is active.
    pub fn is_tracking(&self) -> bool {
        self.session().is_some_and(|s| s.is_active)
    }

    /// State of the session's channel (`Disconnected` when not tracking).
    pub fn state(&self) -> ChannelState {
        self.session_slot()
            .as_ref()
            .map_or(ChannelState::Disconnected, |s| s.supervisor.state())
    }

    /// Connect attempts made by the active session.
    pub fn connect_attempts(&self) -> u32 {
        self.session_slot()
            .as_ref()
            .map_or(0, |s| s.supervisor.attempts())
    }

    /// Receiver of every event this publisher emits.
    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }
}

impl Drop for PositionPublisher {
    fn drop(&mut self) {
        self.stop_tracking();
        self.listener_token.cancel();
    }
}

async fn pump(
    mut samples: SampleStream,
    supervisor: Arc<ReconnectSupervisor>,
    bus: Bus,
    subject: Arc<str>,
    token: CancellationToken,
) {
    loop {
        let position = select! {
            biased;
            _ = token.cancelled() => break,
            next = samples.next() => match next {
                Some(p) => p,
                None => break,
            },
        };
        if token.is_cancelled() {
            break;
        }

        let ev = match supervisor.send(&position) {
            Ok(()) => Event::new(EventKind::SampleSent),
            Err(e) => Event::new(EventKind::SampleDropped).with_error(e.as_label(), e.as_message()),
        };
        bus.publish(ev.with_subject(Arc::clone(&subject)).with_position(position));
    }
}

/// Builder for [`PositionPublisher`].
pub struct PublisherBuilder {
    cfg: TrackingConfig,
    identity: SessionIdentity,
    locator: Arc<dyn Locator>,
    transport: Arc<dyn Transport>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl PublisherBuilder {
    /// Sets event subscribers (advisory callbacks, logging).
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Validates the config and endpoint and builds the publisher.
    ///
    /// With event subscribers this spawns their listener, so it must then run
    /// inside a Tokio runtime.
    pub fn build(self) -> Result<PositionPublisher, TrackingError> {
        self.cfg.validate()?;
        endpoint::tracking_url(&self.cfg.relay, &self.identity)?;

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let listener_token = CancellationToken::new();
        let listener = (!self.subscribers.is_empty()).then(|| {
            let set = SubscriberSet::new(self.subscribers, bus.clone());
            spawn_listener(&bus, set, listener_token.clone())
        });

        let subject: Arc<str> = self.identity.subject().to_string().into();
        let sampler = PositionSampler::new(
            self.locator,
            self.cfg.sampler_params(),
            bus.clone(),
            Arc::clone(&subject),
        );

        Ok(PositionPublisher {
            cfg: self.cfg,
            identity: Arc::new(self.identity),
            subject,
            transport: self.transport,
            sampler,
            bus,
            session: Mutex::new(None),
            listener_token,
            _listener: listener,
        })
    }
}
