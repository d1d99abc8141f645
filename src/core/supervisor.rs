//! # ReconnectSupervisor: keeps one channel alive for a subject.
//!
//! The supervisor owns zero or one live [`TrackingChannel`] for a
//! `(role, subject)` and replaces it whenever it fails to connect or loses
//! its transport, until [`ReconnectSupervisor::stop`] is called.
//!
//! ## Loop
//! ```text
//! loop {
//!   ├─► install fresh channel (attempt += 1)     refused once stopped
//!   ├─► open()
//!   │     ├─► Ok   → failures = 0, wait until Disconnected (ConnectionLost)
//!   │     └─► Err  → failures += 1                  (ConnectFailed)
//!   ├─► retire channel
//!   ├─► delay = reconnect.delay(failures, since_attempt_start)
//!   ├─► publish ReconnectScheduled { attempt, delay_ms }
//!   └─► sleep(delay)                              cancellable
//! }
//! ```
//!
//! ## Rules
//! - Attempt starts are spaced by at least `reconnect.floor`.
//! - Backoff grows with consecutive failed connects and resets after an open.
//! - `stop()` cancels under the channel-slot lock, so no channel is
//!   installed and no attempt starts after it returns.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::time::{self, Instant};
use tokio::select;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::channel::{
    ChannelState, MessageHandler, SessionIdentity, TrackingChannel, Transport, endpoint,
};
use crate::core::TrackingConfig;
use crate::error::ChannelError;
use crate::events::{Bus, Event, EventKind};
use crate::geo::Position;

/// Re-establishes a subject's channel after failures while active.
pub struct ReconnectSupervisor {
    identity: Arc<SessionIdentity>,
    endpoint: Url,
    subject: Arc<str>,
    cfg: TrackingConfig,
    transport: Arc<dyn Transport>,
    on_message: MessageHandler,
    bus: Bus,
    token: CancellationToken,
    current: Mutex<Option<Arc<TrackingChannel>>>,
    attempts: AtomicU32,
    started: AtomicBool,
}

impl ReconnectSupervisor {
    /// Creates an idle supervisor.
    ///
    /// `token` bounds its lifetime: cancelling it has the same effect as
    /// [`stop`](Self::stop). Fails if the relay endpoint cannot be built.
    pub fn new(
        identity: Arc<SessionIdentity>,
        cfg: &TrackingConfig,
        transport: Arc<dyn Transport>,
        on_message: MessageHandler,
        bus: Bus,
        token: CancellationToken,
    ) -> Result<Arc<Self>, ChannelError> {
        let endpoint = endpoint::tracking_url(&cfg.relay, &identity)?;
        let subject = identity.subject().to_string().into();
        Ok(Arc::new(Self {
            identity,
            endpoint,
            subject,
            cfg: cfg.clone(),
            transport,
            on_message,
            bus,
            token,
            current: Mutex::new(None),
            attempts: AtomicU32::new(0),
            started: AtomicBool::new(false),
        }))
    }

    fn current(&self) -> MutexGuard<'_, Option<Arc<TrackingChannel>>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawns the supervision loop. Calling it again has no effect.
    pub fn start(self: &Arc<Self>) {
        if self.token.is_cancelled() || self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        tokio::spawn(Arc::clone(self).run());
    }

    /// Stops reconnecting and closes the current channel. Idempotent.
    pub fn stop(&self) {
        let current = {
            let mut slot = self.current();
            self.token.cancel();
            slot.take()
        };
        if let Some(channel) = current {
            channel.close();
        }
    }

    /// True between `start()` and `stop()`.
    pub fn is_active(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.token.is_cancelled()
    }

    /// State of the current channel (`Disconnected` when there is none).
    pub fn state(&self) -> ChannelState {
        self.current()
            .as_ref()
            .map_or(ChannelState::Disconnected, |c| c.state())
    }

    /// Connect attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Sends through the current channel.
    ///
    /// [`ChannelError::NotOpen`] when no channel is open.
    pub fn send(&self, position: &Position) -> Result<(), ChannelError> {
        match self.current().as_ref() {
            Some(channel) => channel.send(position),
            None => Err(ChannelError::NotOpen {
                state: ChannelState::Disconnected,
            }),
        }
    }

    fn install(&self, attempt: u32) -> Option<Arc<TrackingChannel>> {
        let mut slot = self.current();
        if self.token.is_cancelled() {
            return None;
        }
        let channel = Arc::new(TrackingChannel::with_endpoint(
            Arc::clone(&self.identity),
            self.endpoint.clone(),
            Arc::clone(&self.transport),
            Arc::clone(&self.on_message),
            self.bus.clone(),
            self.cfg.channel_params(attempt),
        ));
        *slot = Some(Arc::clone(&channel));
        Some(channel)
    }

    fn retire(&self, channel: &Arc<TrackingChannel>) {
        {
            let mut slot = self.current();
            if slot.as_ref().is_some_and(|c| Arc::ptr_eq(c, channel)) {
                slot.take();
            }
        }
        channel.close();
    }

    async fn run(self: Arc<Self>) {
        let mut failures: u32 = 0;

        loop {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let started = Instant::now();
            let Some(channel) = self.install(attempt) else {
                break;
            };

            let opened = select! {
                biased;
                _ = self.token.cancelled() => break,
                res = channel.open() => res,
            };
            match opened {
                Ok(()) => {
                    failures = 0;
                    select! {
                        biased;
                        _ = self.token.cancelled() => break,
                        _ = until_disconnected(channel.watch_state()) => {}
                    }
                }
                Err(e) if e.is_retryable() => failures = failures.saturating_add(1),
                Err(_) => break,
            }
            self.retire(&channel);

            if self.token.is_cancelled() {
                break;
            }
            let delay = self.cfg.reconnect.delay(failures, started.elapsed());
            tracing::debug!(
                subject = %self.subject,
                attempt,
                failures,
                delay_ms = delay.as_millis() as u64,
                "reconnect scheduled"
            );
            self.bus.publish(
                Event::new(EventKind::ReconnectScheduled)
                    .with_subject(Arc::clone(&self.subject))
                    .with_attempt(attempt)
                    .with_delay(delay),
            );
            select! {
                biased;
                _ = self.token.cancelled() => break,
                _ = time::sleep(delay) => {}
            }
        }

        // Parent-token cancellation skips `stop()`; close whatever is left.
        let leftover = self.current().take();
        if let Some(channel) = leftover {
            channel.close();
        }
    }
}

async fn until_disconnected(mut state: watch::Receiver<ChannelState>) {
    while *state.borrow_and_update() != ChannelState::Disconnected {
        if state.changed().await.is_err() {
            break;
        }
    }
}
