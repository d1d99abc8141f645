//! # TrackingChannel: one duplex session to the relay.
//!
//! A channel is single-use: it is opened at most once successfully, may lose
//! its transport, and is closed terminally by [`TrackingChannel::close`].
//! Re-establishing a lost session is the job of the
//! [`ReconnectSupervisor`](crate::ReconnectSupervisor), which builds a fresh
//! channel per attempt.
//!
//! ## Architecture
//! ```text
//! send(&Position) ──try_send──► [outbound queue] ──┐
//!                                                  ▼
//!                                      driver task (one per open session)
//!                                        select! {
//!                                          closed     → conn.close()
//!                                          outbound   → conn.send(frame)
//!                                          conn.recv  → on_message(text)
//!                                        }
//!                                                  │ error / remote close
//!                                                  ▼
//!                                     Open → Disconnected + ConnectionLost
//! ```
//!
//! ## Rules
//! - State transitions go through one `watch` cell; every transition is a
//!   compare-and-set so `close()` always wins a race against `open()`.
//! - `send` never blocks: a full queue drops the frame with
//!   [`ChannelError::Saturated`].
//! - A connection that completes after `close()` is closed and discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::channel::transport::{Connection, Transport};
use crate::channel::{ChannelState, SessionIdentity, endpoint, wire};
use crate::core::RelayConfig;
use crate::error::{ChannelError, TransportError};
use crate::events::{Bus, Event, EventKind};
use crate::geo::Position;

/// Inbound text handler, invoked on the driver task for every received frame.
pub type MessageHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Per-channel tuning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChannelParams {
    /// Handshake deadline (`None` = wait forever).
    pub connect_timeout: Option<Duration>,
    /// Outbound queue size (clamped to at least 1).
    pub outbound_capacity: usize,
    /// Attempt number stamped on this channel's events.
    pub attempt: u32,
}

impl Default for ChannelParams {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(10)),
            outbound_capacity: 32,
            attempt: 1,
        }
    }
}

struct Inner {
    identity: Arc<SessionIdentity>,
    endpoint: Url,
    subject: Arc<str>,
    transport: Arc<dyn Transport>,
    on_message: MessageHandler,
    params: ChannelParams,
    bus: Bus,
    state: watch::Sender<ChannelState>,
    outbound: Mutex<Option<mpsc::Sender<String>>>,
    closed: CancellationToken,
    terminal: AtomicBool,
}

impl Inner {
    fn outbound(&self) -> MutexGuard<'_, Option<mpsc::Sender<String>>> {
        self.outbound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind).with_subject(Arc::clone(&self.subject))
    }

    /// Compare-and-set on the state cell; true when the transition happened.
    fn transition(&self, from: ChannelState, to: ChannelState) -> bool {
        self.state.send_if_modified(|s| {
            if *s == from {
                *s = to;
                true
            } else {
                false
            }
        })
    }
}

/// One bidirectional relay session for a single subject.
///
/// Dropping the handle closes the channel.
pub struct TrackingChannel {
    inner: Arc<Inner>,
}

impl TrackingChannel {
    /// Creates a channel for `identity` on `relay` with default parameters.
    ///
    /// Fails with [`ChannelError::InvalidEndpoint`] if the relay host cannot
    /// form a valid URL.
    pub fn new(
        identity: Arc<SessionIdentity>,
        relay: &RelayConfig,
        transport: Arc<dyn Transport>,
        on_message: MessageHandler,
        bus: Bus,
    ) -> Result<Self, ChannelError> {
        let endpoint = endpoint::tracking_url(relay, &identity)?;
        Ok(Self::with_endpoint(
            identity,
            endpoint,
            transport,
            on_message,
            bus,
            ChannelParams::default(),
        ))
    }

    /// Creates a channel for a prebuilt endpoint.
    pub fn with_endpoint(
        identity: Arc<SessionIdentity>,
        endpoint: Url,
        transport: Arc<dyn Transport>,
        on_message: MessageHandler,
        bus: Bus,
        params: ChannelParams,
    ) -> Self {
        let subject: Arc<str> = identity.subject().to_string().into();
        let (state, _) = watch::channel(ChannelState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                identity,
                endpoint,
                subject,
                transport,
                on_message,
                params,
                bus,
                state,
                outbound: Mutex::new(None),
                closed: CancellationToken::new(),
                terminal: AtomicBool::new(false),
            }),
        }
    }

    /// Current state.
    pub fn state(&self) -> ChannelState {
        *self.inner.state.borrow()
    }

    /// Receiver that observes every state transition.
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.state.subscribe()
    }

    /// The identity this channel authenticates with.
    pub fn identity(&self) -> &SessionIdentity {
        &self.inner.identity
    }

    /// True once `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.terminal.load(Ordering::SeqCst)
    }

    /// Connects to the relay.
    ///
    /// - `Ok(())` when the channel is `Open` (or already connecting/open).
    /// - [`ChannelError::ConnectFailed`] on refusal or timeout; state returns
    ///   to `Disconnected`.
    /// - [`ChannelError::Closed`] after `close()`, including a close that
    ///   lands while the handshake is in flight.
    pub async fn open(&self) -> Result<(), ChannelError> {
        let inner = &self.inner;
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        if !inner.transition(ChannelState::Disconnected, ChannelState::Connecting) {
            return Ok(());
        }
        let attempt = inner.params.attempt;
        inner
            .bus
            .publish(inner.event(EventKind::ChannelConnecting).with_attempt(attempt));

        let connect = async {
            let fut = inner.transport.connect(&inner.endpoint);
            match inner.params.connect_timeout {
                Some(limit) => time::timeout(limit, fut).await.unwrap_or_else(|_| {
                    Err(TransportError::new(format!("handshake timed out after {limit:?}")))
                }),
                None => fut.await,
            }
        };
        let result = select! {
            biased;
            _ = inner.closed.cancelled() => {
                inner.state.send_replace(ChannelState::Disconnected);
                return Err(ChannelError::Closed);
            }
            res = connect => res,
        };

        let mut conn = match result {
            Ok(conn) => conn,
            Err(e) => {
                inner.transition(ChannelState::Connecting, ChannelState::Disconnected);
                let err = ChannelError::ConnectFailed { reason: e.reason };
                tracing::debug!(subject = %inner.subject, attempt, error = %err, "relay connect failed");
                inner.bus.publish(
                    inner
                        .event(EventKind::ConnectFailed)
                        .with_attempt(attempt)
                        .with_error(err.as_label(), err.as_message()),
                );
                return Err(err);
            }
        };

        let (tx, rx) = mpsc::channel(inner.params.outbound_capacity.max(1));
        *inner.outbound() = Some(tx);
        if !inner.transition(ChannelState::Connecting, ChannelState::Open) {
            inner.outbound().take();
            conn.close().await;
            return Err(ChannelError::Closed);
        }

        tracing::debug!(subject = %inner.subject, attempt, "relay channel open");
        inner
            .bus
            .publish(inner.event(EventKind::ChannelOpened).with_attempt(attempt));
        tokio::spawn(drive(Arc::clone(inner), conn, rx));
        Ok(())
    }

    /// Enqueues `position` for transmission.
    ///
    /// Fire-and-forget: `Ok` means the frame was queued, not delivered.
    pub fn send(&self, position: &Position) -> Result<(), ChannelError> {
        let state = self.state();
        if !state.is_open() {
            return Err(ChannelError::NotOpen { state });
        }
        let outbound = self.inner.outbound();
        let Some(tx) = outbound.as_ref() else {
            return Err(ChannelError::NotOpen {
                state: self.state(),
            });
        };
        tx.try_send(wire::encode(position)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ChannelError::Saturated,
            mpsc::error::TrySendError::Closed(_) => ChannelError::NotOpen {
                state: ChannelState::Disconnected,
            },
        })
    }

    /// Closes the channel. Synchronous, idempotent and terminal.
    pub fn close(&self) {
        let inner = &self.inner;
        if inner.terminal.swap(true, Ordering::SeqCst) {
            return;
        }
        let prev = inner.state.send_replace(ChannelState::Closing);
        inner.closed.cancel();
        inner.outbound().take();
        inner.state.send_replace(ChannelState::Disconnected);

        if prev != ChannelState::Disconnected {
            tracing::debug!(subject = %inner.subject, "relay channel closed");
            inner.bus.publish(inner.event(EventKind::ChannelClosed));
        }
    }
}

impl Drop for TrackingChannel {
    fn drop(&mut self) {
        self.close();
    }
}

async fn drive(
    inner: Arc<Inner>,
    mut conn: Box<dyn Connection>,
    mut outbound: mpsc::Receiver<String>,
) {
    let lost = loop {
        select! {
            biased;
            _ = inner.closed.cancelled() => {
                conn.close().await;
                break None;
            }
            msg = outbound.recv() => match msg {
                Some(text) => {
                    if let Err(e) = conn.send(text).await {
                        break Some(e.reason);
                    }
                }
                None => {
                    conn.close().await;
                    break None;
                }
            },
            frame = conn.recv() => match frame {
                Some(Ok(text)) => (inner.on_message)(&text),
                Some(Err(e)) => break Some(e.reason),
                None => break Some("closed by relay".to_string()),
            },
        }
    };

    let Some(reason) = lost else {
        return;
    };
    inner.outbound().take();
    if inner.transition(ChannelState::Open, ChannelState::Disconnected) {
        let err = ChannelError::ConnectionLost { reason };
        tracing::warn!(subject = %inner.subject, error = %err, "relay connection lost");
        inner.bus.publish(
            inner
                .event(EventKind::ConnectionLost)
                .with_error(err.as_label(), err.as_message()),
        );
    }
}
