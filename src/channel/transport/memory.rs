//! # In-process relay.
//!
//! [`MemoryRelay`] implements [`Transport`] by fanning every frame out to the
//! other connections that share the same endpoint path, which is what the
//! real relay does per `<role>-tracking/<id>/` room. It also exposes fault
//! injection so reconnect behavior can be exercised without a network:
//!
//! - [`MemoryRelay::fail_next_connects`] refuses the next `n` handshakes
//! - [`MemoryRelay::sever_all`] drops every live connection with an error
//! - [`MemoryRelay::inject`] pushes a raw frame into a room
//! - [`MemoryRelay::require_token`] rejects handshakes with any other token
//!
//! ```text
//! producer ──send──► room "/technician-tracking/42/" ──► consumer A
//!                                                     └─► consumer B
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use super::{Connection, Transport};
use crate::error::TransportError;

enum Frame {
    Text(String),
    Sever(String),
}

struct Peer {
    id: u64,
    tx: mpsc::UnboundedSender<Frame>,
}

#[derive(Default)]
struct RelayInner {
    rooms: Mutex<HashMap<String, Vec<Peer>>>,
    required_token: Mutex<Option<String>>,
    next_peer: AtomicU64,
    fail_next: AtomicU32,
    attempts: AtomicU32,
}

impl RelayInner {
    fn rooms(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Peer>>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn leave(&self, room: &str, id: u64) {
        let mut rooms = self.rooms();
        if let Some(peers) = rooms.get_mut(room) {
            peers.retain(|p| p.id != id);
            if peers.is_empty() {
                rooms.remove(room);
            }
        }
    }

    fn broadcast(&self, room: &str, from: Option<u64>, text: &str) -> usize {
        let rooms = self.rooms();
        let Some(peers) = rooms.get(room) else {
            return 0;
        };
        peers
            .iter()
            .filter(|p| Some(p.id) != from)
            .filter(|p| p.tx.send(Frame::Text(text.to_string())).is_ok())
            .count()
    }
}

/// In-process fan-out relay with fault injection.
///
/// Cheap to clone; clones share the same rooms and counters.
#[derive(Clone, Default)]
pub struct MemoryRelay {
    inner: Arc<RelayInner>,
}

impl MemoryRelay {
    /// Creates an empty relay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuses the next `n` connect attempts.
    pub fn fail_next_connects(&self, n: u32) {
        self.inner.fail_next.store(n, Ordering::SeqCst);
    }

    /// Only accepts handshakes whose `token` query parameter equals `token`.
    pub fn require_token(&self, token: impl Into<String>) {
        *self
            .inner
            .required_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    /// Total connect attempts seen, successful or not.
    pub fn connect_attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// Number of live connections across all rooms.
    pub fn connections(&self) -> usize {
        self.inner.rooms().values().map(Vec::len).sum()
    }

    /// Number of live connections in the room for `path` (e.g. `/client-tracking/7/`).
    pub fn connections_in(&self, path: &str) -> usize {
        self.inner.rooms().get(path).map_or(0, Vec::len)
    }

    /// Drops every live connection; each sees a transport error.
    pub fn sever_all(&self, reason: &str) {
        let rooms = std::mem::take(&mut *self.inner.rooms());
        for peer in rooms.into_values().flatten() {
            let _ = peer.tx.send(Frame::Sever(reason.to_string()));
        }
    }

    /// Pushes a raw text frame to every connection in the room for `path`.
    ///
    /// Returns how many connections received it.
    pub fn inject(&self, path: &str, text: &str) -> usize {
        self.inner.broadcast(path, None, text)
    }
}

#[async_trait]
impl Transport for MemoryRelay {
    async fn connect(&self, endpoint: &Url) -> Result<Box<dyn Connection>, TransportError> {
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);

        let refused = self
            .inner
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::new("relay refused connection"));
        }

        let required = self
            .inner
            .required_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(required) = required {
            let presented = endpoint
                .query_pairs()
                .find(|(k, _)| k == "token")
                .map(|(_, v)| v.into_owned());
            if presented.as_deref() != Some(required.as_str()) {
                return Err(TransportError::new("401 unauthorized"));
            }
        }

        let room = endpoint.path().to_string();
        let id = self.inner.next_peer.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .rooms()
            .entry(room.clone())
            .or_default()
            .push(Peer { id, tx });

        Ok(Box::new(MemoryConnection {
            relay: Arc::clone(&self.inner),
            room,
            id,
            rx,
            left: false,
        }))
    }
}

struct MemoryConnection {
    relay: Arc<RelayInner>,
    room: String,
    id: u64,
    rx: mpsc::UnboundedReceiver<Frame>,
    left: bool,
}

impl MemoryConnection {
    fn leave(&mut self) {
        if !self.left {
            self.left = true;
            self.relay.leave(&self.room, self.id);
        }
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        if self.left {
            return Err(TransportError::new("connection closed"));
        }
        self.relay.broadcast(&self.room, Some(self.id), &text);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        match self.rx.recv().await? {
            Frame::Text(text) => Some(Ok(text)),
            Frame::Sever(reason) => {
                self.left = true;
                Some(Err(TransportError::new(reason)))
            }
        }
    }

    async fn close(&mut self) {
        self.leave();
        self.rx.close();
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.leave();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse(&format!("ws://relay.test{path}?token=t")).unwrap()
    }

    #[tokio::test]
    async fn fans_out_within_a_room_only() {
        let relay = MemoryRelay::new();
        let mut producer = relay.connect(&url("/technician-tracking/1/")).await.unwrap();
        let mut viewer = relay.connect(&url("/technician-tracking/1/")).await.unwrap();
        let mut other = relay.connect(&url("/technician-tracking/2/")).await.unwrap();

        producer.send("hello".into()).await.unwrap();
        assert_eq!(viewer.recv().await.unwrap().unwrap(), "hello");

        relay.inject("/technician-tracking/2/", "only-two");
        assert_eq!(other.recv().await.unwrap().unwrap(), "only-two");
    }

    #[tokio::test]
    async fn refuses_then_accepts() {
        let relay = MemoryRelay::new();
        relay.fail_next_connects(2);
        assert!(relay.connect(&url("/client-tracking/1/")).await.is_err());
        assert!(relay.connect(&url("/client-tracking/1/")).await.is_err());
        assert!(relay.connect(&url("/client-tracking/1/")).await.is_ok());
        assert_eq!(relay.connect_attempts(), 3);
    }

    #[tokio::test]
    async fn severed_connections_error_and_leave() {
        let relay = MemoryRelay::new();
        let mut conn = relay.connect(&url("/client-tracking/1/")).await.unwrap();
        assert_eq!(relay.connections(), 1);

        relay.sever_all("tower handoff");
        assert!(matches!(conn.recv().await, Some(Err(_))));
        assert_eq!(relay.connections(), 0);
    }

    #[tokio::test]
    async fn rejects_wrong_token() {
        let relay = MemoryRelay::new();
        relay.require_token("right");
        assert!(relay.connect(&url("/client-tracking/1/")).await.is_err());
        let ok = Url::parse("ws://relay.test/client-tracking/1/?token=right").unwrap();
        assert!(relay.connect(&ok).await.is_ok());
    }

    #[tokio::test]
    async fn dropping_a_connection_leaves_the_room() {
        let relay = MemoryRelay::new();
        let conn = relay.connect(&url("/client-tracking/3/")).await.unwrap();
        assert_eq!(relay.connections_in("/client-tracking/3/"), 1);
        drop(conn);
        assert_eq!(relay.connections_in("/client-tracking/3/"), 0);
    }
}
