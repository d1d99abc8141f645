//! # Duplex transport abstraction.
//!
//! A [`Transport`] opens [`Connection`]s to a relay URL. The channel state
//! machine only ever talks to these traits, so the same code drives a real
//! WebSocket ([`WsTransport`], feature `websocket`) or the in-process
//! [`MemoryRelay`] used by tests and demos.
//!
//! ## Contract
//! - `connect` performs the whole handshake (token travels in the URL).
//! - `recv` yields text frames; `None` means the remote closed cleanly.
//! - `recv` **must be cancel-safe**: the channel driver drops it whenever an
//!   outbound frame or a close request wins the race.
//! - `close` is best-effort and must not fail.

mod memory;
#[cfg(feature = "websocket")]
mod ws;

use async_trait::async_trait;
use url::Url;

use crate::error::TransportError;

pub use memory::MemoryRelay;
#[cfg(feature = "websocket")]
pub use ws::WsTransport;

/// Factory for relay connections.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Connects and completes the handshake.
    async fn connect(&self, endpoint: &Url) -> Result<Box<dyn Connection>, TransportError>;
}

/// One established duplex session.
#[async_trait]
pub trait Connection: Send + 'static {
    /// Sends one text frame.
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Receives the next text frame; `None` on clean remote close. Cancel-safe.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    /// Closes the session.
    async fn close(&mut self);
}
