//! Relay channels.
//!
//! ## Contents
//! - [`SessionIdentity`], [`Subject`], [`Role`] who a channel streams and how it authenticates
//! - [`ChannelState`] lifecycle of one channel
//! - [`TrackingChannel`] single-use duplex session (connect, send, receive, close)
//! - [`Transport`] / [`Connection`] the duplex seam, with [`MemoryRelay`] and `WsTransport`
//! - [`endpoint`] relay URL construction
//! - [`wire`] JSON frame encoding/decoding

pub mod endpoint;
mod identity;
mod state;
mod tracking;
mod transport;
pub mod wire;

pub use identity::{Role, SessionIdentity, Subject};
pub use state::ChannelState;
pub use tracking::{ChannelParams, MessageHandler, TrackingChannel};
pub use transport::{Connection, MemoryRelay, Transport};
#[cfg(feature = "websocket")]
pub use transport::WsTransport;
