//! # Channel state.
//!
//! ```text
//!                open()                 transport ok
//! Disconnected ─────────► Connecting ─────────────────► Open ──┐ inbound
//!      ▲  ▲                   │                          │ ◄───┘ message
//!      │  └── ConnectFailed ──┘                          │
//!      └─────────────────── ConnectionLost ──────────────┘
//!
//! Connecting | Open ── close() ──► Closing ──► Disconnected (terminal)
//! ```

/// Lifecycle state of one [`TrackingChannel`](crate::TrackingChannel).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ChannelState {
    /// No session. Initial state, and re-entered after a failure or loss.
    #[default]
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Session established; sends are accepted.
    Open,
    /// `close()` in progress.
    Closing,
}

impl ChannelState {
    /// True when sends are accepted.
    #[inline]
    pub fn is_open(&self) -> bool {
        matches!(self, ChannelState::Open)
    }
}
