//! Error types used by the tracking runtime.
//!
//! This module defines the error taxonomy of the crate:
//!
//! - [`SamplerError`]: failures acquiring a location fix.
//! - [`ChannelError`]: failures of a relay channel (connect, loss, send).
//! - [`MessageError`]: inbound payloads that cannot become a position.
//! - [`PositionError`]: coordinates outside the valid range.
//! - [`TransportError`]: raw failures reported by a [`Transport`](crate::Transport).
//! - [`ConfigError`]: invalid [`TrackingConfig`](crate::TrackingConfig) values.
//! - [`TrackingError`]: errors returned by publisher/subscriber operations.
//!
//! Sampler and channel errors are **advisory**: the runtime publishes them as
//! events and keeps going. All types provide `as_label` (stable snake_case for
//! logs/metrics) and `as_message` helpers.

use std::time::Duration;
use thiserror::Error;

use crate::channel::ChannelState;

/// # Errors produced while acquiring a location fix.
///
/// None of these end a sampling stream; the sampler reports them and retries
/// on the next tick.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SamplerError {
    /// The platform refused access to the location capability.
    #[error("location permission denied")]
    PermissionDenied,

    /// No fix could be produced (no signal, stale cached fix, provider error).
    #[error("position unavailable: {reason}")]
    PositionUnavailable {
        /// The underlying reason.
        reason: String,
    },

    /// The fix was not produced within the per-sample timeout.
    #[error("location fix timed out after {timeout:?}")]
    Timeout {
        /// The timeout that was exceeded.
        timeout: Duration,
    },
}

impl SamplerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use trackvisor::SamplerError;
    ///
    /// assert_eq!(SamplerError::PermissionDenied.as_label(), "sampler_permission_denied");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SamplerError::PermissionDenied => "sampler_permission_denied",
            SamplerError::PositionUnavailable { .. } => "sampler_position_unavailable",
            SamplerError::Timeout { .. } => "sampler_timeout",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            SamplerError::PermissionDenied => "permission denied".to_string(),
            SamplerError::PositionUnavailable { reason } => format!("unavailable: {reason}"),
            SamplerError::Timeout { timeout } => format!("timeout: {timeout:?}"),
        }
    }
}

/// # Errors produced by a relay channel.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    /// The transport could not establish a session (refused, timed out, rejected token).
    #[error("connect failed: {reason}")]
    ConnectFailed {
        /// The underlying reason.
        reason: String,
    },

    /// An open session was lost (transport error or remote close).
    #[error("connection lost: {reason}")]
    ConnectionLost {
        /// The underlying reason.
        reason: String,
    },

    /// `send` was called while the channel was not open.
    #[error("channel not open (state: {state:?})")]
    NotOpen {
        /// The state observed at send time.
        state: ChannelState,
    },

    /// The outbound queue was full; the message was dropped.
    #[error("outbound queue saturated; message dropped")]
    Saturated,

    /// The channel was closed deliberately and cannot be reopened.
    #[error("channel closed")]
    Closed,

    /// The relay endpoint could not be built from the configuration.
    #[error("invalid endpoint: {reason}")]
    InvalidEndpoint {
        /// The underlying reason.
        reason: String,
    },
}

impl ChannelError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use trackvisor::ChannelError;
    ///
    /// assert_eq!(ChannelError::Closed.as_label(), "channel_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ChannelError::ConnectFailed { .. } => "channel_connect_failed",
            ChannelError::ConnectionLost { .. } => "channel_connection_lost",
            ChannelError::NotOpen { .. } => "channel_not_open",
            ChannelError::Saturated => "channel_saturated",
            ChannelError::Closed => "channel_closed",
            ChannelError::InvalidEndpoint { .. } => "channel_invalid_endpoint",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ChannelError::ConnectFailed { reason } => format!("connect failed: {reason}"),
            ChannelError::ConnectionLost { reason } => format!("lost: {reason}"),
            ChannelError::NotOpen { state } => format!("not open: {state:?}"),
            ChannelError::Saturated => "saturated".to_string(),
            ChannelError::Closed => "closed".to_string(),
            ChannelError::InvalidEndpoint { reason } => format!("endpoint: {reason}"),
        }
    }

    /// Indicates whether the supervisor should attempt a fresh channel.
    ///
    /// Returns `true` for [`ChannelError::ConnectFailed`] and
    /// [`ChannelError::ConnectionLost`], `false` otherwise.
    ///
    /// # Example
    /// ```
    /// use trackvisor::ChannelError;
    ///
    /// let lost = ChannelError::ConnectionLost { reason: "reset".into() };
    /// assert!(lost.is_retryable());
    /// assert!(!ChannelError::Closed.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ChannelError::ConnectFailed { .. } | ChannelError::ConnectionLost { .. }
        )
    }
}

/// Coordinates outside the valid WGS84 range.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PositionError {
    /// Latitude not in [-90, 90] or longitude not in [-180, 180] (or not finite).
    #[error("coordinates out of range: lat={latitude}, lng={longitude}")]
    OutOfRange {
        /// Offending latitude.
        latitude: f64,
        /// Offending longitude.
        longitude: f64,
    },
}

/// # Inbound payloads that cannot be turned into a position.
///
/// Subscribers discard these silently (they are logged and published as
/// `MessageDiscarded`, never surfaced as a user-facing error).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MessageError {
    /// Not JSON, or required coordinate fields missing/non-numeric.
    #[error("malformed message: {reason}")]
    Malformed {
        /// The decoder's reason.
        reason: String,
    },

    /// A well-formed message with a `type` this crate does not handle.
    #[error("unrecognized message type {kind:?}")]
    UnknownType {
        /// The `type` field as received.
        kind: String,
    },

    /// Decoded coordinates fail the range invariant.
    #[error(transparent)]
    OutOfRange(#[from] PositionError),

    /// Captured earlier than the position already stored for the subject.
    #[error("stale update: captured at {captured_at_ms} ms, stored {stored_at_ms} ms")]
    Stale {
        /// Capture time of the discarded update (epoch ms).
        captured_at_ms: i64,
        /// Capture time of the stored position (epoch ms).
        stored_at_ms: i64,
    },
}

impl MessageError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            MessageError::Malformed { .. } => "message_malformed",
            MessageError::UnknownType { .. } => "message_unknown_type",
            MessageError::OutOfRange(_) => "message_out_of_range",
            MessageError::Stale { .. } => "message_stale",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            MessageError::Malformed { reason } => format!("malformed: {reason}"),
            MessageError::UnknownType { kind } => format!("unknown type: {kind}"),
            MessageError::OutOfRange(e) => e.to_string(),
            MessageError::Stale {
                captured_at_ms,
                stored_at_ms,
            } => format!("stale: {captured_at_ms} < {stored_at_ms}"),
        }
    }
}

/// Raw failure reported by a transport implementation.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("transport: {reason}")]
pub struct TransportError {
    /// The underlying reason.
    pub reason: String,
}

impl TransportError {
    /// Creates a transport error from anything displayable.
    pub fn new(reason: impl std::fmt::Display) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

/// Invalid configuration value.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A duration is below its allowed minimum.
    #[error("{field} must be at least {min:?} (got {got:?})")]
    TooShort {
        /// Field name.
        field: &'static str,
        /// Allowed minimum.
        min: Duration,
        /// Configured value.
        got: Duration,
    },

    /// The relay host is empty.
    #[error("relay host is empty")]
    MissingHost,

    /// The origin could not be parsed into a relay configuration.
    #[error("invalid origin {origin:?}: {reason}")]
    InvalidOrigin {
        /// The origin as given.
        origin: String,
        /// Parser reason.
        reason: String,
    },
}

/// # Errors returned by publisher and subscriber operations.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackingError {
    /// Sampling interval below the 1000 ms minimum.
    #[error("tracking interval must be at least 1s (got {interval:?})")]
    InvalidInterval {
        /// The rejected interval.
        interval: Duration,
    },

    /// Channel setup failed before supervision could start.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Configuration rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl TrackingError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TrackingError::InvalidInterval { .. } => "tracking_invalid_interval",
            TrackingError::Channel(e) => e.as_label(),
            TrackingError::Config(_) => "tracking_invalid_config",
        }
    }
}
