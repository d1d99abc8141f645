//! # Tracking configuration.
//!
//! Provides [`RelayConfig`] (where the relay lives) and [`TrackingConfig`]
//! (centralized settings for publishers and subscribers).
//!
//! Config is used in two ways:
//! 1. **Builders**: `PositionPublisher::builder(cfg, ..)`, `PositionSubscriber::builder(cfg, ..)`
//! 2. **Component params**: sampler, channel and supervisor params are derived from it
//!
//! ## Sentinel values
//! - `connect_timeout = 0s` → no handshake deadline
//! - capacities of `0` are clamped to 1

use std::time::Duration;

use url::Url;

use crate::channel::ChannelParams;
use crate::error::ConfigError;
use crate::policies::{MIN_RECONNECT_FLOOR, ReconnectPolicy};
use crate::sampler::SamplerParams;

/// Smallest accepted sampling interval.
pub const MIN_TRACKING_INTERVAL: Duration = Duration::from_secs(1);

/// Location of the relay backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayConfig {
    /// `host[:port]`, without scheme.
    pub host: String,
    /// `wss` when true, `ws` otherwise.
    pub secure: bool,
}

impl RelayConfig {
    /// Creates a relay config.
    pub fn new(host: impl Into<String>, secure: bool) -> Self {
        Self {
            host: host.into(),
            secure,
        }
    }

    /// Derives the relay from a page/API origin such as `https://api.example.com`.
    ///
    /// `https`/`wss` origins select `wss`; `http`/`ws` select `ws`.
    pub fn from_origin(origin: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidOrigin {
            origin: origin.to_string(),
            reason,
        };
        let url = Url::parse(origin).map_err(|e| invalid(e.to_string()))?;
        let secure = match url.scheme() {
            "https" | "wss" => true,
            "http" | "ws" => false,
            other => return Err(invalid(format!("unsupported scheme {other:?}"))),
        };
        let host = url
            .host_str()
            .ok_or_else(|| invalid("no host".to_string()))?;
        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        Ok(Self { host, secure })
    }

    /// URL scheme for the tracking socket.
    #[inline]
    pub fn scheme(&self) -> &'static str {
        if self.secure { "wss" } else { "ws" }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::new("localhost:8000", false)
    }
}

/// Settings shared by publishers and subscribers.
///
/// ## Notes
/// All fields are public. Prefer the helper accessors over checking
/// sentinels (`0`) at call sites.
#[derive(Clone, Debug)]
pub struct TrackingConfig {
    /// Relay location.
    pub relay: RelayConfig,

    /// Default sampling interval for [`PositionPublisher::start_tracking_default`](crate::PositionPublisher::start_tracking_default).
    ///
    /// Must be at least [`MIN_TRACKING_INTERVAL`].
    pub interval: Duration,

    /// Deadline for one location fix.
    pub sample_timeout: Duration,

    /// Oldest cached fix the sampler accepts.
    pub max_sample_age: Duration,

    /// Handshake deadline per connect attempt.
    ///
    /// - `Duration::ZERO` = no deadline
    pub connect_timeout: Duration,

    /// Backoff and debounce floor between connect attempts.
    pub reconnect: ReconnectPolicy,

    /// Capacity of the event bus ring buffer.
    ///
    /// Subscribers lagging by more than this many events skip the oldest.
    pub bus_capacity: usize,

    /// Outbound frames queued per channel before sends saturate.
    pub outbound_capacity: usize,

    /// Samples buffered between sampler and publisher pump.
    pub sample_capacity: usize,

    /// Discard inbound updates captured earlier than the stored one.
    ///
    /// Off by default: the last arrival wins.
    pub reject_stale_updates: bool,
}

impl TrackingConfig {
    /// Config with default settings for `relay`.
    pub fn for_relay(relay: RelayConfig) -> Self {
        Self {
            relay,
            ..Self::default()
        }
    }

    /// Returns the handshake deadline as an `Option`.
    #[inline]
    pub fn connect_deadline(&self) -> Option<Duration> {
        if self.connect_timeout == Duration::ZERO {
            None
        } else {
            Some(self.connect_timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Sampler parameters derived from this config.
    pub fn sampler_params(&self) -> SamplerParams {
        SamplerParams {
            timeout: self.sample_timeout,
            max_age: self.max_sample_age,
            capacity: self.sample_capacity.max(1),
        }
    }

    /// Channel parameters for connect attempt `attempt`.
    pub fn channel_params(&self, attempt: u32) -> ChannelParams {
        ChannelParams {
            connect_timeout: self.connect_deadline(),
            outbound_capacity: self.outbound_capacity.max(1),
            attempt,
        }
    }

    /// Checks values that would make a session misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.relay.host.trim().is_empty() {
            return Err(ConfigError::MissingHost);
        }
        let too_short = |field, min: Duration, got: Duration| {
            (got < min).then_some(ConfigError::TooShort { field, min, got })
        };
        let checks = [
            too_short("interval", MIN_TRACKING_INTERVAL, self.interval),
            too_short("sample_timeout", Duration::from_millis(1), self.sample_timeout),
            too_short("reconnect.floor", MIN_RECONNECT_FLOOR, self.reconnect.floor),
        ];
        match checks.into_iter().flatten().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for TrackingConfig {
    /// Default configuration:
    ///
    /// - `interval = 5s`, `sample_timeout = 10s`, `max_sample_age = 30s`
    /// - `connect_timeout = 10s`
    /// - `reconnect`: floor 1s, backoff 1s ×2 up to 30s, no jitter
    /// - `bus_capacity = 1024`, `outbound_capacity = 32`, `sample_capacity = 16`
    /// - `reject_stale_updates = false`
    fn default() -> Self {
        Self {
            relay: RelayConfig::default(),
            interval: Duration::from_secs(5),
            sample_timeout: Duration::from_secs(10),
            max_sample_age: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            reconnect: ReconnectPolicy::default(),
            bus_capacity: 1024,
            outbound_capacity: 32,
            sample_capacity: 16,
            reject_stale_updates: false,
        }
    }
}
