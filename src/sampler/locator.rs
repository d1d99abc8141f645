//! # Location capability seam.
//!
//! [`Locator`] is the injected platform geolocation API (GPS, network
//! location, a simulator, a replay file). The sampler only asks it for one
//! fix at a time; cadence, timeouts and validation live in
//! [`PositionSampler`](crate::PositionSampler).

use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use crate::error::SamplerError;

/// Raw, unvalidated fix as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    /// Degrees north.
    pub latitude: f64,
    /// Degrees east.
    pub longitude: f64,
    /// When the platform acquired the fix.
    pub captured_at: SystemTime,
}

impl Fix {
    /// A fix acquired now.
    pub fn now(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            captured_at: SystemTime::now(),
        }
    }
}

/// Source of location fixes.
///
/// Implementations may return a cached fix no older than `max_age`; the
/// sampler re-checks the age and rejects anything older.
#[async_trait]
pub trait Locator: Send + Sync + 'static {
    /// Returns the current position.
    async fn current_position(&self, max_age: Duration) -> Result<Fix, SamplerError>;
}
