//! # Validated geographic position.
//!
//! A [`Position`] can only be built through [`Position::new`] (or
//! [`Position::at`]), which enforces the WGS84 range invariant:
//! latitude in `[-90, 90]`, longitude in `[-180, 180]`, both finite.
//! Anything that holds a `Position` therefore never holds an out-of-range one.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::PositionError;

/// A single validated location sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    latitude: f64,
    longitude: f64,
    captured_at: SystemTime,
}

impl Position {
    /// Creates a position captured at `captured_at`.
    ///
    /// # Example
    /// ```
    /// use std::time::SystemTime;
    /// use trackvisor::Position;
    ///
    /// assert!(Position::new(12.6392, -8.0029, SystemTime::now()).is_ok());
    /// assert!(Position::new(91.0, 0.0, SystemTime::now()).is_err());
    /// ```
    pub fn new(latitude: f64, longitude: f64, captured_at: SystemTime) -> Result<Self, PositionError> {
        if !in_range(latitude, longitude) {
            return Err(PositionError::OutOfRange {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
            captured_at,
        })
    }

    /// Creates a position captured now.
    pub fn at(latitude: f64, longitude: f64) -> Result<Self, PositionError> {
        Self::new(latitude, longitude, SystemTime::now())
    }

    /// Latitude in degrees.
    #[inline]
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees.
    #[inline]
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Capture timestamp reported by the producer.
    #[inline]
    pub fn captured_at(&self) -> SystemTime {
        self.captured_at
    }

    /// Capture timestamp as milliseconds since the Unix epoch (0 for pre-epoch clocks).
    pub fn captured_at_millis(&self) -> i64 {
        self.captured_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis().min(i64::MAX as u128) as i64)
            .unwrap_or(0)
    }

    /// Returns `(latitude, longitude)`.
    #[inline]
    pub fn coords(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }
}

/// Converts epoch milliseconds back into a `SystemTime` (negative values clamp to the epoch).
pub(crate) fn system_time_from_millis(ms: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(ms.max(0) as u64)
}

/// Range check shared by every constructor.
#[inline]
fn in_range(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_boundaries() {
        assert!(Position::at(90.0, 180.0).is_ok());
        assert!(Position::at(-90.0, -180.0).is_ok());
        assert!(Position::at(0.0, 0.0).is_ok());
    }

    #[test]
    fn rejects_out_of_range_and_non_finite() {
        assert!(Position::at(90.0001, 0.0).is_err());
        assert!(Position::at(0.0, -180.5).is_err());
        assert!(Position::at(f64::NAN, 0.0).is_err());
        assert!(Position::at(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn millis_round_trip() {
        let at = system_time_from_millis(1_700_000_000_123);
        let p = Position::new(1.0, 2.0, at).unwrap();
        assert_eq!(p.captured_at_millis(), 1_700_000_000_123);
    }
}
