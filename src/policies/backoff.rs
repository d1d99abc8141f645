//! # Backoff between reconnect attempts.
//!
//! [`BackoffPolicy`] controls how the wait grows after consecutive failed
//! connects. The base delay for failure `n` (0-indexed) is
//! `first × factor^n`, clamped to `max`, then jittered. The base derives from
//! the failure count alone, so jitter output never feeds back into later
//! delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use trackvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_secs(1),
//!     max: Duration::from_secs(30),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_secs(1));
//! assert_eq!(backoff.next(3), Duration::from_secs(8));
//! assert_eq!(backoff.next(10), Duration::from_secs(30));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Capped exponential backoff.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failure.
    pub first: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
    /// Multiplicative growth per consecutive failure (`1.0` = constant).
    pub factor: f64,
    /// Randomization applied to the clamped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 1s`, `factor = 2.0`, `max = 30s`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_secs(1),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// A constant delay of `every`, no growth, no jitter.
    pub fn constant(every: Duration) -> Self {
        Self {
            first: every,
            max: every,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Computes the delay after `failures` consecutive failures (0-indexed).
    pub fn next(&self, failures: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = failures.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exp(first_ms: u64, max_ms: u64) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(first_ms),
            max: Duration::from_millis(max_ms),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn grows_exponentially_until_capped() {
        let p = exp(500, 4_000);
        let got: Vec<u128> = (0..6).map(|n| p.next(n).as_millis()).collect();
        assert_eq!(got, vec![500, 1_000, 2_000, 4_000, 4_000, 4_000]);
    }

    #[test]
    fn constant_never_changes() {
        let p = BackoffPolicy::constant(Duration::from_millis(1500));
        for n in 0..20 {
            assert_eq!(p.next(n), Duration::from_millis(1500));
        }
    }

    #[test]
    fn first_above_max_is_clamped() {
        assert_eq!(exp(10_000, 5_000).next(0), Duration::from_millis(5_000));
    }

    #[test]
    fn overflow_clamps_to_max() {
        assert_eq!(exp(100, 10_000).next(u32::MAX), Duration::from_millis(10_000));
    }

    #[test]
    fn jitter_never_exceeds_base() {
        let p = BackoffPolicy {
            jitter: JitterPolicy::Full,
            ..exp(100, 30_000)
        };
        for n in 0..12 {
            let base = (100u64 << n).min(30_000);
            assert!(p.next(n) <= Duration::from_millis(base));
        }
    }
}
