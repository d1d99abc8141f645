//! # Reconnect policy: debounce floor plus backoff.
//!
//! [`ReconnectPolicy`] decides how long the supervisor waits before building
//! a fresh channel. Two rules combine:
//!
//! ```text
//! wait = max(backoff.next(failures), floor - time_since_attempt_started)
//! ```
//!
//! - `floor` guarantees **at most one attempt per floor period**, even when
//!   a connection drops instantly after opening.
//! - `backoff` grows the wait across consecutive failed connects and resets
//!   after a successful open.

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Minimum spacing allowed for [`ReconnectPolicy::floor`].
pub const MIN_RECONNECT_FLOOR: Duration = Duration::from_millis(100);

/// Timing rules for re-establishing a lost channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReconnectPolicy {
    /// Growth of the wait across consecutive failed connects.
    pub backoff: BackoffPolicy,
    /// Minimum spacing between the starts of two attempts.
    pub floor: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            floor: Duration::from_secs(1),
        }
    }
}

impl ReconnectPolicy {
    /// Returns the wait before the next attempt.
    ///
    /// - `failures`: consecutive failed connects (0 after a session was open)
    /// - `since_start`: time elapsed since the previous attempt started
    pub fn delay(&self, failures: u32, since_start: Duration) -> Duration {
        let debounce = self.floor.saturating_sub(since_start);
        if failures == 0 {
            return debounce;
        }
        self.backoff.next(failures - 1).max(debounce)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::JitterPolicy;

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy {
            backoff: BackoffPolicy {
                first: Duration::from_millis(500),
                max: Duration::from_secs(8),
                factor: 2.0,
                jitter: JitterPolicy::None,
            },
            floor: Duration::from_secs(1),
        }
    }

    #[test]
    fn instant_drop_after_open_waits_for_floor() {
        assert_eq!(policy().delay(0, Duration::from_millis(50)), Duration::from_millis(950));
    }

    #[test]
    fn long_session_reconnects_immediately() {
        assert_eq!(policy().delay(0, Duration::from_secs(60)), Duration::ZERO);
    }

    #[test]
    fn failures_grow_but_never_undercut_floor() {
        let p = policy();
        // backoff(0) = 500ms, floor remainder = 1s
        assert_eq!(p.delay(1, Duration::ZERO), Duration::from_secs(1));
        assert_eq!(p.delay(2, Duration::from_millis(10)), Duration::from_secs(1));
        assert_eq!(p.delay(3, Duration::ZERO), Duration::from_secs(2));
        assert_eq!(p.delay(10, Duration::ZERO), Duration::from_secs(8));
    }
}
