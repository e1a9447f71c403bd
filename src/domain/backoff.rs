//! Capped exponential reconnect backoff.

use std::time::Duration;

use serde::Serialize;
use utoipa::ToSchema;

/// Reconnect delay policy.
///
/// The delay for the `attempt`-th reconnect (1-based) is
/// `min(cap, base * growth^(attempt - 1))`. The sequence is non-decreasing
/// and never exceeds `cap`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct Backoff {
    /// Delay before the first reconnect attempt, in milliseconds.
    pub base_ms: u64,
    /// Multiplier applied per consecutive failure. Values below 1 are
    /// treated as 1.
    pub growth: f64,
    /// Upper bound on any delay, in milliseconds.
    pub cap_ms: u64,
}

impl Backoff {
    /// Creates a policy with the given base, growth factor and cap.
    #[must_use]
    pub const fn new(base_ms: u64, growth: f64, cap_ms: u64) -> Self {
        Self {
            base_ms,
            growth,
            cap_ms,
        }
    }

    /// Returns the delay before reconnect number `attempt`.
    ///
    /// `attempt` 0 is treated like 1.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let cap = self.cap_ms as f64;
        let growth = if self.growth.is_finite() {
            self.growth.max(1.0)
        } else {
            1.0
        };
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let raw = self.base_ms as f64 * growth.powi(exponent);
        let ms = if raw.is_finite() { raw.min(cap) } else { cap };
        Duration::from_millis(ms.max(0.0).round() as u64)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(500, 1.6, 5_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_uses_base() {
        let b = Backoff::default();
        assert_eq!(b.delay(1), Duration::from_millis(500));
        assert_eq!(b.delay(0), Duration::from_millis(500));
    }

    #[test]
    fn grows_by_factor() {
        let b = Backoff::default();
        assert_eq!(b.delay(2), Duration::from_millis(800));
        assert_eq!(b.delay(3), Duration::from_millis(1_280));
        assert_eq!(b.delay(4), Duration::from_millis(2_048));
    }

    #[test]
    fn non_decreasing_and_capped() {
        let b = Backoff::default();
        let mut previous = Duration::ZERO;
        for attempt in 1..200 {
            let d = b.delay(attempt);
            assert!(d >= previous, "attempt {attempt} went down");
            assert!(d <= Duration::from_millis(5_000));
            previous = d;
        }
        assert_eq!(b.delay(u32::MAX), Duration::from_millis(5_000));
    }

    #[test]
    fn shrinking_growth_is_clamped() {
        let b = Backoff::new(1_000, 0.5, 10_000);
        assert_eq!(b.delay(5), Duration::from_millis(1_000));
    }
}
