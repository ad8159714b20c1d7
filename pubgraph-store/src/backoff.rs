//! Exponential backoff with jitter for store retries

use std::time::Duration;

/// Exponential backoff schedule with jitter.
///
/// Doubles the delay on every call to [`Backoff::next_delay`], capped at the
/// configured maximum. A quarter of the current delay is added as random
/// jitter so many retrying workers do not hammer the store in lockstep.
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
    next_ms: u64,
}

impl Backoff {
    /// Schedule starting at `base_ms`, capped at `max_ms`.
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            base_ms,
            max_ms,
            next_ms: base_ms,
        }
    }

    /// The next delay to sleep before retrying.
    pub fn next_delay(&mut self) -> Duration {
        let current = self.next_ms.min(self.max_ms);
        self.next_ms = current.saturating_mul(2);
        let jitter = rand::random::<u64>() % (current / 4 + 1);
        Duration::from_millis(current + jitter)
    }

    /// Return to the base delay after a successful request.
    pub fn reset(&mut self) {
        self.next_ms = self.base_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_double_until_capped() {
        let mut backoff = Backoff::new(100, 500);

        assert!(backoff.next_delay().as_millis() >= 100);
        assert!(backoff.next_delay().as_millis() >= 200);
        assert!(backoff.next_delay().as_millis() >= 400);
        for _ in 0..10 {
            let d = backoff.next_delay().as_millis();
            // Capped at max plus max/4 jitter
            assert!((500..=625).contains(&d));
        }
    }

    #[test]
    fn test_reset_returns_to_base() {
        let mut backoff = Backoff::new(100, 10_000);
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();

        assert!(backoff.next_delay().as_millis() < 200);
    }
}
