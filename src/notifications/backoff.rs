//! Reconnect backoff for the push channel.

use std::time::Duration;

const INITIAL_DELAY_SECS: u64 = 1;
const MAX_DELAY_SECS: u64 = 30;

/// Exponential backoff: 1s, 2s, 4s, ... capped at 30s.
///
/// A successful connection resets the sequence, so the next failure waits
/// the initial delay again.
#[derive(Debug)]
pub(crate) struct Backoff {
    current_secs: u64,
}

impl Backoff {
    pub(crate) fn new() -> Self {
        Self {
            current_secs: INITIAL_DELAY_SECS,
        }
    }

    /// The delay to sleep before the next attempt; doubles the stored
    /// delay up to the ceiling.
    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = self.current_secs;
        self.current_secs = (self.current_secs * 2).min(MAX_DELAY_SECS);
        Duration::from_secs(delay)
    }

    pub(crate) fn reset(&mut self) {
        self.current_secs = INITIAL_DELAY_SECS;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_to_ceiling() {
        let mut backoff = Backoff::new();
        let delays: Vec<u64> = (0..8).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30, 30]);
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut backoff = Backoff::new();
        for _ in 0..5 {
            backoff.next_delay();
        }
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
    }
}
