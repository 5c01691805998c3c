//! Bounded reconnection policy
//!
//! Explicit state machine for the retry protocol: a single owner (the
//! playback controller) records failures and is told whether to schedule
//! another attempt or give up. Keeping the counter here, driven only from
//! the controller task, avoids the re-entrancy ambiguity of incrementing
//! from inside transport callbacks when error and close fire for the same
//! underlying failure.

use std::time::Duration;

/// Maximum consecutive reconnection attempts before giving up
pub const MAX_RETRIES: u32 = 3;

/// Delay between a recorded failure and the next attempt
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// What to do after a recorded failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Schedule another attempt after the delay; `attempt` is 1-based
    RetryAfter { delay: Duration, attempt: u32 },
    /// Retries exhausted: stop playback and surface a terminal failure.
    /// The counter is reset so a fresh user action starts a new cycle.
    GiveUp,
}

/// Reconnection attempt counter and backoff policy
#[derive(Debug)]
pub struct ReconnectPolicy {
    attempts: u32,
    max_retries: u32,
    delay: Duration,
}

impl ReconnectPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self {
            attempts: 0,
            max_retries,
            delay,
        }
    }

    /// Record a consecutive failure and decide the next step
    ///
    /// Failures 1..=max each schedule a retry; the failure after the last
    /// permitted retry gives up and resets the counter.
    pub fn on_failure(&mut self) -> RetryDecision {
        self.attempts += 1;
        if self.attempts > self.max_retries {
            self.attempts = 0;
            RetryDecision::GiveUp
        } else {
            RetryDecision::RetryAfter {
                delay: self.delay,
                attempt: self.attempts,
            }
        }
    }

    /// A session completed setup: the failure streak is over
    pub fn on_established(&mut self) {
        self.attempts = 0;
    }

    /// Explicit user-initiated connect also starts a fresh cycle
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(MAX_RETRIES, RETRY_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retries_up_to_max_then_gives_up() {
        let mut policy = ReconnectPolicy::new(3, Duration::from_secs(2));

        for expected in 1..=3 {
            match policy.on_failure() {
                RetryDecision::RetryAfter { attempt, delay } => {
                    assert_eq!(attempt, expected);
                    assert_eq!(delay, Duration::from_secs(2));
                }
                RetryDecision::GiveUp => panic!("gave up too early at attempt {}", expected),
            }
        }

        assert_eq!(policy.on_failure(), RetryDecision::GiveUp);
        // Counter resets on give-up so the next user action starts fresh
        assert_eq!(policy.attempts(), 0);
    }

    #[test]
    fn test_established_resets_streak() {
        let mut policy = ReconnectPolicy::new(3, Duration::from_secs(2));

        policy.on_failure();
        policy.on_failure();
        policy.on_failure();
        policy.on_established();

        // A failure after a successful reconnect is attempt 1, not 4
        match policy.on_failure() {
            RetryDecision::RetryAfter { attempt, .. } => assert_eq!(attempt, 1),
            RetryDecision::GiveUp => panic!("should retry after an established session"),
        }
    }

    #[test]
    fn test_explicit_reset() {
        let mut policy = ReconnectPolicy::default();
        policy.on_failure();
        policy.reset();
        assert_eq!(policy.attempts(), 0);
    }
}
