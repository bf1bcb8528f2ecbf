use std::time::Duration;

use crate::config::ClientConfig;

/// Bounded linear backoff for re-opening a dropped socket.
///
/// Attempt `n` waits `base * n`. The counter only resets on a successful
/// connection, so a flapping server exhausts the budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    base_delay: Duration,
    max_attempts: u32,
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
            attempts: 0,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.reconnect_base_delay(), config.max_reconnect_attempts)
    }

    /// Claim the next attempt. `None` once the budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        self.attempts += 1;
        Some(self.base_delay.saturating_mul(self.attempts))
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_linearly_then_give_up() {
        let mut policy = ReconnectPolicy::default();

        let delays: Vec<_> = std::iter::from_fn(|| policy.next_delay()).collect();

        assert_eq!(
            delays,
            vec![
                Duration::from_millis(2000),
                Duration::from_millis(4000),
                Duration::from_millis(6000),
            ]
        );
        assert_eq!(policy.attempts(), 3);
        assert_eq!(policy.next_delay(), None);
    }

    #[test]
    fn reset_restores_full_budget() {
        let mut policy = ReconnectPolicy::new(Duration::from_millis(100), 2);
        policy.next_delay();
        policy.next_delay();
        assert_eq!(policy.next_delay(), None);

        policy.reset();
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn zero_attempts_never_retries() {
        let mut policy = ReconnectPolicy::new(Duration::from_secs(1), 0);
        assert_eq!(policy.next_delay(), None);
    }
}
