//! Retry and cooldown policy
//!
//! The remote catalog rate-limits and hiccups under sustained load. Failed
//! requests back off linearly; repeated failures escalate to a long cooldown,
//! and too many cooldowns in a row trigger a full session reset.

use std::time::Duration;

use crate::config::RetryConfig;

/// Attempts that back off briefly before cooldowns kick in
const SHORT_BACKOFF_ATTEMPTS: u32 = 2;

/// Gateway timeout always forces a cooldown
const GATEWAY_TIMEOUT: u16 = 504;

/// Runtime retry policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Failed attempts allowed per request before giving up
    pub max_retries: u32,
    /// Base unit for short backoffs
    pub short_backoff: Duration,
    /// Long cooldown after repeated failures
    pub cooldown: Duration,
    /// Consecutive cooldowns tolerated before the session is reset
    pub cooldown_threshold: u32,
    /// Retries of a search page whose "next" link vanished before the last page
    pub max_page_anomaly_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            short_backoff: Duration::from_millis(config.short_backoff_ms),
            cooldown: Duration::from_secs(config.cooldown_secs),
            cooldown_threshold: config.cooldown_threshold,
            max_page_anomaly_retries: config.max_page_anomaly_retries,
        }
    }

    /// Policy with every wait set to zero
    pub fn immediate() -> Self {
        Self {
            short_backoff: Duration::ZERO,
            cooldown: Duration::ZERO,
            ..Self::default()
        }
    }

    /// How to wait after the `attempt`-th consecutive failure (1-based)
    pub fn backoff(&self, failure: &Failure, attempt: u32) -> Backoff {
        match failure {
            Failure::Status(GATEWAY_TIMEOUT) => Backoff::Cooldown,
            _ if attempt > SHORT_BACKOFF_ATTEMPTS => Backoff::Cooldown,
            Failure::Connection => Backoff::Wait(self.short_backoff),
            Failure::Status(_) => Backoff::Wait(self.short_backoff * attempt),
        }
    }
}

/// Why a request failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Timeout, refused connection, or other transport-level error
    Connection,
    /// Non-success HTTP status
    Status(u16),
}

/// Wait decision after a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Wait(Duration),
    Cooldown,
}

/// Escalating cooldown counter, owned by one crawl
#[derive(Debug, Clone, Default)]
pub struct CooldownState {
    /// Cooldowns since the last session reset
    consecutive: u32,
    /// Cooldowns over the crawl lifetime
    total: u64,
    /// Session resets over the crawl lifetime
    resets: u64,
}

impl CooldownState {
    /// Register one cooldown. Returns true when the session must be reset,
    /// in which case the counter starts over.
    pub fn escalate(&mut self, threshold: u32) -> bool {
        self.consecutive += 1;
        self.total += 1;
        if self.consecutive > threshold {
            self.consecutive = 0;
            self.resets += 1;
            true
        } else {
            false
        }
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn resets(&self) -> u64 {
        self.resets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 10,
            short_backoff: Duration::from_secs(1),
            cooldown: Duration::from_secs(60),
            cooldown_threshold: 5,
            max_page_anomaly_retries: 10,
        }
    }

    #[test]
    fn test_connection_backoff_escalates_after_two_attempts() {
        let p = policy();
        assert_eq!(p.backoff(&Failure::Connection, 1), Backoff::Wait(Duration::from_secs(1)));
        assert_eq!(p.backoff(&Failure::Connection, 2), Backoff::Wait(Duration::from_secs(1)));
        assert_eq!(p.backoff(&Failure::Connection, 3), Backoff::Cooldown);
    }

    #[test]
    fn test_status_backoff_is_linear() {
        let p = policy();
        assert_eq!(p.backoff(&Failure::Status(500), 1), Backoff::Wait(Duration::from_secs(1)));
        assert_eq!(p.backoff(&Failure::Status(503), 2), Backoff::Wait(Duration::from_secs(2)));
        assert_eq!(p.backoff(&Failure::Status(500), 3), Backoff::Cooldown);
    }

    #[test]
    fn test_gateway_timeout_always_cools_down() {
        let p = policy();
        assert_eq!(p.backoff(&Failure::Status(504), 1), Backoff::Cooldown);
    }

    #[test]
    fn test_session_reset_after_threshold() {
        let mut state = CooldownState::default();
        for _ in 0..5 {
            assert!(!state.escalate(5));
        }
        assert!(state.escalate(5));
        assert_eq!(state.consecutive(), 0);
        assert_eq!(state.resets(), 1);
        assert_eq!(state.total(), 6);
        assert!(!state.escalate(5));
        assert_eq!(state.consecutive(), 1);
    }
}
