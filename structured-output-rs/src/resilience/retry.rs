//! Bounded attempts with a constant pause between them

use std::fmt;
use std::time::Duration;

use backoff::backoff::{Backoff, Constant};

use crate::config::{ConfigProvider, ConfigProviderExt};
use crate::error::{GenerationError, Result};

/// Attempts made when nothing else is configured
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Pause between invalid attempts when nothing else is configured
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Retry policy configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Must be positive.
    pub max_attempts: u32,

    /// Pause after each invalid attempt that still has a successor
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RetryPolicy {{ max_attempts: {}, backoff: {:?} }}",
            self.max_attempts, self.backoff
        )
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Same policy with a different attempt bound
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Same policy with no pause between attempts
    pub fn without_backoff(mut self) -> Self {
        self.backoff = Duration::ZERO;
        self
    }

    /// Load `max_attempts` and `backoff_ms` from a config provider
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let max_attempts = provider.get_or("max_attempts", DEFAULT_MAX_ATTEMPTS);
        let backoff_ms = provider.get_or("backoff_ms", DEFAULT_BACKOFF.as_millis() as u64);

        let policy = Self::new(max_attempts, Duration::from_millis(backoff_ms));
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(GenerationError::configuration(
                "max_attempts must be a positive integer",
            ));
        }
        Ok(())
    }

    /// Pause schedule for one invocation of the loop
    pub(crate) fn pauses(&self) -> Constant {
        Constant::new(self.backoff)
    }
}

/// Sleep for the next pause in the schedule, if any
pub(crate) async fn pause(schedule: &mut Constant) {
    if let Some(interval) = schedule.next_backoff() {
        if !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfigProvider;

    #[test]
    fn test_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff, Duration::from_secs(1));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_from_provider() {
        let mut provider = MemoryConfigProvider::new();
        provider.set("max_attempts", "5");
        provider.set("backoff_ms", "250");

        let policy = RetryPolicy::from_provider(&provider).unwrap();
        assert_eq!(policy, RetryPolicy::new(5, Duration::from_millis(250)));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut provider = MemoryConfigProvider::new();
        provider.set("max_attempts", "0");
        assert!(RetryPolicy::from_provider(&provider).is_err());
    }

    #[test]
    fn test_constant_schedule() {
        let mut schedule = RetryPolicy::default().pauses();
        assert_eq!(schedule.next_backoff(), Some(Duration::from_secs(1)));
        assert_eq!(schedule.next_backoff(), Some(Duration::from_secs(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_waits_for_interval() {
        let mut schedule = RetryPolicy::new(2, Duration::from_secs(1)).pauses();
        let start = tokio::time::Instant::now();
        pause(&mut schedule).await;
        assert!(start.elapsed() >= Duration::from_secs(1));
    }
}
