use crate::error::ProviderError;
use std::time::Duration;

/// Exponential backoff for transient LLM-call failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff,
        }
    }

    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    /// Delay before retrying after the given failed attempt (1-based), or
    /// `None` when the error is permanent or the budget is spent. A
    /// `Retry-After` hint may lengthen the delay but never past `max_backoff`.
    pub fn backoff_for(&self, attempt: u32, error: &ProviderError) -> Option<Duration> {
        if !error.is_transient() || attempt >= self.max_attempts {
            return None;
        }
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self
            .initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff);
        Some(match error.retry_after() {
            Some(hint) if hint > delay => hint.min(self.max_backoff),
            _ => delay,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeout() -> ProviderError {
        ProviderError::Timeout {
            provider: "openai".into(),
        }
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let policy = RetryPolicy::new(5, Duration::from_millis(500), Duration::from_secs(1));
        assert_eq!(policy.backoff_for(1, &timeout()), Some(Duration::from_millis(500)));
        assert_eq!(policy.backoff_for(2, &timeout()), Some(Duration::from_secs(1)));
        assert_eq!(policy.backoff_for(3, &timeout()), Some(Duration::from_secs(1)));
    }

    #[test]
    fn budget_is_exhausted_after_max_attempts() {
        let policy = RetryPolicy::default();
        assert!(policy.backoff_for(2, &timeout()).is_some());
        assert_eq!(policy.backoff_for(3, &timeout()), None);
    }

    #[test]
    fn permanent_errors_are_not_retried() {
        let err = ProviderError::Authentication {
            provider: "openai".into(),
            message: "invalid key".into(),
        };
        assert_eq!(RetryPolicy::default().backoff_for(1, &err), None);
    }

    fn rate_limited(secs: u64) -> ProviderError {
        ProviderError::RateLimited {
            provider: "openai".into(),
            retry_after: Some(Duration::from_secs(secs)),
        }
    }

    #[test]
    fn retry_after_hint_extends_delay() {
        assert_eq!(
            RetryPolicy::default().backoff_for(1, &rate_limited(3)),
            Some(Duration::from_secs(3))
        );
    }

    #[test]
    fn retry_after_hint_is_capped_by_max_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_for(1, &rate_limited(20)), Some(policy.max_backoff));
        assert_eq!(policy.backoff_for(1, &rate_limited(86_400)), Some(Duration::from_secs(8)));
        assert_eq!(RetryPolicy::immediate(3).backoff_for(1, &rate_limited(60)), Some(Duration::ZERO));
    }
}
