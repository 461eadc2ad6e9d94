use std::time::Duration;

/// Bounded exponential backoff for retryable gateway failures. A
/// server-provided minimum-wait hint (rate limiting) is respected when it
/// exceeds the computed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            max_attempts: 4,
        }
    }
}

impl RetryPolicy {
    /// Policy with no waiting, for tests and interactive probes.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_attempts,
        }
    }

    /// Delay before the next try after `attempt` failures (0-based), or
    /// `None` once the attempt budget is exhausted.
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Option<Duration> {
        if attempt + 1 >= self.max_attempts {
            return None;
        }
        let exponential = self
            .base_delay
            .saturating_mul(1u32 << attempt.min(16))
            .min(self.max_delay);
        Some(match hint {
            Some(hint) if hint > exponential => hint,
            _ => exponential,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_until_the_cap() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            max_attempts: 5,
        };
        assert_eq!(policy.delay_for(0, None), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_for(1, None), Some(Duration::from_millis(200)));
        assert_eq!(policy.delay_for(2, None), Some(Duration::from_millis(350)));
    }

    #[test]
    fn attempt_budget_is_bounded() {
        let policy = RetryPolicy::immediate(3);
        assert!(policy.delay_for(0, None).is_some());
        assert!(policy.delay_for(1, None).is_some());
        assert_eq!(policy.delay_for(2, None), None);
    }

    #[test]
    fn rate_limit_hint_raises_the_delay() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            max_attempts: 4,
        };
        let hint = Some(Duration::from_secs(2));
        assert_eq!(policy.delay_for(0, hint), Some(Duration::from_secs(2)));
        // A hint below the computed delay does not shorten it.
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_millis(10))),
            Some(Duration::from_millis(200))
        );
    }
}
