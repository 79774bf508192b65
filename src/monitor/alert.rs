/// What the policy decided after a cycle was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertDecision {
    pub consecutive_failures: u32,
    /// Counter is at or above the threshold
    pub escalate: bool,
}

/// Consecutive failing cycle counter with a fixed escalation threshold.
///
/// A failing cycle is one in which any tenant hit a query error or showed
/// divergence. A fully clean cycle resets the counter.
#[derive(Debug, Clone)]
pub struct AlertPolicy {
    threshold: u32,
    consecutive_failures: u32,
}

impl AlertPolicy {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive_failures: 0,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn record_cycle(&mut self, clean: bool) -> AlertDecision {
        if clean {
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        }

        AlertDecision {
            consecutive_failures: self.consecutive_failures,
            escalate: self.consecutive_failures >= self.threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escalates_at_threshold_and_every_cycle_after() {
        let mut policy = AlertPolicy::new(3);

        assert!(!policy.record_cycle(false).escalate);
        assert!(!policy.record_cycle(false).escalate);

        let third = policy.record_cycle(false);
        assert_eq!(third.consecutive_failures, 3);
        assert!(third.escalate);

        let fourth = policy.record_cycle(false);
        assert_eq!(fourth.consecutive_failures, 4);
        assert!(fourth.escalate);
    }

    #[test]
    fn test_clean_cycle_resets_counter() {
        let mut policy = AlertPolicy::new(2);
        for _ in 0..5 {
            policy.record_cycle(false);
        }

        let decision = policy.record_cycle(true);

        assert_eq!(decision.consecutive_failures, 0);
        assert!(!decision.escalate);
        assert_eq!(policy.consecutive_failures(), 0);
    }

    #[test]
    fn test_zero_threshold_is_clamped() {
        let policy = AlertPolicy::new(0);
        assert_eq!(policy.threshold(), 1);
    }
}
