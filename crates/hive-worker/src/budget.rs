use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a timed-out join is handled.
///
/// A join that misses the deadline never abandons its unit: the budget is extended by `extension_ms` and the same unit is waited on again.
/// `max_extensions` bounds how many times that may happen for a single unit; `None` keeps waiting forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JoinPolicy {
    pub extension_ms: u64,
    pub max_extensions: Option<u32>,
}

impl JoinPolicy {
    pub const DEFAULT_EXTENSION_MS: u64 = 10_000;

    #[inline]
    pub fn extension(&self) -> Duration {
        Duration::from_millis(self.extension_ms)
    }

    /// `true` once a unit that already received `extensions` grants must not get another one.
    #[inline]
    pub fn exhausted(&self, extensions: u32) -> bool {
        self.max_extensions.is_some_and(|max| extensions >= max)
    }
}

impl Default for JoinPolicy {
    fn default() -> Self {
        Self {
            extension_ms: Self::DEFAULT_EXTENSION_MS,
            max_extensions: None,
        }
    }
}

/// Remaining wall-clock time a worker may spend waiting on its execution units.
///
/// One budget lives for the whole session and is carried from round to round:
/// every successful join charges the time actually waited, every join timeout grants one fixed extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlineBudget {
    remaining: Duration,
    extension: Duration,
    extensions: u32,
}

impl DeadlineBudget {
    pub fn new(initial: Duration, extension: Duration) -> Self {
        Self {
            remaining: initial,
            extension,
            extensions: 0,
        }
    }

    #[inline]
    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Charge time spent waiting. The budget never goes below zero.
    pub fn consume(&mut self, spent: Duration) {
        self.remaining = self.remaining.saturating_sub(spent);
    }

    /// Grant one backoff increment and return the new remaining budget.
    pub fn extend(&mut self) -> Duration {
        self.remaining = self.remaining.saturating_add(self.extension);
        self.extensions += 1;
        self.remaining
    }

    /// Total number of extensions granted over the budget's lifetime.
    #[inline]
    pub fn extensions(&self) -> u32 {
        self.extensions
    }

    #[inline]
    pub fn extension(&self) -> Duration {
        self.extension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consume_is_monotonic_and_saturates() {
        let mut budget = DeadlineBudget::new(Duration::from_secs(2), Duration::from_secs(10));
        budget.consume(Duration::from_millis(500));
        assert_eq!(budget.remaining(), Duration::from_millis(1500));

        budget.consume(Duration::from_secs(5));
        assert_eq!(budget.remaining(), Duration::ZERO);
        assert_eq!(budget.extensions(), 0);
    }

    #[test]
    fn extend_adds_exactly_one_increment() {
        let mut budget = DeadlineBudget::new(Duration::from_secs(1), Duration::from_secs(10));
        assert_eq!(budget.extend(), Duration::from_secs(11));
        assert_eq!(budget.extend(), Duration::from_secs(21));
        assert_eq!(budget.extensions(), 2);
    }

    #[test]
    fn unbounded_policy_is_never_exhausted() {
        let policy = JoinPolicy::default();
        assert_eq!(policy.extension(), Duration::from_secs(10));
        assert!(!policy.exhausted(u32::MAX));
    }

    #[test]
    fn bounded_policy_stops_at_limit() {
        let policy = JoinPolicy {
            max_extensions: Some(2),
            ..JoinPolicy::default()
        };
        assert!(!policy.exhausted(1));
        assert!(policy.exhausted(2));
    }
}
