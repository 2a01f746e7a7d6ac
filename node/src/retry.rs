use std::collections::HashMap;

use bap_types::BlockHeight;

/// Consecutive failures per block height. A success clears the height.
#[derive(Debug, Default)]
pub struct RetryTracker {
    failures: HashMap<BlockHeight, u32>,
}

impl RetryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more failure for `height` and return the total.
    pub fn record_failure(&mut self, height: BlockHeight) -> u32 {
        let attempts = self.failures.entry(height).or_insert(0);
        *attempts += 1;
        *attempts
    }

    pub fn attempts(&self, height: BlockHeight) -> u32 {
        self.failures.get(&height).copied().unwrap_or(0)
    }

    /// Forget every height at or below `height`.
    pub fn clear(&mut self, height: BlockHeight) {
        self.failures.retain(|h, _| *h > height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_per_height() {
        let mut retries = RetryTracker::new();
        assert_eq!(retries.record_failure(10), 1);
        assert_eq!(retries.record_failure(10), 2);
        assert_eq!(retries.record_failure(11), 1);
        assert_eq!(retries.attempts(10), 2);
    }

    #[test]
    fn clear_resets_completed_heights() {
        let mut retries = RetryTracker::new();
        retries.record_failure(10);
        retries.record_failure(12);
        retries.clear(11);
        assert_eq!(retries.attempts(10), 0);
        assert_eq!(retries.attempts(12), 1);
        assert_eq!(retries.record_failure(10), 1);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn clear_keeps_only_higher_heights(
                failures in proptest::collection::vec(0u32..50, 0..40),
                cleared in 0u32..50,
            ) {
                let mut retries = RetryTracker::new();
                for h in &failures {
                    retries.record_failure(*h);
                }
                retries.clear(cleared);
                for h in 0..50u32 {
                    let expected = if h > cleared {
                        failures.iter().filter(|f| **f == h).count() as u32
                    } else {
                        0
                    };
                    prop_assert_eq!(retries.attempts(h), expected);
                }
            }
        }
    }
}
