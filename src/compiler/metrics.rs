//! Per-pass counters.
//!
//! Passes report aggregate numbers (methods changed, instructions removed, bytes emitted)
//! through a shared [`Metrics`] registry. Counters only ever grow; updates from concurrent
//! workers are safe.

use std::collections::BTreeMap;

use dashmap::DashMap;

/// Registry of monotonic counters keyed by pass and counter name.
#[derive(Debug, Default)]
pub struct Metrics {
    counters: DashMap<(String, String), u64>,
}

impl Metrics {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `amount` to the counter `name` of `pass`, creating it at zero if needed.
    pub fn incr(&self, pass: &str, name: &str, amount: u64) {
        let mut counter = self
            .counters
            .entry((pass.to_string(), name.to_string()))
            .or_insert(0);
        *counter = counter.saturating_add(amount);
    }

    /// Returns the current value of a counter; counters never touched read as zero.
    #[must_use]
    pub fn get(&self, pass: &str, name: &str) -> u64 {
        self.counters
            .get(&(pass.to_string(), name.to_string()))
            .map_or(0, |value| *value)
    }

    /// Returns all counters of `pass`, ordered by name.
    #[must_use]
    pub fn for_pass(&self, pass: &str) -> BTreeMap<String, u64> {
        self.counters
            .iter()
            .filter(|entry| entry.key().0 == pass)
            .map(|entry| (entry.key().1.clone(), *entry.value()))
            .collect()
    }

    /// Returns a point-in-time copy of every counter.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<(String, String), u64> {
        self.counters
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_incr_and_get() {
        let metrics = Metrics::new();
        assert_eq!(metrics.get("pass", "count"), 0);
        metrics.incr("pass", "count", 2);
        metrics.incr("pass", "count", 3);
        metrics.incr("other", "count", 1);
        assert_eq!(metrics.get("pass", "count"), 5);
        assert_eq!(metrics.for_pass("pass").len(), 1);
        assert_eq!(metrics.snapshot().len(), 2);
    }

    #[test]
    fn test_concurrent_increments() {
        let metrics = Metrics::new();
        (0..1000).into_par_iter().for_each(|_| metrics.incr("p", "n", 1));
        assert_eq!(metrics.get("p", "n"), 1000);
    }
}
