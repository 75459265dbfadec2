//! Sliding window of failed PIN verifications.
//!
//! A ring of at most `capacity` timestamps. Only the count relative to
//! `capacity` is ever observed, and the newest `capacity` failures all fall
//! inside the window exactly when the full failure history holds `capacity` or
//! more in-window entries, so dropping older entries is not observable.

use std::{collections::VecDeque, time::Duration};

use serde::{Deserialize, Serialize};

use crate::env::Timestamp;

/// Recent failure timestamps for one lock entry, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptWindow {
    failures: VecDeque<Timestamp>,
}

impl AttemptWindow {
    /// Empty window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop failures that are `window` or older relative to `now`.
    ///
    /// Does not assume entries are ordered; the wall clock may step backwards.
    pub fn prune(&mut self, now: Timestamp, window: Duration) {
        self.failures.retain(|&at| now.saturating_since(at) < window);
    }

    /// Record a failure at `now`, keeping at most `capacity` entries.
    ///
    /// Returns the number of failures held after recording.
    pub fn record(&mut self, now: Timestamp, capacity: usize) -> usize {
        self.failures.push_back(now);
        while self.failures.len() > capacity.max(1) {
            self.failures.pop_front();
        }
        self.failures.len()
    }

    /// Forget every failure.
    pub fn clear(&mut self) {
        self.failures.clear();
    }

    /// Failures currently held.
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// True if no failures are held.
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Held failures, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = Timestamp> + '_ {
        self.failures.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(900);

    fn at(secs: u64) -> Timestamp {
        Timestamp::from_millis(secs * 1_000)
    }

    #[test]
    fn record_caps_at_capacity() {
        let mut window = AttemptWindow::new();
        for i in 0..8 {
            window.record(at(i), 5);
        }

        assert_eq!(window.len(), 5);
        assert_eq!(window.iter().next(), Some(at(3)), "oldest entries are evicted first");
    }

    #[test]
    fn prune_drops_entries_at_window_boundary() {
        let mut window = AttemptWindow::new();
        window.record(at(0), 5);
        window.record(at(100), 5);

        window.prune(at(899), WINDOW);
        assert_eq!(window.len(), 2);

        // exactly WINDOW old is outside the window
        window.prune(at(900), WINDOW);
        assert_eq!(window.len(), 1);
        assert_eq!(window.iter().next(), Some(at(100)));
    }

    #[test]
    fn prune_handles_out_of_order_entries() {
        let mut window = AttemptWindow::new();
        window.record(at(1_000), 5);
        window.record(at(10), 5);

        window.prune(at(1_001), WINDOW);

        assert_eq!(window.iter().collect::<Vec<_>>(), vec![at(1_000)]);
    }

    #[test]
    fn clear_empties_window() {
        let mut window = AttemptWindow::new();
        window.record(at(1), 5);
        window.clear();
        assert!(window.is_empty());
    }
}
