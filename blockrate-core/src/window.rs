//! Time-bounded window of recent samples.

use crate::sample::Sample;
use std::collections::VecDeque;
use std::time::Duration;

/// Timestamp-ordered window of samples bounded by a retention horizon.
///
/// After every [`push`](Self::push) the window only holds samples no older than
/// `retention` relative to the newest one, and it is never trimmed to empty.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    samples: VecDeque<Sample>,
    retention: Duration,
}

impl SampleWindow {
    /// Creates an empty window with the given retention horizon.
    #[must_use]
    pub fn new(retention: Duration) -> Self {
        Self {
            samples: VecDeque::new(),
            retention,
        }
    }

    /// Retention horizon.
    #[must_use]
    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Appends a sample at the tail and evicts expired samples from the head.
    pub fn push(&mut self, sample: Sample) {
        debug_assert!(
            self.samples
                .back()
                .map_or(true, |tail| tail.timestamp <= sample.timestamp),
            "samples must be pushed in timestamp order"
        );
        self.samples.push_back(sample);
        self.trim();
    }

    /// Drops every sample.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Number of samples currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true when the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Oldest retained sample.
    #[must_use]
    pub fn head(&self) -> Option<&Sample> {
        self.samples.front()
    }

    /// Newest sample.
    #[must_use]
    pub fn tail(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Iterates samples oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Blocks per second between the head and the tail of the window.
    ///
    /// Returns `None` with fewer than two samples or when head and tail share a timestamp.
    #[must_use]
    pub fn rate(&self) -> Option<f64> {
        if self.samples.len() < 2 {
            return None;
        }
        let head = self.samples.front()?;
        let tail = self.samples.back()?;

        let seconds = tail
            .timestamp
            .saturating_duration_since(head.timestamp)
            .as_secs_f64();
        if seconds <= 0.0 {
            return None;
        }

        let blocks = tail.height as f64 - head.height as f64;
        Some(blocks / seconds)
    }

    fn trim(&mut self) {
        let Some(newest) = self.samples.back().map(|s| s.timestamp) else {
            return;
        };
        let Some(expired_before) = newest.checked_sub(self.retention) else {
            return;
        };
        while self.samples.len() > 1 {
            match self.samples.front() {
                Some(head) if head.timestamp < expired_before => {
                    self.samples.pop_front();
                }
                _ => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn at(base: Instant, secs: u64, height: u64) -> Sample {
        Sample::new(height, base + Duration::from_secs(secs))
    }

    #[test]
    fn rate_over_two_samples() {
        let base = Instant::now();
        let mut window = SampleWindow::new(Duration::from_secs(60));
        window.push(at(base, 0, 1000));
        assert_eq!(window.rate(), None);
        window.push(at(base, 10, 1010));
        assert_eq!(window.rate(), Some(1.0));
    }

    #[test]
    fn trims_samples_older_than_retention() {
        let base = Instant::now();
        let mut window = SampleWindow::new(Duration::from_secs(60));
        window.push(at(base, 0, 0));
        window.push(at(base, 30, 30));
        window.push(at(base, 60, 60));
        assert_eq!(window.len(), 3, "a sample exactly at the horizon is kept");

        window.push(at(base, 61, 61));
        assert_eq!(window.len(), 3);
        assert_eq!(window.head().map(|s| s.height), Some(30));
    }

    #[test]
    fn never_trims_to_empty() {
        let base = Instant::now();
        let mut window = SampleWindow::new(Duration::from_secs(60));
        window.push(at(base, 0, 5));
        window.push(at(base, 3_600, 10));
        assert_eq!(window.len(), 1);
        assert_eq!(window.tail().map(|s| s.height), Some(10));
        assert_eq!(window.rate(), None);
    }

    #[test]
    fn duplicate_timestamp_has_no_rate() {
        let base = Instant::now();
        let mut window = SampleWindow::new(Duration::from_secs(60));
        window.push(at(base, 5, 100));
        window.push(at(base, 5, 100));
        assert_eq!(window.len(), 2);
        assert_eq!(window.rate(), None);
    }

    #[test]
    fn clear_empties_window() {
        let base = Instant::now();
        let mut window = SampleWindow::new(Duration::from_secs(60));
        window.push(at(base, 0, 1));
        window.push(at(base, 1, 2));
        window.clear();
        assert!(window.is_empty());
        assert_eq!(window.rate(), None);
    }
}
