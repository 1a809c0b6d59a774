//! Block height observations.

use std::time::Instant;

/// One accepted block height observation.
///
/// The timestamp is the local instant at which the poll that produced the height completed,
/// not the upstream series timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// Cumulative block height.
    pub height: u64,
    /// Local acceptance time.
    pub timestamp: Instant,
}

impl Sample {
    /// Creates a new sample.
    #[must_use]
    pub const fn new(height: u64, timestamp: Instant) -> Self {
        Self { height, timestamp }
    }
}

/// A single `(unix seconds, value)` point of an upstream time series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    /// Point time in unix seconds.
    pub unix_seconds: f64,
    /// Cumulative block height as reported upstream (may be fractional after aggregation).
    pub value: f64,
}

impl SeriesPoint {
    /// Creates a new series point.
    #[must_use]
    pub const fn new(unix_seconds: f64, value: f64) -> Self {
        Self {
            unix_seconds,
            value,
        }
    }

    /// Block height carried by this point, rounded down.
    #[must_use]
    pub fn height(&self) -> u64 {
        self.value.floor() as u64
    }
}

/// Time series of cumulative block heights, ordered oldest to newest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSeries {
    points: Vec<SeriesPoint>,
}

impl RawSeries {
    /// Wraps already-ordered points.
    #[must_use]
    pub fn new(points: Vec<SeriesPoint>) -> Self {
        Self { points }
    }

    /// An empty series (upstream returned no result set).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// All points, oldest first.
    #[must_use]
    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true when the series holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Height of the newest point that is considered reliable.
    ///
    /// The newest point of the upstream series is frequently revised after the fact, so the
    /// second-to-last point is used. Returns `None` when fewer than two points are available.
    #[must_use]
    pub fn accepted_height(&self) -> Option<u64> {
        let len = self.points.len();
        if len < 2 {
            return None;
        }
        Some(self.points[len - 2].height())
    }
}

impl From<Vec<SeriesPoint>> for RawSeries {
    fn from(points: Vec<SeriesPoint>) -> Self {
        Self::new(points)
    }
}
