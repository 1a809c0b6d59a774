//! # Block Rate Core
//!
//! Domain types and the rate estimation algorithm for the block rate monitor.
//!
//! ## Components
//!
//! - [`Sample`] / [`RawSeries`]: observations of cumulative block height
//! - [`SampleWindow`]: time-bounded, timestamp-ordered window of recent samples
//! - [`RateEstimator`]: glitch detection, window maintenance and rate computation
//!
//! The estimator is a plain owned value. Callers mutate it through `&mut self`, so a single
//! task owns the window and the counters for their whole lifetime.

pub mod estimator;
pub mod sample;
pub mod window;

pub use estimator::{EstimatorSettings, EstimatorState, RateEstimator, RateResult};
pub use sample::{RawSeries, Sample, SeriesPoint};
pub use window::SampleWindow;

/// Default ceiling for plausible block production, in blocks per second.
pub const DEFAULT_MAX_BLOCKS_PER_SECOND: f64 = 50.0;

/// Default retention horizon of the sample window, in seconds.
pub const DEFAULT_RETENTION_SECS: u64 = 60;
