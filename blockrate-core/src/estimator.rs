//! Windowed block rate estimation with glitch detection.

use crate::sample::Sample;
use crate::window::SampleWindow;
use crate::{DEFAULT_MAX_BLOCKS_PER_SECOND, DEFAULT_RETENTION_SECS};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Tunables of the estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorSettings {
    /// Expected time between two updates.
    pub poll_interval: Duration,
    /// Highest block production rate considered plausible.
    pub max_blocks_per_second: f64,
    /// Horizon of the sample window.
    pub retention: Duration,
}

impl EstimatorSettings {
    /// Settings for the given poll interval with default ceiling and retention.
    #[must_use]
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            max_blocks_per_second: DEFAULT_MAX_BLOCKS_PER_SECOND,
            retention: Duration::from_secs(DEFAULT_RETENTION_SECS),
        }
    }

    /// Largest height increase accepted between two consecutive updates.
    #[must_use]
    pub fn max_height_delta(&self) -> u64 {
        let delta = self.poll_interval.as_secs_f64() * self.max_blocks_per_second;
        if delta.is_finite() && delta > 0.0 {
            delta.floor() as u64
        } else {
            0
        }
    }
}

/// Counters that survive window resets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EstimatorState {
    /// Most recently accepted height; only used for glitch detection.
    pub last_height: u64,
    /// Failed polls since the last successful one.
    pub error_count: u32,
}

/// Outcome of a single [`RateEstimator::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateResult {
    /// Blocks per second over the current window.
    Rate(f64),
    /// The window does not span enough samples or time yet.
    InsufficientData,
    /// A glitch was detected and the window was restarted; no rate must be shown.
    Resetting,
}

impl RateResult {
    /// Numeric rate, if any.
    #[must_use]
    pub fn rate(&self) -> Option<f64> {
        match self {
            RateResult::Rate(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns true when this update restarted the window.
    #[must_use]
    pub fn is_resetting(&self) -> bool {
        matches!(self, RateResult::Resetting)
    }
}

impl fmt::Display for RateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateResult::Rate(value) => write!(f, "{value:.3} bps"),
            RateResult::InsufficientData => write!(f, "insufficient data"),
            RateResult::Resetting => write!(f, "resetting"),
        }
    }
}

/// Block production rate estimator.
///
/// Owns the sample window and the [`EstimatorState`]. Every update runs glitch detection,
/// appends the sample, trims the window and computes the rate; when the update was a glitch
/// the computed value is still produced for logging but reported as [`RateResult::Resetting`].
#[derive(Debug, Clone)]
pub struct RateEstimator {
    settings: EstimatorSettings,
    window: SampleWindow,
    state: EstimatorState,
    last_raw_rate: Option<f64>,
}

impl RateEstimator {
    /// Creates an estimator with an empty window and zeroed state.
    #[must_use]
    pub fn new(settings: EstimatorSettings) -> Self {
        Self {
            window: SampleWindow::new(settings.retention),
            settings,
            state: EstimatorState::default(),
            last_raw_rate: None,
        }
    }

    /// Estimator settings.
    #[must_use]
    pub fn settings(&self) -> &EstimatorSettings {
        &self.settings
    }

    /// Current sample window.
    #[must_use]
    pub fn window(&self) -> &SampleWindow {
        &self.window
    }

    /// Current counters.
    #[must_use]
    pub fn state(&self) -> EstimatorState {
        self.state
    }

    /// Failed polls since the last successful one.
    #[must_use]
    pub fn error_count(&self) -> u32 {
        self.state.error_count
    }

    /// Rate computed by the last update, including values discarded because of a reset.
    #[must_use]
    pub fn last_raw_rate(&self) -> Option<f64> {
        self.last_raw_rate
    }

    /// Records a failed poll. The window is left untouched.
    pub fn record_failure(&mut self) -> u32 {
        self.state.error_count = self.state.error_count.saturating_add(1);
        self.state.error_count
    }

    /// Returns true when `height` is implausible relative to the last accepted height.
    #[must_use]
    pub fn is_glitch(&self, height: u64) -> bool {
        let last = self.state.last_height;
        height < last || height > last.saturating_add(self.settings.max_height_delta())
    }

    /// Feeds one accepted sample. A sample always counts as a successful poll, so the error
    /// counter is cleared even when the sample turns out to be a glitch.
    pub fn update(&mut self, sample: Sample) -> RateResult {
        let resetting = self.is_glitch(sample.height);
        if resetting {
            info!(
                previous_height = self.state.last_height,
                height = sample.height,
                max_delta = self.settings.max_height_delta(),
                discarded = self.window.len(),
                "implausible block height; restarting rate window"
            );
            self.window.clear();
        }
        self.state.last_height = sample.height;
        self.state.error_count = 0;

        self.window.push(sample);

        let computed = self.compute();
        self.last_raw_rate = computed.rate();

        if resetting {
            debug!(raw = ?self.last_raw_rate, "discarding rate computed during reset");
            return RateResult::Resetting;
        }
        computed
    }

    fn compute(&self) -> RateResult {
        match self.window.rate() {
            Some(rate) if rate < 0.0 => {
                warn!(rate, samples = self.window.len(), "negative block rate ignored");
                RateResult::InsufficientData
            }
            Some(rate) if rate.is_finite() => RateResult::Rate(rate),
            _ => RateResult::InsufficientData,
        }
    }
}
