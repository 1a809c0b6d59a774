//! Range query construction.

use std::time::Duration;

/// Default history span requested per poll (ten minutes).
pub const DEFAULT_HISTORY_SECS: u64 = 600;

/// Default resolution of the requested series.
pub const DEFAULT_STEP_SECS: u64 = 60;

const HEIGHT_METRIC: &str = "artifact_pool_consensus_height_stat";

/// Parameters of the block height range query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeQuery {
    expression: String,
    history: Duration,
    step: Duration,
}

impl Default for RangeQuery {
    fn default() -> Self {
        Self::for_release(None)
    }
}

impl RangeQuery {
    /// Query summing the consensus height of every subnet.
    ///
    /// With `release` set, only nodes running that release are considered.
    #[must_use]
    pub fn for_release(release: Option<&str>) -> Self {
        let ic_selector = match release {
            Some(release) => format!("ic=\"{release}\""),
            None => "ic=~\".+\"".to_string(),
        };
        Self::with_expression(format!(
            "sum (avg by (ic_subnet) ({HEIGHT_METRIC}{{{ic_selector},ic_subnet=~\".+\"}}))"
        ))
    }

    /// Query with a custom PromQL expression.
    #[must_use]
    pub fn with_expression(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            history: Duration::from_secs(DEFAULT_HISTORY_SECS),
            step: Duration::from_secs(DEFAULT_STEP_SECS),
        }
    }

    /// Sets the history span requested per poll.
    #[must_use]
    pub fn history(mut self, history: Duration) -> Self {
        self.history = history;
        self
    }

    /// Sets the series resolution.
    #[must_use]
    pub fn step(mut self, step: Duration) -> Self {
        self.step = step;
        self
    }

    /// PromQL expression.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// History span.
    #[must_use]
    pub fn history_span(&self) -> Duration {
        self.history
    }

    /// Series resolution.
    #[must_use]
    pub fn step_size(&self) -> Duration {
        self.step
    }

    /// Query string parameters for a range ending at `now_unix`.
    #[must_use]
    pub fn params(&self, now_unix: i64) -> Vec<(&'static str, String)> {
        let history = i64::try_from(self.history.as_secs()).unwrap_or(i64::MAX);
        let start = now_unix.saturating_sub(history);
        vec![
            ("query", self.expression.clone()),
            ("start", start.to_string()),
            ("end", now_unix.to_string()),
            ("step", self.step.as_secs().max(1).to_string()),
        ]
    }
}
