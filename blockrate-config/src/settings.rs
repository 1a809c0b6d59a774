//! Configuration sections.

use crate::error::{ConfigError, ConfigResult};
use crate::{DEFAULT_NETWORK_ERROR_THRESHOLD, DEFAULT_POLL_INTERVAL_MS};
use blockrate_client::{RangeQuery, DEFAULT_HISTORY_SECS, DEFAULT_SOURCE_URL, DEFAULT_STEP_SECS};
use blockrate_core::{EstimatorSettings, DEFAULT_MAX_BLOCKS_PER_SECOND, DEFAULT_RETENTION_SECS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;
use url::Url;

/// Complete monitor configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockRateConfig {
    /// Upstream metrics endpoint
    pub source: SourceSection,
    /// Polling schedule and requested history
    pub poll: PollSection,
    /// Rate estimation tunables
    pub estimator: EstimatorSection,
    /// Display thresholds
    pub display: DisplaySection,
    /// Logging output
    pub logging: LoggingSection,
    /// Metrics endpoint
    pub telemetry: TelemetrySection,
}

/// Upstream metrics endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSection {
    /// `query_range` endpoint URL
    pub url: String,
    /// Restrict the height query to nodes running this release
    pub release: Option<String>,
    /// Full PromQL expression; overrides `release`
    pub query: Option<String>,
}

/// Polling schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSection {
    /// Time between polls in milliseconds
    pub interval_ms: u64,
    /// History span requested per poll in seconds
    pub history_secs: u64,
    /// Series resolution in seconds
    pub step_secs: u64,
    /// Per-request timeout in milliseconds; defaults to the poll interval
    pub request_timeout_ms: Option<u64>,
}

/// Rate estimation tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorSection {
    /// Highest plausible block production rate; larger jumps reset the window
    pub max_blocks_per_second: f64,
    /// Window retention horizon in seconds
    pub retention_secs: u64,
}

/// Display thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySection {
    /// Failed polls before "Network error" is shown
    pub network_error_threshold: u32,
}

/// Logging output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (trace, debug, info, warn, error)
    pub level: Option<String>,
    /// Log format (text, compact, json)
    pub format: Option<String>,
    /// Log file path; console only when unset
    pub file_path: Option<String>,
    /// ANSI colors on console output
    pub color: bool,
}

/// Metrics endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySection {
    /// Serve `/metrics` and `/health` on this localhost port
    pub metrics_port: Option<u16>,
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            release: None,
            query: None,
        }
    }
}

impl Default for PollSection {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            history_secs: DEFAULT_HISTORY_SECS,
            step_secs: DEFAULT_STEP_SECS,
            request_timeout_ms: None,
        }
    }
}

impl Default for EstimatorSection {
    fn default() -> Self {
        Self {
            max_blocks_per_second: DEFAULT_MAX_BLOCKS_PER_SECOND,
            retention_secs: DEFAULT_RETENTION_SECS,
        }
    }
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            network_error_threshold: DEFAULT_NETWORK_ERROR_THRESHOLD,
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: None,
            format: None,
            file_path: None,
            color: true,
        }
    }
}

impl BlockRateConfig {
    /// Loads configuration from `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            info!(path = %path.display(), "configuration file not found; using defaults");
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    /// Loads configuration from an existing file.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Renders the configuration as TOML.
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Writes the configuration to `path`.
    pub fn save_to_file(&self, path: &Path) -> ConfigResult<()> {
        let content = self.to_toml_string()?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks every value for consistency.
    pub fn validate(&self) -> ConfigResult<()> {
        self.source_url()?;

        if self.poll.interval_ms == 0 {
            return Err(ConfigError::invalid("poll.interval_ms", "must be greater than 0"));
        }
        if self.poll.step_secs == 0 {
            return Err(ConfigError::invalid("poll.step_secs", "must be greater than 0"));
        }
        if self.poll.history_secs < self.poll.step_secs {
            return Err(ConfigError::invalid(
                "poll.history_secs",
                format!(
                    "history of {}s cannot hold a {}s step",
                    self.poll.history_secs, self.poll.step_secs
                ),
            ));
        }
        if self.poll.request_timeout_ms == Some(0) {
            return Err(ConfigError::invalid(
                "poll.request_timeout_ms",
                "must be greater than 0",
            ));
        }

        let ceiling = self.estimator.max_blocks_per_second;
        if !ceiling.is_finite() || ceiling <= 0.0 {
            return Err(ConfigError::invalid(
                "estimator.max_blocks_per_second",
                format!("must be a positive number, got {ceiling}"),
            ));
        }
        if self.estimator.retention_secs == 0 {
            return Err(ConfigError::invalid(
                "estimator.retention_secs",
                "must be greater than 0",
            ));
        }
        // Two consecutive samples must fit in the window for a rate to exist.
        if self.poll.interval_ms > self.estimator.retention_secs.saturating_mul(1000) {
            return Err(ConfigError::invalid(
                "poll.interval_ms",
                format!(
                    "interval of {}ms exceeds the {}s rate window",
                    self.poll.interval_ms, self.estimator.retention_secs
                ),
            ));
        }

        if self.display.network_error_threshold == 0 {
            return Err(ConfigError::invalid(
                "display.network_error_threshold",
                "must be greater than 0",
            ));
        }

        if let Some(query) = &self.source.query {
            if query.trim().is_empty() {
                return Err(ConfigError::invalid("source.query", "must not be empty"));
            }
        }

        Ok(())
    }

    /// Parsed source URL.
    pub fn source_url(&self) -> ConfigResult<Url> {
        let url = Url::parse(&self.source.url)
            .map_err(|e| ConfigError::invalid("source.url", format!("{}: {e}", self.source.url)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::invalid(
                "source.url",
                format!("unsupported scheme {other:?}"),
            )),
        }
    }

    /// Poll period.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll.interval_ms)
    }

    /// Per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.poll
            .request_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.poll_interval())
    }

    /// Range query issued on every poll.
    #[must_use]
    pub fn range_query(&self) -> RangeQuery {
        let query = match &self.source.query {
            Some(expression) => RangeQuery::with_expression(expression.clone()),
            None => RangeQuery::for_release(self.source.release.as_deref()),
        };
        query
            .history(Duration::from_secs(self.poll.history_secs))
            .step(Duration::from_secs(self.poll.step_secs))
    }

    /// Estimator settings derived from the poll and estimator sections.
    #[must_use]
    pub fn estimator_settings(&self) -> EstimatorSettings {
        EstimatorSettings {
            poll_interval: self.poll_interval(),
            max_blocks_per_second: self.estimator.max_blocks_per_second,
            retention: Duration::from_secs(self.estimator.retention_secs),
        }
    }
}
