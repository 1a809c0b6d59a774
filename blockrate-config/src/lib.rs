//! Block Rate Configuration
//!
//! TOML configuration model for the block rate monitor, with defaults that reproduce the
//! dashboard card's behaviour.

mod error;
mod settings;

pub use error::{ConfigError, ConfigResult};
pub use settings::{
    BlockRateConfig, DisplaySection, EstimatorSection, LoggingSection, PollSection,
    SourceSection, TelemetrySection,
};

/// Poll period of the block rate card
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;

/// Failed polls tolerated before the display switches to the network error state
pub const DEFAULT_NETWORK_ERROR_THRESHOLD: u32 = 6;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "blockrate.toml";
