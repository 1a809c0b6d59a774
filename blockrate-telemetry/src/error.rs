//! Telemetry error types

use thiserror::Error;

/// Telemetry-related errors
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to initialize logging
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// Failed to run the metrics server
    #[error("Metrics server error: {0}")]
    MetricsServer(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<hyper::Error> for TelemetryError {
    fn from(e: hyper::Error) -> Self {
        TelemetryError::MetricsServer(e.to_string())
    }
}

/// Result type for telemetry operations
pub type TelemetryResult<T> = Result<T, TelemetryError>;
