//! # Block Rate Telemetry
//!
//! Observability stack for the block rate monitor.
//!
//! - **Logging**: text, compact or JSON output with `RUST_LOG` overrides and optional file output
//! - **Metrics**: poll, error, glitch and rate gauges (Prometheus native)
//! - **Health**: `/health` reporting the current display state and error count

mod error;
mod health;
mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use health::{serve, HealthState, SharedHealth};
pub use logging::{init_logging, LogConfig, LogFormat, LoggingGuard};
