//! Block Rate Client
//!
//! Fetches cumulative block height time series from a Prometheus-compatible `query_range`
//! endpoint and hands them over as [`RawSeries`](blockrate_core::RawSeries).

mod client;
mod error;
pub mod models;
mod query;
mod source;

pub use client::{PrometheusClient, PrometheusClientBuilder, DEFAULT_HTTP_TIMEOUT};
pub use error::{FetchError, FetchResult};
pub use query::{RangeQuery, DEFAULT_HISTORY_SECS, DEFAULT_STEP_SECS};
pub use source::MetricsSource;

/// Dashboard proxy endpoint used when no source URL is configured.
pub const DEFAULT_SOURCE_URL: &str =
    "https://dashboard.dfinity.network/api/datasources/proxy/2/api/v1/query_range";
