//! Abstraction over where block height series come from.

use crate::error::FetchResult;
use async_trait::async_trait;
use blockrate_core::RawSeries;
use std::sync::Arc;

/// A source of cumulative block height series.
///
/// Implementations perform exactly one attempt per call; retries are left to the caller's
/// schedule.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Fetches the most recent block height series, oldest point first.
    async fn fetch_series(&self) -> FetchResult<RawSeries>;

    /// Human-readable description used in logs.
    fn describe(&self) -> String {
        "metrics source".to_string()
    }
}

#[async_trait]
impl<T: MetricsSource + ?Sized> MetricsSource for Arc<T> {
    async fn fetch_series(&self) -> FetchResult<RawSeries> {
        (**self).fetch_series().await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
