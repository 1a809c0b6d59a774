//! HTTP client for Prometheus-compatible `query_range` endpoints.

use crate::error::{FetchError, FetchResult};
use crate::models::QueryRangeResponse;
use crate::query::RangeQuery;
use crate::source::MetricsSource;
use async_trait::async_trait;
use blockrate_core::RawSeries;
use reqwest::{Client, Url};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Timeout applied to every request unless configured otherwise.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Client that samples the block height series of one range query.
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    base_address: Url,
    http_client: Client,
    query: RangeQuery,
    request_timeout: Duration,
}

/// Builder for [`PrometheusClient`].
#[derive(Debug)]
pub struct PrometheusClientBuilder {
    url: Url,
    query: RangeQuery,
    timeout: Duration,
    user_agent: Option<String>,
    client: Option<Client>,
}

impl PrometheusClientBuilder {
    /// Starts a builder for the given `query_range` endpoint.
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            url,
            query: RangeQuery::default(),
            timeout: DEFAULT_HTTP_TIMEOUT,
            user_agent: None,
            client: None,
        }
    }

    /// Sets the range query.
    #[must_use]
    pub fn query(mut self, query: RangeQuery) -> Self {
        self.query = query;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the `User-Agent` header.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Uses an existing HTTP client instead of building one.
    #[must_use]
    pub fn http_client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Builds the client.
    pub fn build(self) -> FetchResult<PrometheusClient> {
        match self.url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(FetchError::InvalidUrl {
                    message: format!("unsupported scheme {other:?} in {}", self.url),
                })
            }
        }

        let http_client = match self.client {
            Some(client) => client,
            None => {
                let mut builder = Client::builder().timeout(self.timeout);
                if let Some(user_agent) = self.user_agent {
                    builder = builder.user_agent(user_agent);
                }
                builder.build()?
            }
        };

        Ok(PrometheusClient {
            base_address: self.url,
            http_client,
            query: self.query,
            request_timeout: self.timeout,
        })
    }
}

impl PrometheusClient {
    /// Creates a configurable builder for the client.
    #[must_use]
    pub fn builder(url: Url) -> PrometheusClientBuilder {
        PrometheusClientBuilder::new(url)
    }

    /// Parses `url` and creates a client with default settings.
    pub fn new(url: &str) -> FetchResult<Self> {
        let url = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            message: format!("{url}: {e}"),
        })?;
        Self::builder(url).build()
    }

    /// Endpoint the client queries.
    #[must_use]
    pub fn base_address(&self) -> &Url {
        &self.base_address
    }

    /// Range query issued on every fetch.
    #[must_use]
    pub fn query(&self) -> &RangeQuery {
        &self.query
    }

    /// Per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Runs the range query for a window ending at `now_unix`.
    pub async fn query_range(&self, now_unix: i64) -> FetchResult<RawSeries> {
        let start = Instant::now();
        let params = self.query.params(now_unix);

        let response = self
            .http_client
            .get(self.base_address.clone())
            .query(&params)
            .timeout(self.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "query_range returned error status");
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let content = response.text().await?;
        trace!(bytes = content.len(), "query_range response received");

        let series = QueryRangeResponse::from_json(&content)?.into_series()?;
        debug!(
            points = series.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "query_range completed"
        );
        Ok(series)
    }
}

#[async_trait]
impl MetricsSource for PrometheusClient {
    async fn fetch_series(&self) -> FetchResult<RawSeries> {
        self.query_range(chrono::Utc::now().timestamp()).await
    }

    fn describe(&self) -> String {
        self.base_address.to_string()
    }
}
