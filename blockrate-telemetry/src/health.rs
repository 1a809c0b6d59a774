//! Health and metrics HTTP endpoint.
//!
//! Serves `/metrics` in Prometheus text format and `/health` as JSON built from the state the
//! poll driver publishes after every tick.

use crate::{metrics, TelemetryResult};
use hyper::{
    header::CONTENT_TYPE,
    service::{make_service_fn, service_fn},
    Body, Method, Request, Response, Server, StatusCode,
};
use serde::Serialize;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// State reported by `/health`, updated by the poll driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthState {
    /// Text currently shown on the display
    pub display: String,
    /// Failed polls since the last successful one
    pub error_count: u32,
    /// Error count at which the display switches to the network error state
    pub network_error_threshold: u32,
    /// Last accepted block height
    pub last_height: u64,
    /// Samples in the rate window
    pub window_samples: usize,
    /// Polls attempted since start
    pub polls: u64,
}

impl HealthState {
    /// Healthy while the error count stays below the display threshold.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.error_count < self.network_error_threshold.max(1)
    }
}

/// Health state shared between the poll driver and the HTTP server.
pub type SharedHealth = Arc<RwLock<HealthState>>;

#[derive(Serialize)]
struct HealthReport<'a> {
    healthy: bool,
    #[serde(flatten)]
    state: &'a HealthState,
}

/// Serves `/metrics` and `/health` on `127.0.0.1:port` until `shutdown` resolves.
pub async fn serve<F>(port: u16, health: SharedHealth, shutdown: F) -> TelemetryResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    let make_svc = make_service_fn(move |_conn| {
        let health = health.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let health = health.clone();
                async move { Ok::<_, Infallible>(handle_request(req, health).await) }
            }))
        }
    });

    let server = Server::try_bind(&addr)?.serve(make_svc);
    info!(%addr, "metrics endpoint listening");
    server.with_graceful_shutdown(shutdown).await?;
    info!(%addr, "metrics endpoint stopped");
    Ok(())
}

async fn handle_request(req: Request<Body>, health: SharedHealth) -> Response<Body> {
    if req.method() != Method::GET {
        return status_response(StatusCode::METHOD_NOT_ALLOWED);
    }

    match req.uri().path() {
        "/metrics" => Response::builder()
            .header(CONTENT_TYPE, "text/plain; version=0.0.4")
            .body(Body::from(metrics::gather()))
            .unwrap_or_else(|_| status_response(StatusCode::INTERNAL_SERVER_ERROR)),
        "/health" => {
            let state = health.read().await.clone();
            let healthy = state.is_healthy();
            let report = HealthReport {
                healthy,
                state: &state,
            };
            let body = match serde_json::to_vec(&report) {
                Ok(body) => body,
                Err(_) => return status_response(StatusCode::INTERNAL_SERVER_ERROR),
            };
            let status = if healthy {
                StatusCode::OK
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            };
            Response::builder()
                .status(status)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap_or_else(|_| status_response(StatusCode::INTERNAL_SERVER_ERROR))
        }
        _ => status_response(StatusCode::NOT_FOUND),
    }
}

fn status_response(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}
