//! Block Rate - network block production rate monitor
//!
//! Polls a Prometheus-compatible `query_range` endpoint for the cumulative block height of the
//! network, estimates blocks per second over a sliding window and keeps a one-line display up
//! to date.
//!
//! Usage:
//!   blockrate --config blockrate.toml
//!
//! The monitor will:
//! - Poll the height series on a fixed interval
//! - Show the rate, "Calculating..." or "Network error"
//! - Optionally serve `/metrics` and `/health` on localhost
//! - Run until Ctrl+C is received

mod display;
mod driver;

use anyhow::{Context, Result};
use blockrate_client::PrometheusClient;
use blockrate_config::{BlockRateConfig, LoggingSection};
use blockrate_telemetry::{init_logging, HealthState, LogConfig, LogFormat, LoggingGuard};
use clap::Parser;
use display::{ConsoleDisplay, DisplaySink, LogDisplay};
use driver::{DriverSettings, PollDriver};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{oneshot, RwLock};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "blockrate", about = "Network block production rate monitor", version)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(
        long,
        short = 'c',
        default_value = blockrate_config::DEFAULT_CONFIG_FILE,
        env = "BLOCKRATE_CONFIG",
        value_name = "PATH"
    )]
    config: PathBuf,

    /// Overrides the `query_range` endpoint URL.
    #[arg(long, value_name = "URL", env = "BLOCKRATE_SOURCE_URL")]
    url: Option<String>,

    /// Restricts the height query to nodes running this release.
    #[arg(long, value_name = "VERSION", env = "BLOCKRATE_RELEASE")]
    release: Option<String>,

    /// Replaces the height query with a custom PromQL expression.
    #[arg(long, value_name = "PROMQL", env = "BLOCKRATE_QUERY")]
    query: Option<String>,

    /// Overrides the poll interval in milliseconds.
    #[arg(long, value_name = "MS", env = "BLOCKRATE_INTERVAL_MS")]
    interval_ms: Option<u64>,

    /// Overrides the per-request timeout in milliseconds.
    #[arg(long, value_name = "MS", env = "BLOCKRATE_REQUEST_TIMEOUT_MS")]
    request_timeout_ms: Option<u64>,

    /// Overrides the failed poll count that switches the display to "Network error".
    #[arg(long, value_name = "N", env = "BLOCKRATE_ERROR_THRESHOLD")]
    error_threshold: Option<u32>,

    /// Overrides the highest plausible block rate.
    #[arg(long, value_name = "BPS", env = "BLOCKRATE_MAX_BPS")]
    max_bps: Option<f64>,

    /// Serves `/metrics` and `/health` on this localhost port.
    #[arg(long, value_name = "PORT", env = "BLOCKRATE_METRICS_PORT")]
    metrics_port: Option<u16>,

    /// Overrides the log level.
    #[arg(long, value_name = "LEVEL", env = "BLOCKRATE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Overrides the log format (text, compact, json).
    #[arg(long, value_name = "FORMAT", env = "BLOCKRATE_LOG_FORMAT")]
    log_format: Option<String>,

    /// Overrides the log file path.
    #[arg(long, value_name = "PATH", env = "BLOCKRATE_LOG_FILE")]
    log_file: Option<String>,

    /// Run in daemon mode (display updates go to the log instead of stdout).
    #[arg(long, short = 'd', env = "BLOCKRATE_DAEMON")]
    daemon: bool,

    /// Validate configuration and exit.
    #[arg(long)]
    check_config: bool,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    dump_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = BlockRateConfig::load(&cli.config)
        .with_context(|| format!("failed to load configuration {}", cli.config.display()))?;
    apply_overrides(&mut config, &cli);

    if cli.dump_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let _log_guard = init_tracing(&config.logging)?;

    config.validate().context("invalid configuration")?;
    if cli.check_config {
        info!(target: "blockrate", "configuration validated; exiting due to --check-config");
        return Ok(());
    }

    let client = PrometheusClient::builder(config.source_url()?)
        .query(config.range_query())
        .timeout(config.request_timeout())
        .user_agent(format!("blockrate/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build metrics client")?;

    info!(
        target: "blockrate",
        url = %client.base_address(),
        query = client.query().expression(),
        interval_ms = config.poll.interval_ms,
        threshold = config.display.network_error_threshold,
        max_bps = config.estimator.max_blocks_per_second,
        "using monitor settings"
    );

    let display: Box<dyn DisplaySink> = if cli.daemon {
        Box::new(LogDisplay::default())
    } else {
        Box::new(ConsoleDisplay)
    };
    let health = Arc::new(RwLock::new(HealthState {
        network_error_threshold: config.display.network_error_threshold,
        ..HealthState::default()
    }));

    // Start optional metrics server
    let mut metrics_shutdown = None;
    let mut metrics_task = None;
    if let Some(port) = config.telemetry.metrics_port {
        let (tx, rx) = oneshot::channel::<()>();
        let shutdown = async move {
            let _ = rx.await;
        };
        let health = health.clone();
        metrics_task = Some(tokio::spawn(async move {
            if let Err(err) = blockrate_telemetry::serve(port, health, shutdown).await {
                warn!(target: "blockrate", error = %err, "metrics server terminated");
            }
        }));
        metrics_shutdown = Some(tx);
    }

    let handle = PollDriver::new(
        client,
        display,
        config.estimator_settings(),
        DriverSettings {
            poll_interval: config.poll_interval(),
            network_error_threshold: config.display.network_error_threshold,
        },
    )
    .with_health(health)
    .start();

    info!(target: "blockrate", "blockrate started; press Ctrl+C to stop");

    // Wait for shutdown signal
    if let Err(err) = signal::ctrl_c().await {
        error!(target: "blockrate", error = %err, "failed to wait for shutdown signal");
    } else {
        info!(target: "blockrate", "shutdown signal received (Ctrl+C)");
    }

    if let Some(driver) = handle.stop().await {
        info!(
            target: "blockrate",
            polls = driver.polls(),
            last_height = driver.estimator().state().last_height,
            "poll driver stopped"
        );
    }
    if let Some(tx) = metrics_shutdown {
        let _ = tx.send(());
    }
    if let Some(task) = metrics_task {
        let _ = task.await;
    }
    info!(target: "blockrate", "shutdown complete");
    Ok(())
}

fn apply_overrides(config: &mut BlockRateConfig, cli: &Cli) {
    if let Some(url) = &cli.url {
        config.source.url = url.clone();
    }
    if let Some(release) = &cli.release {
        config.source.release = Some(release.clone());
    }
    if let Some(query) = &cli.query {
        config.source.query = Some(query.clone());
    }
    if let Some(interval) = cli.interval_ms {
        config.poll.interval_ms = interval;
    }
    if let Some(timeout) = cli.request_timeout_ms {
        config.poll.request_timeout_ms = Some(timeout);
    }
    if let Some(threshold) = cli.error_threshold {
        config.display.network_error_threshold = threshold;
    }
    if let Some(max_bps) = cli.max_bps {
        config.estimator.max_blocks_per_second = max_bps;
    }
    if let Some(port) = cli.metrics_port {
        config.telemetry.metrics_port = Some(port);
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = Some(level.clone());
    }
    if let Some(format) = &cli.log_format {
        config.logging.format = Some(format.clone());
    }
    if let Some(path) = &cli.log_file {
        config.logging.file_path = Some(path.clone());
    }
}

fn log_config(logging: &LoggingSection) -> Result<LogConfig> {
    let mut log_config = LogConfig {
        color: logging.color,
        file: logging.file_path.as_ref().map(PathBuf::from),
        ..LogConfig::default()
    };
    if let Some(level) = &logging.level {
        log_config.level = level.clone();
    }
    if let Some(format) = &logging.format {
        log_config.format = format
            .parse::<LogFormat>()
            .context("invalid logging.format")?;
    }
    Ok(log_config)
}

fn init_tracing(logging: &LoggingSection) -> Result<LoggingGuard> {
    let log_config = log_config(logging)?;
    init_logging(&log_config).context("failed to initialize logging")
}
