//! Poll driver.
//!
//! A single task owns the estimator. Every tick it fetches the height series, feeds the
//! accepted height to the estimator, and pushes the resulting display text to the sink. Polls
//! never overlap: the next tick is only awaited once the previous fetch has settled, and ticks
//! missed during a slow fetch are skipped rather than replayed.

use crate::display::{DisplaySink, DisplayState};
use blockrate_client::{FetchError, MetricsSource};
use blockrate_core::{EstimatorSettings, RateEstimator, RateResult, Sample};
use blockrate_telemetry::metrics::{self, EstimateSnapshot};
use blockrate_telemetry::SharedHealth;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Schedule and display settings of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverSettings {
    /// Time between polls.
    pub poll_interval: Duration,
    /// Consecutive failed polls before the display shows a network error.
    pub network_error_threshold: u32,
}

/// What a single poll did.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// A height was accepted and fed to the estimator.
    Estimated(RateResult),
    /// The series was too short to yield a height; nothing changed.
    NoSample,
    /// The fetch failed.
    Failed(FetchError),
}

/// Drives polling, estimation and display.
pub struct PollDriver<S, D> {
    source: S,
    display: D,
    estimator: RateEstimator,
    settings: DriverSettings,
    rate: Option<f64>,
    polls: u64,
    health: Option<SharedHealth>,
}

impl<S, D> PollDriver<S, D>
where
    S: MetricsSource,
    D: DisplaySink,
{
    /// Creates a driver with an empty window.
    pub fn new(
        source: S,
        display: D,
        estimator: EstimatorSettings,
        settings: DriverSettings,
    ) -> Self {
        Self {
            source,
            display,
            estimator: RateEstimator::new(estimator),
            settings,
            rate: None,
            polls: 0,
            health: None,
        }
    }

    /// Publishes state to `health` after every poll.
    #[must_use]
    pub fn with_health(mut self, health: SharedHealth) -> Self {
        self.health = Some(health);
        self
    }

    /// The estimator.
    pub fn estimator(&self) -> &RateEstimator {
        &self.estimator
    }

    /// Polls attempted so far.
    pub fn polls(&self) -> u64 {
        self.polls
    }

    /// Current display state.
    pub fn display_state(&self) -> DisplayState {
        if self.estimator.error_count() >= self.settings.network_error_threshold {
            return DisplayState::NetworkError;
        }
        match self.rate {
            Some(rate) => DisplayState::Rate(rate),
            None => DisplayState::Calculating,
        }
    }

    /// Runs one poll and refreshes the display.
    pub async fn poll_once(&mut self) -> PollOutcome {
        self.polls += 1;
        metrics::record_poll();

        let outcome = match self.source.fetch_series().await {
            Ok(series) => match series.accepted_height() {
                Some(height) => {
                    let sample = Sample::new(height, Instant::now().into_std());
                    PollOutcome::Estimated(self.accept(sample))
                }
                None => {
                    debug!(points = series.len(), "series too short; keeping previous state");
                    PollOutcome::NoSample
                }
            },
            Err(err) => {
                let error_count = self.estimator.record_failure();
                metrics::record_fetch_error(error_count);
                if error_count == self.settings.network_error_threshold {
                    warn!(
                        error = %err,
                        error_count,
                        source = %self.source.describe(),
                        "network error threshold reached"
                    );
                } else {
                    warn!(error = %err, kind = err.kind(), error_count, "poll failed");
                }
                PollOutcome::Failed(err)
            }
        };

        self.publish().await;
        outcome
    }

    fn accept(&mut self, sample: Sample) -> RateResult {
        let result = self.estimator.update(sample);
        if result.is_resetting() {
            metrics::record_glitch_reset();
        }
        self.rate = result.rate();

        metrics::record_estimate(EstimateSnapshot {
            displayed_rate: self.rate,
            raw_rate: self.estimator.last_raw_rate(),
            window_samples: self.estimator.window().len(),
            last_height: self.estimator.state().last_height,
        });
        debug!(height = sample.height, %result, "sample accepted");
        result
    }

    async fn publish(&mut self) {
        let text = self.display_state().to_string();
        self.display.show(&text);

        if let Some(health) = &self.health {
            let state = self.estimator.state();
            let mut health = health.write().await;
            health.display = text;
            health.error_count = state.error_count;
            health.network_error_threshold = self.settings.network_error_threshold;
            health.last_height = state.last_height;
            health.window_samples = self.estimator.window().len();
            health.polls = self.polls;
        }
    }
}

impl<S, D> PollDriver<S, D>
where
    S: MetricsSource + 'static,
    D: DisplaySink + 'static,
{
    /// Starts polling on a background task. The first poll runs immediately.
    pub fn start(mut self) -> PollHandle<S, D> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = time::interval(self.settings.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(
                source = %self.source.describe(),
                interval_ms = self.settings.poll_interval.as_millis() as u64,
                threshold = self.settings.network_error_threshold,
                "poll driver started"
            );

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {}
                }
                // A fetch still in flight at shutdown is dropped with its result.
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = self.poll_once() => {}
                }
            }

            info!(polls = self.polls, "poll driver stopped");
            self
        });

        PollHandle {
            shutdown: shutdown_tx,
            task: Some(task),
        }
    }
}

/// Handle to a running poll driver. Dropping it stops the driver.
pub struct PollHandle<S, D> {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<PollDriver<S, D>>>,
}

impl<S, D> PollHandle<S, D> {
    /// Stops polling and waits for the task to exit, returning the driver.
    pub async fn stop(mut self) -> Option<PollDriver<S, D>> {
        let _ = self.shutdown.send(true);
        let task = self.task.take()?;
        match task.await {
            Ok(driver) => Some(driver),
            Err(err) => {
                warn!(error = %err, "poll driver task ended abnormally");
                None
            }
        }
    }
}

impl<S, D> Drop for PollHandle<S, D> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use blockrate_client::FetchResult;
    use blockrate_core::{RawSeries, SeriesPoint};
    use blockrate_telemetry::HealthState;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::RwLock;

    const POLL: Duration = Duration::from_secs(10);

    /// Replays scripted responses; an empty series once the script runs out.
    #[derive(Default)]
    struct ScriptedSource {
        responses: Mutex<VecDeque<FetchResult<RawSeries>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(responses: Vec<FetchResult<RawSeries>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MetricsSource for ScriptedSource {
        async fn fetch_series(&self) -> FetchResult<RawSeries> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(RawSeries::empty()))
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    #[derive(Clone, Default)]
    struct RecordingDisplay {
        shown: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingDisplay {
        fn last(&self) -> Option<String> {
            self.shown.lock().unwrap().last().cloned()
        }

        fn all(&self) -> Vec<String> {
            self.shown.lock().unwrap().clone()
        }
    }

    impl DisplaySink for RecordingDisplay {
        fn show(&mut self, text: &str) {
            self.shown.lock().unwrap().push(text.to_string());
        }
    }

    /// A series whose accepted (second-to-last) height is `height`.
    fn series(height: u64) -> FetchResult<RawSeries> {
        Ok(RawSeries::new(vec![
            SeriesPoint {
                unix_seconds: 1_700_000_000.0,
                value: height as f64,
            },
            SeriesPoint {
                unix_seconds: 1_700_000_060.0,
                value: (height + 3) as f64,
            },
        ]))
    }

    fn driver(
        source: ScriptedSource,
        threshold: u32,
    ) -> (PollDriver<ScriptedSource, RecordingDisplay>, RecordingDisplay) {
        let display = RecordingDisplay::default();
        let driver = PollDriver::new(
            source,
            display.clone(),
            EstimatorSettings::with_poll_interval(POLL),
            DriverSettings {
                poll_interval: POLL,
                network_error_threshold: threshold,
            },
        );
        (driver, display)
    }

    #[tokio::test(start_paused = true)]
    async fn transient_error_keeps_rate_displayed() {
        let source = ScriptedSource::new(vec![
            series(100),
            series(110),
            series(120),
            Err(FetchError::Timeout),
            series(140),
        ]);
        let (mut driver, display) = driver(source, 3);

        assert_eq!(
            driver.poll_once().await,
            PollOutcome::Estimated(RateResult::InsufficientData)
        );
        assert_eq!(display.last().as_deref(), Some("Calculating..."));

        for _ in 0..2 {
            time::advance(POLL).await;
            assert_eq!(
                driver.poll_once().await,
                PollOutcome::Estimated(RateResult::Rate(1.0))
            );
            assert_eq!(display.last().as_deref(), Some("1.0 bps"));
        }

        time::advance(POLL).await;
        assert_eq!(
            driver.poll_once().await,
            PollOutcome::Failed(FetchError::Timeout)
        );
        assert_eq!(driver.estimator().error_count(), 1);
        assert_eq!(display.last().as_deref(), Some("1.0 bps"));

        time::advance(POLL).await;
        assert_eq!(
            driver.poll_once().await,
            PollOutcome::Estimated(RateResult::Rate(1.0))
        );
        assert_eq!(driver.estimator().error_count(), 0);
        assert_eq!(driver.polls(), 5);
        assert_eq!(
            display.all(),
            vec!["Calculating...", "1.0 bps", "1.0 bps", "1.0 bps", "1.0 bps"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn threshold_switches_to_network_error_until_success() {
        let source = ScriptedSource::new(vec![
            series(100),
            Err(FetchError::request("connection refused")),
            Err(FetchError::Status { status: 502 }),
            series(110),
        ]);
        let (mut driver, display) = driver(source, 2);

        driver.poll_once().await;
        time::advance(POLL).await;
        driver.poll_once().await;
        assert_eq!(display.last().as_deref(), Some("Calculating..."));

        time::advance(POLL).await;
        driver.poll_once().await;
        assert_eq!(driver.display_state(), DisplayState::NetworkError);
        assert_eq!(display.last().as_deref(), Some("Network error"));

        time::advance(POLL).await;
        driver.poll_once().await;
        assert_eq!(driver.estimator().error_count(), 0);
        assert_eq!(display.last().as_deref(), Some("0.3 bps"));
    }

    #[tokio::test(start_paused = true)]
    async fn short_series_changes_nothing() {
        let source = ScriptedSource::new(vec![
            Err(FetchError::Timeout),
            Ok(RawSeries::new(vec![SeriesPoint {
                unix_seconds: 1_700_000_000.0,
                value: 42.0,
            }])),
        ]);
        let (mut driver, display) = driver(source, 6);

        driver.poll_once().await;
        assert_eq!(driver.poll_once().await, PollOutcome::NoSample);
        assert_eq!(driver.estimator().error_count(), 1);
        assert!(driver.estimator().window().is_empty());
        assert_eq!(driver.estimator().state().last_height, 0);
        assert_eq!(display.last().as_deref(), Some("Calculating..."));
    }

    #[tokio::test(start_paused = true)]
    async fn implausible_jump_resets_to_calculating() {
        let source = ScriptedSource::new(vec![series(100), series(110), series(5_000)]);
        let (mut driver, display) = driver(source, 6);

        driver.poll_once().await;
        time::advance(POLL).await;
        driver.poll_once().await;
        assert_eq!(display.last().as_deref(), Some("1.0 bps"));

        time::advance(POLL).await;
        assert_eq!(
            driver.poll_once().await,
            PollOutcome::Estimated(RateResult::Resetting)
        );
        assert_eq!(display.last().as_deref(), Some("Calculating..."));
        assert_eq!(driver.estimator().window().len(), 1);
        assert_eq!(driver.estimator().state().last_height, 5_000);
    }

    #[tokio::test(start_paused = true)]
    async fn health_mirrors_driver_state() {
        let health: SharedHealth = Arc::new(RwLock::new(HealthState::default()));
        let source = ScriptedSource::new(vec![series(1234), Err(FetchError::Timeout)]);
        let (driver, _display) = driver(source, 1);
        let mut driver = driver.with_health(health.clone());

        driver.poll_once().await;
        {
            let state = health.read().await;
            assert_eq!(state.display, "Calculating...");
            assert_eq!(state.last_height, 1234);
            assert_eq!(state.window_samples, 1);
            assert!(state.is_healthy());
        }

        driver.poll_once().await;
        let state = health.read().await;
        assert_eq!(state.display, "Network error");
        assert_eq!(state.error_count, 1);
        assert_eq!(state.polls, 2);
        assert!(!state.is_healthy());
    }

    #[tokio::test(start_paused = true)]
    async fn started_driver_polls_on_schedule_until_stopped() {
        let source = Arc::new(ScriptedSource::new(vec![
            series(100),
            series(110),
            series(120),
        ]));
        let display = RecordingDisplay::default();
        let handle = PollDriver::new(
            source.clone(),
            display.clone(),
            EstimatorSettings::with_poll_interval(POLL),
            DriverSettings {
                poll_interval: POLL,
                network_error_threshold: 6,
            },
        )
        .start();

        // Ticks at 0s, 10s and 20s.
        time::sleep(Duration::from_secs(25)).await;
        assert_eq!(source.calls(), 3);

        let driver = handle.stop().await.expect("driver returned");
        assert_eq!(driver.polls(), 3);
        assert_eq!(display.last().as_deref(), Some("1.0 bps"));

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_polling() {
        let source = Arc::new(ScriptedSource::default());
        let handle = PollDriver::new(
            source.clone(),
            RecordingDisplay::default(),
            EstimatorSettings::with_poll_interval(POLL),
            DriverSettings {
                poll_interval: POLL,
                network_error_threshold: 6,
            },
        )
        .start();

        time::sleep(Duration::from_secs(15)).await;
        assert_eq!(source.calls(), 2);

        drop(handle);
        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls(), 2);
    }
}
