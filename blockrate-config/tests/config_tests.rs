//! Configuration file round trips and overrides.

use blockrate_config::{BlockRateConfig, ConfigError, DEFAULT_POLL_INTERVAL_MS};
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn missing_file_yields_defaults() {
    let dir = TempDir::new().expect("temp dir");
    let config = BlockRateConfig::load(&dir.path().join("absent.toml")).expect("defaults");
    assert_eq!(config, BlockRateConfig::default());
    assert_eq!(config.poll.interval_ms, DEFAULT_POLL_INTERVAL_MS);
}

#[test]
fn partial_file_keeps_remaining_defaults() {
    let config = BlockRateConfig::from_toml_str(
        r#"
        [poll]
        interval_ms = 5000

        [estimator]
        max_blocks_per_second = 20.0

        [source]
        release = "mercury"
        "#,
    )
    .expect("parse");

    config.validate().expect("valid");
    assert_eq!(config.poll_interval(), Duration::from_secs(5));
    assert_eq!(config.poll.history_secs, 600);
    assert_eq!(config.estimator.retention_secs, 60);
    assert_eq!(config.estimator_settings().max_height_delta(), 100);
    assert_eq!(config.display, Default::default());
    assert!(config
        .range_query()
        .expression()
        .contains(r#"ic="mercury""#));
}

#[test]
fn saved_file_loads_back() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("blockrate.toml");

    let mut config = BlockRateConfig::default();
    config.source.url = "http://127.0.0.1:9090/api/v1/query_range".to_string();
    config.display.network_error_threshold = 3;
    config.telemetry.metrics_port = Some(9184);
    config.logging.format = Some("json".to_string());
    config.save_to_file(&path).expect("save");

    let loaded = BlockRateConfig::load(&path).expect("load");
    assert_eq!(loaded, config);
}

#[test]
fn invalid_toml_is_parse_error() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[poll\ninterval_ms = ").expect("write");

    let err = BlockRateConfig::load(&path).expect_err("broken file");
    assert!(matches!(err, ConfigError::Parse(_)), "unexpected error: {err}");
}

#[test]
fn wrong_type_is_parse_error() {
    let err = BlockRateConfig::from_toml_str("[poll]\ninterval_ms = \"fast\"\n")
        .expect_err("string interval");
    assert!(matches!(err, ConfigError::Parse(_)));
}
