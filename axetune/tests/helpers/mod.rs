//! Shared fixtures for axetune integration tests
//!
//! - `mock_device`: wiremock server speaking the device REST API
//! - `fast_config`: tuning config with millisecond windows

#![allow(dead_code)]

use axetune_common::TuningConfig;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// `/api/system/info` body for a healthy 1000-core board
pub fn system_info_body(hash_rate: f64) -> Value {
    json!({
        "coreVoltage": 1150,
        "frequency": 600,
        "smallCoreCount": 1000,
        "asicCount": 1,
        "temp": 60.0,
        "vrTemp": 55.0,
        "voltage": 11900.0,
        "hashRate": hash_rate,
        "power": 80.0,
        "hostname": "nerdqaxe-test"
    })
}

/// Device that always reports `hash_rate` and accepts every PATCH/restart
///
/// `applies` is the exact number of PATCH and restart requests expected,
/// verified when the server is dropped.
pub async fn mock_device(hash_rate: f64, applies: u64) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/system/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(system_info_body(hash_rate)))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/api/system"))
        .respond_with(ResponseTemplate::new(200))
        .expect(applies)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/system/restart"))
        .respond_with(ResponseTemplate::new(200))
        .expect(applies)
        .mount(&server)
        .await;

    server
}

/// 10 samples 1 ms apart, no settle wait, fast HTTP retries
pub fn fast_config() -> TuningConfig {
    let mut config = TuningConfig::default();
    config.benchmark.duration_ms = 10;
    config.benchmark.sample_interval_ms = 1;
    config.benchmark.settle_ms = 0;
    config.benchmark.apply_pause_ms = 0;
    config.http.request_timeout_ms = 200;
    config.http.retry_delay_ms = 1;
    config
}
