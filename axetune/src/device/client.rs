//! HTTP client for the device REST API
//!
//! - `GET /api/system/info` telemetry and configuration
//! - `PATCH /api/system` with `{coreVoltage, frequency}`
//! - `POST /api/system/restart`

use crate::device::{DeviceApi, DeviceError, Sample, SystemInfo};
use async_trait::async_trait;
use axetune_common::config::HttpConfig;
use axetune_common::{Candidate, DeviceDefaults};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const SYSTEM_INFO_PATH: &str = "/api/system/info";
const SYSTEM_PATH: &str = "/api/system";
const RESTART_PATH: &str = "/api/system/restart";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SettingsPatch {
    core_voltage: u32,
    frequency: u32,
}

/// reqwest-backed [`DeviceApi`] implementation
pub struct HttpDeviceClient {
    http_client: reqwest::Client,
    base_url: String,
    read_retries: u32,
    retry_delay: Duration,
    apply_pause: Duration,
}

impl HttpDeviceClient {
    /// Create a client for `address` (`192.168.2.26` or a full `http://` URL)
    pub fn new(address: &str, config: &HttpConfig) -> Result<Self, DeviceError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| DeviceError::Request(e.to_string()))?;

        let base_url = if address.starts_with("http://") || address.starts_with("https://") {
            address.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", address)
        };

        Ok(Self {
            http_client,
            base_url,
            read_retries: config.read_retries.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            apply_pause: Duration::ZERO,
        })
    }

    /// Pause between PATCHing settings and requesting the restart
    pub fn with_apply_pause(mut self, pause: Duration) -> Self {
        self.apply_pause = pause;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Single `GET /api/system/info` attempt
    pub async fn system_info(&self) -> Result<SystemInfo, DeviceError> {
        let info = self
            .http_client
            .get(format!("{}{}", self.base_url, SYSTEM_INFO_PATH))
            .send()
            .await?
            .error_for_status()?
            .json::<SystemInfo>()
            .await?;
        Ok(info)
    }

    /// `GET /api/system/info` with the bounded retry policy
    ///
    /// Timeouts and connection errors are retried up to `read_retries`
    /// attempts with a fixed delay; any other failure returns immediately.
    pub async fn system_info_with_retry(&self) -> Result<SystemInfo, DeviceError> {
        let mut attempt = 1;
        loop {
            match self.system_info().await {
                Ok(info) => return Ok(info),
                Err(e) if e.is_retriable() => {
                    match &e {
                        DeviceError::Timeout(_) => warn!(
                            "Timeout while fetching system info. Attempt {} of {}.",
                            attempt, self.read_retries
                        ),
                        _ => error!(
                            "Connection error while fetching system info. Attempt {} of {}.",
                            attempt, self.read_retries
                        ),
                    }
                    if attempt >= self.read_retries {
                        return Err(e);
                    }
                    attempt += 1;
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    error!("Error fetching system info: {}", e);
                    return Err(e);
                }
            }
        }
    }
}

#[async_trait]
impl DeviceApi for HttpDeviceClient {
    async fn read_status(&self) -> Result<Sample, DeviceError> {
        self.system_info_with_retry().await.map(Sample::from)
    }

    async fn fetch_defaults(&self) -> Result<DeviceDefaults, DeviceError> {
        Ok(self.system_info().await?.defaults())
    }

    async fn apply_settings(&self, candidate: Candidate) -> Result<(), DeviceError> {
        let patch = SettingsPatch {
            core_voltage: candidate.core_voltage,
            frequency: candidate.frequency,
        };

        self.http_client
            .patch(format!("{}{}", self.base_url, SYSTEM_PATH))
            .json(&patch)
            .send()
            .await?
            .error_for_status()?;

        info!(
            "Applying settings: Voltage = {}mV, Frequency = {}MHz",
            candidate.core_voltage, candidate.frequency
        );

        if !self.apply_pause.is_zero() {
            tokio::time::sleep(self.apply_pause).await;
        }

        self.restart().await
    }

    async fn restart(&self) -> Result<(), DeviceError> {
        debug!("Requesting device restart");
        self.http_client
            .post(format!("{}{}", self.base_url, RESTART_PATH))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
