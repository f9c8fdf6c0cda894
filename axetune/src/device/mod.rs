//! Device API access
//!
//! [`DeviceApi`] is the seam between the tuning logic and the board. The
//! production implementation is [`HttpDeviceClient`]; tests drive the tuning
//! logic with scripted doubles.

pub mod client;
pub mod error;
pub mod types;

pub use client::HttpDeviceClient;
pub use error::DeviceError;
pub use types::{Sample, SystemInfo};

use async_trait::async_trait;
use axetune_common::{Candidate, DeviceDefaults};
use tracing::{info, warn};

/// Operations the tuner needs from a device
#[async_trait]
pub trait DeviceApi: Send + Sync {
    /// Read one telemetry sample (implementations own the retry policy)
    async fn read_status(&self) -> Result<Sample, DeviceError>;

    /// Read the device's current configuration and core counts
    async fn fetch_defaults(&self) -> Result<DeviceDefaults, DeviceError>;

    /// Write a new (voltage, frequency) and restart the device
    ///
    /// Returns once the restart was requested; the caller decides whether to
    /// wait for the device to settle.
    async fn apply_settings(&self, candidate: Candidate) -> Result<(), DeviceError>;

    /// Request a device restart
    async fn restart(&self) -> Result<(), DeviceError>;

    /// [`DeviceApi::fetch_defaults`], falling back to
    /// [`DeviceDefaults::fallback`] when the device cannot be read
    async fn defaults_or_fallback(&self) -> DeviceDefaults {
        match self.fetch_defaults().await {
            Ok(defaults) => {
                info!(
                    core_voltage = defaults.core_voltage,
                    frequency = defaults.frequency,
                    total_cores = defaults.total_cores(),
                    "Current settings determined"
                );
                defaults
            }
            Err(e) => {
                warn!("Error fetching default system settings: {}. Using fallback defaults.", e);
                DeviceDefaults::fallback()
            }
        }
    }
}
