//! Device API payloads
//!
//! `GET /api/system/info` returns one flat JSON object; every field is
//! optional here because boards and firmware versions differ in what they
//! report.

use axetune_common::DeviceDefaults;
use serde::{Deserialize, Serialize};

/// Raw `/api/system/info` response (fields used by the tuner only)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub core_voltage: Option<f64>,
    pub frequency: Option<f64>,
    pub small_core_count: Option<u32>,
    pub asic_count: Option<u32>,

    /// Chip temperature (°C)
    pub temp: Option<f64>,

    /// Voltage regulator temperature (°C), not reported by every board
    pub vr_temp: Option<f64>,

    /// Input (supply) voltage in mV
    pub voltage: Option<f64>,

    /// GH/s
    pub hash_rate: Option<f64>,

    /// Watts
    pub power: Option<f64>,
}

impl SystemInfo {
    /// Startup defaults, substituting the fallback value for any missing field
    pub fn defaults(&self) -> DeviceDefaults {
        let fallback = DeviceDefaults::fallback();
        DeviceDefaults {
            core_voltage: self
                .core_voltage
                .map(|v| v.round() as u32)
                .unwrap_or(fallback.core_voltage),
            frequency: self
                .frequency
                .map(|f| f.round() as u32)
                .unwrap_or(fallback.frequency),
            small_core_count: self.small_core_count.unwrap_or(fallback.small_core_count),
            asic_count: self.asic_count.unwrap_or(fallback.asic_count),
        }
    }
}

/// One instantaneous telemetry reading
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sample {
    pub hash_rate: Option<f64>,
    pub temp: Option<f64>,
    pub vr_temp: Option<f64>,
    pub power: Option<f64>,
    pub input_voltage: Option<f64>,
}

impl From<SystemInfo> for Sample {
    fn from(info: SystemInfo) -> Self {
        Self {
            hash_rate: info.hash_rate,
            temp: info.temp,
            vr_temp: info.vr_temp,
            power: info.power,
            input_voltage: info.voltage,
        }
    }
}
