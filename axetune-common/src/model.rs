//! Data model shared by the sweep, the result store and the results file
//!
//! Field names on the wire are camelCase to stay readable by tools that
//! consumed results files written before this crate existed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One (core voltage, frequency) operating point
///
/// Equality is exact-value; used as the key of the tested set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// ASIC core voltage in millivolts
    pub core_voltage: u32,

    /// ASIC clock frequency in MHz
    pub frequency: u32,
}

impl Candidate {
    pub fn new(core_voltage: u32, frequency: u32) -> Self {
        Self {
            core_voltage,
            frequency,
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:4} mV @ {:4} MHz", self.core_voltage, self.frequency)
    }
}

/// Why a trial stopped before producing metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AbortReason {
    /// Telemetry could not be read after all retries
    SystemInfoFailure,
    /// Telemetry had no chip temperature
    TemperatureDataFailure,
    /// Chip temperature below the plausible minimum
    #[serde(rename = "TEMPERATURE_BELOW_5")]
    TemperatureBelow5,
    /// Chip temperature at or above the limit
    ChipTempExceeded,
    /// Voltage regulator temperature at or above the limit
    VrTempExceeded,
    /// Telemetry had no input voltage
    InputVoltageDataFailure,
    /// Input voltage below the minimum
    InputVoltageBelowMin,
    /// Input voltage above the maximum
    InputVoltageAboveMax,
    /// Telemetry had no hashrate or power
    HashratePowerDataFailure,
    /// Power draw above the limit
    PowerConsumptionExceeded,
    /// Trimmed average hashrate was zero or negative
    ZeroHashrate,
    /// Nothing left to average after trimming
    NoDataCollected,
    /// The candidate could not be applied to the device
    SettingsApplyFailure,
    /// Cancellation observed while the trial was running
    Interrupted,
}

impl AbortReason {
    /// Wire/display code, e.g. `CHIP_TEMP_EXCEEDED`
    pub fn code(&self) -> &'static str {
        match self {
            AbortReason::SystemInfoFailure => "SYSTEM_INFO_FAILURE",
            AbortReason::TemperatureDataFailure => "TEMPERATURE_DATA_FAILURE",
            AbortReason::TemperatureBelow5 => "TEMPERATURE_BELOW_5",
            AbortReason::ChipTempExceeded => "CHIP_TEMP_EXCEEDED",
            AbortReason::VrTempExceeded => "VR_TEMP_EXCEEDED",
            AbortReason::InputVoltageDataFailure => "INPUT_VOLTAGE_DATA_FAILURE",
            AbortReason::InputVoltageBelowMin => "INPUT_VOLTAGE_BELOW_MIN",
            AbortReason::InputVoltageAboveMax => "INPUT_VOLTAGE_ABOVE_MAX",
            AbortReason::HashratePowerDataFailure => "HASHRATE_POWER_DATA_FAILURE",
            AbortReason::PowerConsumptionExceeded => "POWER_CONSUMPTION_EXCEEDED",
            AbortReason::ZeroHashrate => "ZERO_HASHRATE",
            AbortReason::NoDataCollected => "NO_DATA_COLLECTED",
            AbortReason::SettingsApplyFailure => "SETTINGS_APPLY_FAILURE",
            AbortReason::Interrupted => "INTERRUPTED",
        }
    }

    /// True for envelope violations (thermal, electrical), as opposed to data
    /// or transport problems
    pub fn is_safety_violation(&self) -> bool {
        matches!(
            self,
            AbortReason::TemperatureBelow5
                | AbortReason::ChipTempExceeded
                | AbortReason::VrTempExceeded
                | AbortReason::InputVoltageBelowMin
                | AbortReason::InputVoltageAboveMax
                | AbortReason::PowerConsumptionExceeded
        )
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Reduced metrics of one completed trial
///
/// Immutable once created; this is the element type of the results file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    #[serde(flatten)]
    pub candidate: Candidate,

    /// Trimmed mean hashrate in GH/s
    #[serde(rename = "averageHashRate")]
    pub average_hash_rate: f64,

    /// Steady-state mean chip temperature in °C
    #[serde(rename = "averageTemperature")]
    pub average_temperature: f64,

    /// Joules per terahash (lower is better)
    #[serde(rename = "efficiencyJTH")]
    pub efficiency_jth: f64,

    /// Steady-state mean VR temperature, when the board reports one
    #[serde(
        rename = "averageVRTemp",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub average_vr_temp: Option<f64>,
}

/// A record with its 1-based position in a ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedRecord {
    pub rank: usize,

    #[serde(flatten)]
    pub record: TrialRecord,
}

/// Settings read from the device once at startup
///
/// Used as the fallback configuration when no trial has succeeded, and for
/// the expected-hashrate calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDefaults {
    pub core_voltage: u32,
    pub frequency: u32,
    pub small_core_count: u32,
    pub asic_count: u32,
}

impl DeviceDefaults {
    /// Defaults assumed when the device cannot be read at startup
    pub fn fallback() -> Self {
        Self {
            core_voltage: 1150,
            frequency: 600,
            small_core_count: 0,
            asic_count: 0,
        }
    }

    /// Candidate that restores the device's own configuration
    pub fn candidate(&self) -> Candidate {
        Candidate::new(self.core_voltage, self.frequency)
    }

    /// Total hashing cores across all ASICs
    pub fn total_cores(&self) -> u64 {
        u64::from(self.small_core_count) * u64::from(self.asic_count)
    }

    /// Nominal hashrate in GH/s for a given frequency
    ///
    /// `frequency * total_cores / 1000`
    pub fn expected_hashrate(&self, frequency: u32) -> f64 {
        f64::from(frequency) * (self.total_cores() as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(v: u32, f: u32, vr: Option<f64>) -> TrialRecord {
        TrialRecord {
            candidate: Candidate::new(v, f),
            average_hash_rate: 1234.5,
            average_temperature: 61.2,
            efficiency_jth: 17.3,
            average_vr_temp: vr,
        }
    }

    #[test]
    fn test_record_uses_legacy_field_names() {
        let json = serde_json::to_value(record(1150, 600, Some(55.0))).unwrap();

        assert_eq!(json["coreVoltage"], 1150);
        assert_eq!(json["frequency"], 600);
        assert_eq!(json["averageHashRate"], 1234.5);
        assert_eq!(json["averageTemperature"], 61.2);
        assert_eq!(json["efficiencyJTH"], 17.3);
        assert_eq!(json["averageVRTemp"], 55.0);
    }

    #[test]
    fn test_record_omits_missing_vr_temp() {
        let json = serde_json::to_value(record(1150, 600, None)).unwrap();
        assert!(json.get("averageVRTemp").is_none());

        let parsed: TrialRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.average_vr_temp, None);
    }

    #[test]
    fn test_ranked_record_is_flat() {
        let ranked = RankedRecord {
            rank: 2,
            record: record(1160, 620, None),
        };
        let json = serde_json::to_value(&ranked).unwrap();
        assert_eq!(json["rank"], 2);
        assert_eq!(json["coreVoltage"], 1160);
    }

    #[test]
    fn test_expected_hashrate() {
        let defaults = DeviceDefaults {
            core_voltage: 1150,
            frequency: 600,
            small_core_count: 2040,
            asic_count: 4,
        };
        // 600 * 8160 / 1000
        assert!((defaults.expected_hashrate(600) - 4896.0).abs() < 1e-9);
        assert_eq!(DeviceDefaults::fallback().expected_hashrate(600), 0.0);
    }

    #[test]
    fn test_abort_reason_codes_match_serde() {
        let reasons = [
            AbortReason::SystemInfoFailure,
            AbortReason::TemperatureBelow5,
            AbortReason::ChipTempExceeded,
            AbortReason::VrTempExceeded,
            AbortReason::PowerConsumptionExceeded,
            AbortReason::Interrupted,
        ];
        for reason in reasons {
            let json = serde_json::to_string(&reason).unwrap();
            assert_eq!(json, format!("\"{}\"", reason.code()));
        }
        assert!(AbortReason::ChipTempExceeded.is_safety_violation());
        assert!(!AbortReason::SystemInfoFailure.is_safety_violation());
    }
}
