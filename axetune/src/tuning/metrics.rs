//! Sample reduction for a benchmark trial
//!
//! **Purpose:** Turn a window of per-sample readings into one
//! [`TrialRecord`] plus the tolerance verdict.
//!
//! **Reduction rules:**
//! - Hashrate: drop the `hashrate_trim` lowest and highest samples (transient
//!   spikes), then average
//! - Chip and VR temperature: drop the `temperature_trim` lowest samples
//!   (warm-up), then average
//! - Power: plain average
//! - Efficiency: `avg_power / (avg_hashrate / 1000)` in J/TH, undefined for a
//!   non-positive hashrate

use axetune_common::config::BenchmarkConfig;
use axetune_common::{AbortReason, Candidate, TrialRecord};

/// One sample that passed every safety check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub hash_rate: f64,
    pub temp: f64,
    pub vr_temp: Option<f64>,
    pub power: f64,
    pub input_voltage: f64,
}

/// Result of a completed trial
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub record: TrialRecord,

    /// Nominal hashrate the trial was judged against (GH/s)
    pub expected_hashrate: f64,

    /// `average_hash_rate >= expected_hashrate * tolerance`
    pub within_tolerance: bool,
}

/// Readings collected during one trial
#[derive(Debug, Clone, Default)]
pub struct SampleWindow {
    hash_rates: Vec<f64>,
    temperatures: Vec<f64>,
    vr_temps: Vec<f64>,
    powers: Vec<f64>,
}

impl SampleWindow {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            hash_rates: Vec::with_capacity(capacity),
            temperatures: Vec::with_capacity(capacity),
            vr_temps: Vec::with_capacity(capacity),
            powers: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, reading: Reading) {
        self.hash_rates.push(reading.hash_rate);
        self.temperatures.push(reading.temp);
        self.powers.push(reading.power);
        // Boards without a VR sensor report 0
        if let Some(vr) = reading.vr_temp.filter(|vr| *vr > 0.0) {
            self.vr_temps.push(vr);
        }
    }

    pub fn len(&self) -> usize {
        self.hash_rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hash_rates.is_empty()
    }

    /// Reduce the window to averages and a tolerance verdict
    pub fn reduce(
        &self,
        candidate: Candidate,
        expected_hashrate: f64,
        config: &BenchmarkConfig,
    ) -> Result<Measurement, AbortReason> {
        let trimmed_hashrates = trim_sorted(&self.hash_rates, config.hashrate_trim, config.hashrate_trim);
        let average_hash_rate = mean(&trimmed_hashrates).ok_or(AbortReason::NoDataCollected)?;

        let trimmed_temps = trim_sorted(&self.temperatures, config.temperature_trim, 0);
        let average_temperature = mean(&trimmed_temps).ok_or(AbortReason::NoDataCollected)?;

        let average_vr_temp = mean(&trim_sorted(&self.vr_temps, config.temperature_trim, 0));
        let average_power = mean(&self.powers).ok_or(AbortReason::NoDataCollected)?;

        let efficiency_jth =
            efficiency_jth(average_power, average_hash_rate).ok_or(AbortReason::ZeroHashrate)?;

        Ok(Measurement {
            record: TrialRecord {
                candidate,
                average_hash_rate,
                average_temperature,
                efficiency_jth,
                average_vr_temp,
            },
            expected_hashrate,
            within_tolerance: within_tolerance(average_hash_rate, expected_hashrate, config.tolerance),
        })
    }
}

/// Sort ascending and drop `drop_low` values from the bottom and `drop_high`
/// from the top; empty if nothing remains
pub fn trim_sorted(values: &[f64], drop_low: usize, drop_high: usize) -> Vec<f64> {
    if drop_low + drop_high >= values.len() {
        return Vec::new();
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted[drop_low..sorted.len() - drop_high].to_vec()
}

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// J/TH from average watts and average GH/s; `None` when hashrate ≤ 0
pub fn efficiency_jth(average_power: f64, average_hash_rate: f64) -> Option<f64> {
    if average_hash_rate > 0.0 {
        Some(average_power / (average_hash_rate / 1_000.0))
    } else {
        None
    }
}

pub fn within_tolerance(average_hash_rate: f64, expected_hashrate: f64, tolerance: f64) -> bool {
    average_hash_rate >= expected_hashrate * tolerance
}
