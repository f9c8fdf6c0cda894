//! Single-candidate benchmark trial
//!
//! **Purpose:** Sample the device for one fixed-duration window at an already
//! applied candidate, enforce the safety envelope on every sample, and reduce
//! the window to a [`TrialOutcome`].
//!
//! **Algorithm:**
//! 1. `total = duration / interval` samples, one per interval, no sleep after
//!    the last one
//! 2. Each sample goes through [`check_sample`]; the first violation aborts
//!    the trial and discards everything collected so far
//! 3. A full window is reduced by [`SampleWindow::reduce`]
//!
//! Cancellation is observed while waiting for telemetry and between samples.

use crate::device::{DeviceApi, Sample};
use crate::tuning::metrics::{Measurement, Reading, SampleWindow};
use axetune_common::config::SafetyLimits;
use axetune_common::{AbortReason, Candidate, TrialRecord, TuningConfig};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Tagged result of one trial
#[derive(Debug, Clone, PartialEq)]
pub enum TrialOutcome {
    Completed(Measurement),
    Aborted(AbortReason),
}

impl TrialOutcome {
    pub fn record(&self) -> Option<&TrialRecord> {
        match self {
            TrialOutcome::Completed(m) => Some(&m.record),
            TrialOutcome::Aborted(_) => None,
        }
    }

    pub fn abort_reason(&self) -> Option<AbortReason> {
        match self {
            TrialOutcome::Completed(_) => None,
            TrialOutcome::Aborted(reason) => Some(*reason),
        }
    }

    pub fn within_tolerance(&self) -> bool {
        matches!(self, TrialOutcome::Completed(m) if m.within_tolerance)
    }
}

/// Apply the per-sample safety checks in their fixed order
///
/// Order: chip temp present, plausible, below max; VR temp below max; input
/// voltage present, above min, below max; hashrate and power present; power
/// below max.
pub fn check_sample(sample: &Sample, limits: &SafetyLimits) -> Result<Reading, AbortReason> {
    let temp = sample.temp.ok_or(AbortReason::TemperatureDataFailure)?;
    if temp < limits.min_plausible_temp_c {
        return Err(AbortReason::TemperatureBelow5);
    }
    if temp >= limits.max_temp_c {
        return Err(AbortReason::ChipTempExceeded);
    }
    if let Some(vr_temp) = sample.vr_temp {
        if vr_temp >= limits.max_vr_temp_c {
            return Err(AbortReason::VrTempExceeded);
        }
    }

    let input_voltage = sample
        .input_voltage
        .ok_or(AbortReason::InputVoltageDataFailure)?;
    if input_voltage < limits.min_input_voltage_mv {
        return Err(AbortReason::InputVoltageBelowMin);
    }
    if input_voltage > limits.max_input_voltage_mv {
        return Err(AbortReason::InputVoltageAboveMax);
    }

    let (hash_rate, power) = match (sample.hash_rate, sample.power) {
        (Some(hash_rate), Some(power)) => (hash_rate, power),
        _ => return Err(AbortReason::HashratePowerDataFailure),
    };
    if power > limits.max_power_w {
        return Err(AbortReason::PowerConsumptionExceeded);
    }

    Ok(Reading {
        hash_rate,
        temp,
        vr_temp: sample.vr_temp,
        power,
        input_voltage,
    })
}

/// Runs sampling windows against a device
pub struct TrialEvaluator<'a, D: DeviceApi + ?Sized> {
    device: &'a D,
    config: &'a TuningConfig,
    cancel: &'a CancellationToken,
}

impl<'a, D: DeviceApi + ?Sized> TrialEvaluator<'a, D> {
    pub fn new(device: &'a D, config: &'a TuningConfig, cancel: &'a CancellationToken) -> Self {
        Self {
            device,
            config,
            cancel,
        }
    }

    /// Benchmark `candidate`, which must already be applied and settled
    pub async fn run_trial(&self, candidate: Candidate, expected_hashrate: f64) -> TrialOutcome {
        let bench = &self.config.benchmark;
        let total_samples = bench.total_samples() as usize;
        let interval = Duration::from_millis(bench.sample_interval_ms);
        let mut window = SampleWindow::with_capacity(total_samples);

        info!(
            "Starting benchmark for Core Voltage: {}mV, Frequency: {}MHz",
            candidate.core_voltage, candidate.frequency
        );

        for index in 0..total_samples {
            let sample = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return TrialOutcome::Aborted(AbortReason::Interrupted),
                sample = self.device.read_status() => sample,
            };

            let sample = match sample {
                Ok(sample) => sample,
                Err(e) => {
                    warn!(
                        "Skipping this iteration due to failure in fetching system info: {}",
                        e
                    );
                    return TrialOutcome::Aborted(AbortReason::SystemInfoFailure);
                }
            };

            let reading = match check_sample(&sample, &self.config.safety) {
                Ok(reading) => reading,
                Err(reason) => {
                    self.log_abort(reason, index + 1);
                    return TrialOutcome::Aborted(reason);
                }
            };
            window.push(reading);
            log_progress(candidate, &reading, index + 1, total_samples);

            if index + 1 < total_samples {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return TrialOutcome::Aborted(AbortReason::Interrupted),
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        }

        match window.reduce(candidate, expected_hashrate, bench) {
            Ok(measurement) => {
                let r = &measurement.record;
                info!(
                    "Average Hashrate: {:.2} GH/s (Expected: {:.2} GH/s)",
                    r.average_hash_rate, measurement.expected_hashrate
                );
                info!("Average Temperature: {:.2}°C", r.average_temperature);
                if let Some(vr) = r.average_vr_temp {
                    info!("Average VR Temperature: {:.2}°C", vr);
                }
                info!("Efficiency: {:.2} J/TH", r.efficiency_jth);
                TrialOutcome::Completed(measurement)
            }
            Err(reason) => {
                match reason {
                    AbortReason::ZeroHashrate => {
                        error!("Zero hashrate detected, skipping efficiency calculation")
                    }
                    _ => warn!("No Hashrate or Temperature or Watts data collected."),
                }
                TrialOutcome::Aborted(reason)
            }
        }
    }

    fn log_abort(&self, reason: AbortReason, sample: usize) {
        let limits = &self.config.safety;
        match reason {
            AbortReason::TemperatureDataFailure => warn!(sample, "Temperature data not available."),
            AbortReason::TemperatureBelow5 => warn!(
                sample,
                "Temperature is below {}°C. This is unexpected. Please check the system.",
                limits.min_plausible_temp_c
            ),
            AbortReason::ChipTempExceeded => error!(
                sample,
                "Chip temperature exceeded {}°C! Stopping current benchmark.", limits.max_temp_c
            ),
            AbortReason::VrTempExceeded => error!(
                sample,
                "Voltage regulator temperature exceeded {}°C! Stopping current benchmark.",
                limits.max_vr_temp_c
            ),
            AbortReason::InputVoltageDataFailure => {
                warn!(sample, "Input voltage data not available.")
            }
            AbortReason::InputVoltageBelowMin => error!(
                sample,
                "Input voltage is below the minimum allowed value of {}mV! Stopping current benchmark.",
                limits.min_input_voltage_mv
            ),
            AbortReason::InputVoltageAboveMax => error!(
                sample,
                "Input voltage is above the maximum allowed value of {}mV! Stopping current benchmark.",
                limits.max_input_voltage_mv
            ),
            AbortReason::HashratePowerDataFailure => {
                warn!(sample, "Hashrate or Watts data not available.")
            }
            AbortReason::PowerConsumptionExceeded => error!(
                sample,
                "Power consumption exceeded {}W! Stopping current benchmark.", limits.max_power_w
            ),
            other => warn!(sample, reason = %other, "Trial aborted"),
        }
    }
}

fn log_progress(candidate: Candidate, reading: &Reading, sample: usize, total: usize) {
    let percent = sample as f64 / total as f64 * 100.0;
    let vr = reading
        .vr_temp
        .filter(|vr| *vr > 0.0)
        .map(|vr| format!(" | VR: {:2}°C", vr as i64))
        .unwrap_or_default();
    info!(
        "[{:2}/{:2}] {:5.1}% | CV: {:4}mV | F: {:4}MHz | H: {:4} GH/s | IV: {:4}mV | T: {:2}°C{}",
        sample,
        total,
        percent,
        candidate.core_voltage,
        candidate.frequency,
        reading.hash_rate as i64,
        reading.input_voltage as i64,
        reading.temp as i64,
        vr
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceError;
    use crate::tuning::test_support::{fast_config, healthy_sample, ScriptedDevice};

    fn limits() -> SafetyLimits {
        SafetyLimits::default()
    }

    #[test]
    fn test_check_sample_accepts_healthy() {
        let reading = check_sample(&healthy_sample(1_000.0), &limits()).unwrap();
        assert_eq!(reading.hash_rate, 1_000.0);
        assert_eq!(reading.vr_temp, Some(55.0));
    }

    #[test]
    fn test_check_sample_violations() {
        let base = healthy_sample(1_000.0);
        let cases = [
            (Sample { temp: None, ..base }, AbortReason::TemperatureDataFailure),
            (Sample { temp: Some(4.9), ..base }, AbortReason::TemperatureBelow5),
            (Sample { temp: Some(68.0), ..base }, AbortReason::ChipTempExceeded),
            (Sample { vr_temp: Some(85.0), ..base }, AbortReason::VrTempExceeded),
            (Sample { input_voltage: None, ..base }, AbortReason::InputVoltageDataFailure),
            (Sample { input_voltage: Some(11_599.0), ..base }, AbortReason::InputVoltageBelowMin),
            (Sample { input_voltage: Some(12_001.0), ..base }, AbortReason::InputVoltageAboveMax),
            (Sample { hash_rate: None, ..base }, AbortReason::HashratePowerDataFailure),
            (Sample { power: None, ..base }, AbortReason::HashratePowerDataFailure),
            (Sample { power: Some(100.5), ..base }, AbortReason::PowerConsumptionExceeded),
        ];

        for (sample, expected) in cases {
            assert_eq!(check_sample(&sample, &limits()), Err(expected), "{sample:?}");
        }
    }

    #[test]
    fn test_check_order_temperature_before_power() {
        // Both chip temp and power out of range: chip temp wins
        let sample = Sample {
            temp: Some(70.0),
            power: Some(150.0),
            ..healthy_sample(1_000.0)
        };
        assert_eq!(check_sample(&sample, &limits()), Err(AbortReason::ChipTempExceeded));
    }

    #[test]
    fn test_boundary_values_pass() {
        let sample = Sample {
            temp: Some(67.9),
            vr_temp: None,
            input_voltage: Some(12_000.0),
            power: Some(100.0),
            ..healthy_sample(1_000.0)
        };
        assert!(check_sample(&sample, &limits()).is_ok());
    }

    #[tokio::test]
    async fn test_full_window_completes() {
        let config = fast_config();
        let cancel = CancellationToken::new();
        let device = ScriptedDevice::steady(|c| f64::from(c.frequency));

        let outcome = TrialEvaluator::new(&device, &config, &cancel)
            .run_trial(Candidate::new(1150, 600), 600.0)
            .await;

        let record = outcome.record().expect("trial should complete");
        assert_eq!(record.average_hash_rate, 600.0);
        assert!(outcome.within_tolerance());
        assert_eq!(outcome.abort_reason(), None);
    }

    #[tokio::test]
    async fn test_chip_temp_aborts_at_offending_sample() {
        let config = fast_config();
        let cancel = CancellationToken::new();
        let device = ScriptedDevice::new(|_, index| {
            let mut sample = healthy_sample(600.0);
            if index == 4 {
                sample.temp = Some(70.0);
            }
            Ok(sample)
        });

        let outcome = TrialEvaluator::new(&device, &config, &cancel)
            .run_trial(Candidate::new(1150, 600), 600.0)
            .await;

        assert_eq!(outcome, TrialOutcome::Aborted(AbortReason::ChipTempExceeded));
        assert_eq!(outcome.record(), None);
    }

    #[tokio::test]
    async fn test_read_failure_aborts() {
        let config = fast_config();
        let cancel = CancellationToken::new();
        let device = ScriptedDevice::new(|_, index| {
            if index == 2 {
                Err(DeviceError::Timeout("read".into()))
            } else {
                Ok(healthy_sample(600.0))
            }
        });

        let outcome = TrialEvaluator::new(&device, &config, &cancel)
            .run_trial(Candidate::new(1150, 600), 600.0)
            .await;
        assert_eq!(outcome, TrialOutcome::Aborted(AbortReason::SystemInfoFailure));
    }

    #[tokio::test]
    async fn test_low_hashrate_is_out_of_tolerance() {
        let config = fast_config();
        let cancel = CancellationToken::new();
        let device = ScriptedDevice::steady(|_| 500.0);

        let outcome = TrialEvaluator::new(&device, &config, &cancel)
            .run_trial(Candidate::new(1150, 600), 600.0)
            .await;

        assert!(outcome.record().is_some());
        assert!(!outcome.within_tolerance());
    }

    #[tokio::test]
    async fn test_zero_hashrate_aborts() {
        let config = fast_config();
        let cancel = CancellationToken::new();
        let device = ScriptedDevice::steady(|_| 0.0);

        let outcome = TrialEvaluator::new(&device, &config, &cancel)
            .run_trial(Candidate::new(1150, 600), 600.0)
            .await;
        assert_eq!(outcome, TrialOutcome::Aborted(AbortReason::ZeroHashrate));
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_trial() {
        let config = fast_config();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let device = ScriptedDevice::new(move |_, index| {
            if index == 3 {
                trigger.cancel();
            }
            Ok(healthy_sample(600.0))
        });

        let outcome = TrialEvaluator::new(&device, &config, &cancel)
            .run_trial(Candidate::new(1150, 600), 600.0)
            .await;
        assert_eq!(outcome, TrialOutcome::Aborted(AbortReason::Interrupted));
    }
}
