//! Candidate search: coarse frontier sweep and fine-tune grid
//!
//! **Purpose:** Decide which (voltage, frequency) to try next, run each one
//! through the trial evaluator, and feed completed trials to the session.
//!
//! **Coarse sweep policy** (from the start candidate, while both values are
//! within their maxima):
//! - Already tested: step frequency up; at the frequency ceiling wrap to the
//!   minimum frequency one voltage step higher; at both ceilings stop
//! - Within tolerance: step frequency up, or stop at the ceiling
//! - Below tolerance: one voltage step up with frequency one step down
//!   (floored at the minimum), or stop at the voltage ceiling
//! - Aborted: stop, the device's thermal or stability ceiling was reached
//!
//! The policy walks a voltage/frequency frontier rather than the full grid.
//!
//! **Fine-tune:** try a 3×3 grid of small voltage/frequency offsets around
//! each of the top performers of a previous run.

use crate::device::DeviceApi;
use crate::error::{Error, Result};
use crate::tuning::session::SearchSession;
use crate::tuning::store::Ranking;
use crate::tuning::trial::{TrialEvaluator, TrialOutcome};
use axetune_common::config::{Bounds, SearchConfig};
use axetune_common::{AbortReason, Candidate, TuningConfig};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use tracing::{error, info, warn};

/// Why a search stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchEnd {
    /// No candidates left under the policy
    Exhausted,
    /// A trial aborted; the sweep treats this as the device's limit
    CeilingReached(AbortReason),
    /// Cancellation was observed
    Interrupted,
}

impl fmt::Display for SearchEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchEnd::Exhausted => write!(f, "no remaining combinations"),
            SearchEnd::CeilingReached(reason) => {
                write!(f, "reached thermal or stability limits ({})", reason)
            }
            SearchEnd::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Frequency one step up, if still within bounds
pub fn next_after_pass(current: Candidate, search: &SearchConfig, bounds: &Bounds) -> Option<Candidate> {
    let frequency = current.frequency.checked_add(search.frequency_increment)?;
    (frequency <= bounds.max_frequency_mhz).then(|| Candidate::new(current.core_voltage, frequency))
}

/// Next candidate after skipping an already tested one
pub fn next_after_skip(current: Candidate, search: &SearchConfig, bounds: &Bounds) -> Option<Candidate> {
    next_after_pass(current, search, bounds).or_else(|| {
        let voltage = current.core_voltage.checked_add(search.voltage_increment)?;
        (voltage <= bounds.max_voltage_mv).then(|| Candidate::new(voltage, bounds.min_frequency_mhz))
    })
}

/// More voltage headroom at a slightly lower frequency
pub fn next_after_shortfall(current: Candidate, search: &SearchConfig, bounds: &Bounds) -> Option<Candidate> {
    let voltage = current.core_voltage.checked_add(search.voltage_increment)?;
    if voltage > bounds.max_voltage_mv {
        return None;
    }
    let frequency = current
        .frequency
        .saturating_sub(search.frequency_increment)
        .max(bounds.min_frequency_mhz);
    Some(Candidate::new(voltage, frequency))
}

/// In-bounds points of the 3×3 grid around `center`
///
/// Order: voltage offset (-, 0, +) outer, frequency offset (-, 0, +) inner.
pub fn fine_tune_grid(center: Candidate, search: &SearchConfig, bounds: &Bounds) -> Vec<Candidate> {
    let dv = i64::from(search.fine_tune_voltage_step);
    let df = i64::from(search.fine_tune_frequency_step);

    let mut grid = Vec::with_capacity(9);
    for voltage_offset in [-dv, 0, dv] {
        for frequency_offset in [-df, 0, df] {
            let voltage = u32::try_from(i64::from(center.core_voltage) + voltage_offset);
            let frequency = u32::try_from(i64::from(center.frequency) + frequency_offset);
            if let (Ok(voltage), Ok(frequency)) = (voltage, frequency) {
                let candidate = Candidate::new(voltage, frequency);
                if bounds.contains(candidate) {
                    grid.push(candidate);
                }
            }
        }
    }
    grid
}

/// Drives trials against one device
pub struct SearchController<'a, D: DeviceApi + ?Sized> {
    device: &'a D,
    config: &'a TuningConfig,
}

impl<'a, D: DeviceApi + ?Sized> SearchController<'a, D> {
    pub fn new(device: &'a D, config: &'a TuningConfig) -> Self {
        Self { device, config }
    }

    /// Apply `candidate` and wait for the device to settle
    async fn apply_and_settle(&self, session: &SearchSession, candidate: Candidate) -> std::result::Result<(), AbortReason> {
        let cancel = session.cancel_token();

        let applied = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AbortReason::Interrupted),
            applied = self.device.apply_settings(candidate) => applied,
        };
        if let Err(e) = applied {
            error!("Error setting system settings for {}: {}", candidate, e);
            return Err(AbortReason::SettingsApplyFailure);
        }

        let settle = Duration::from_millis(self.config.benchmark.settle_ms);
        if !settle.is_zero() {
            info!("Waiting {}s for system stabilization...", settle.as_secs());
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AbortReason::Interrupted),
                _ = tokio::time::sleep(settle) => {}
            }
        }
        Ok(())
    }

    /// Apply, settle and benchmark one candidate
    pub async fn evaluate(&self, session: &SearchSession, candidate: Candidate) -> TrialOutcome {
        if let Err(reason) = self.apply_and_settle(session, candidate).await {
            return TrialOutcome::Aborted(reason);
        }

        let expected = session.defaults.expected_hashrate(candidate.frequency);
        TrialEvaluator::new(self.device, self.config, session.cancel_token())
            .run_trial(candidate, expected)
            .await
    }

    /// Frontier sweep from `start`
    pub async fn coarse_sweep(&self, session: &mut SearchSession, start: Candidate) -> SearchEnd {
        let search = &self.config.search;
        let bounds = &self.config.bounds;
        let mut current = start;

        while current.core_voltage <= bounds.max_voltage_mv && current.frequency <= bounds.max_frequency_mhz {
            if session.is_cancelled() {
                return SearchEnd::Interrupted;
            }

            if session.store.contains(current) {
                info!("[SKIP] Already tested: {}", current);
                match next_after_skip(current, search, bounds) {
                    Some(next) => {
                        current = next;
                        continue;
                    }
                    None => {
                        info!("Benchmark complete. No remaining combinations.");
                        return SearchEnd::Exhausted;
                    }
                }
            }

            info!("[RUN] Testing: {}", current);
            let measurement = match self.evaluate(session, current).await {
                TrialOutcome::Completed(measurement) => measurement,
                TrialOutcome::Aborted(AbortReason::Interrupted) => return SearchEnd::Interrupted,
                TrialOutcome::Aborted(reason) => {
                    info!(reason = %reason, "Reached thermal or stability limits. Stopping further testing.");
                    return SearchEnd::CeilingReached(reason);
                }
            };

            let within_tolerance = measurement.within_tolerance;
            session.record(measurement.record);

            let next = if within_tolerance {
                next_after_pass(current, search, bounds)
            } else {
                let next = next_after_shortfall(current, search, bounds);
                if let Some(next) = next {
                    warn!(
                        "Hashrate too low. Retry with higher voltage {}mV at {}MHz.",
                        next.core_voltage, next.frequency
                    );
                }
                next
            };

            match next {
                Some(next) => current = next,
                None => return SearchEnd::Exhausted,
            }
        }

        SearchEnd::Exhausted
    }

    /// Trial the neighbourhood of the best previous results
    ///
    /// Needs a non-empty store. Unstable trials are logged and not recorded;
    /// each point is tried at most once per run.
    pub async fn fine_tune(&self, session: &mut SearchSession) -> Result<SearchEnd> {
        if session.store.is_empty() {
            return Err(Error::NoBaseline);
        }

        let search = &self.config.search;
        let top = session.store.top_k(search.fine_tune_top_k, Ranking::Hashrate);
        let total = top.len() * 9;
        info!("[FINE] Starting fine-tuning phase on {} top performers...", top.len());

        let mut attempted = HashSet::new();
        let mut task = 1;
        for entry in &top {
            for candidate in fine_tune_grid(entry.record.candidate, search, &self.config.bounds) {
                if session.store.contains(candidate) || !attempted.insert(candidate) {
                    continue;
                }
                if session.is_cancelled() {
                    return Ok(SearchEnd::Interrupted);
                }

                info!("[{}/{}] [FINE] Testing: {}", task, total, candidate);
                task += 1;

                match self.evaluate(session, candidate).await {
                    TrialOutcome::Completed(measurement) => {
                        session.record(measurement.record);
                    }
                    TrialOutcome::Aborted(AbortReason::Interrupted) => return Ok(SearchEnd::Interrupted),
                    TrialOutcome::Aborted(reason) => {
                        warn!(reason = %reason, "[FINE] Skipping unstable result at {}", candidate)
                    }
                }
            }
        }

        Ok(SearchEnd::Exhausted)
    }
}
