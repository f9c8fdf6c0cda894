//! Safe device shutdown
//!
//! **Purpose:** Leave the device on a known-good configuration whatever way
//! the run ends (normal completion, Ctrl-C, unexpected error).
//!
//! **Policy:**
//! - Target is the best recorded candidate, or the device's own defaults when
//!   nothing was recorded
//! - Exactly one restart is issued: through `apply_settings`, or directly when
//!   applying the target failed
//! - Results are persisted whenever any record exists
//! - No settle wait; the process exits right after
//!
//! Runs at most once per session. Later calls return
//! [`ShutdownReport::AlreadyDone`].

use crate::device::DeviceApi;
use crate::tuning::session::SearchSession;
use axetune_common::Candidate;
use std::fmt;
use tracing::{error, info, warn};

/// What ended the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownTrigger {
    Completed,
    Interrupted,
    Failed(String),
}

impl fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownTrigger::Completed => write!(f, "completed"),
            ShutdownTrigger::Interrupted => write!(f, "interrupted"),
            ShutdownTrigger::Failed(message) => write!(f, "failed: {}", message),
        }
    }
}

/// Where the restored settings came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreSource {
    BestResult,
    DeviceDefaults,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReport {
    /// A previous call already reset the device
    AlreadyDone,
    Restored {
        trigger: ShutdownTrigger,
        target: Candidate,
        source: RestoreSource,
        /// Target settings were accepted by the device
        applied: bool,
        /// Structured results file was written
        results_saved: bool,
    },
}

pub struct SafetyShutdown<'a, D: DeviceApi + ?Sized> {
    device: &'a D,
}

impl<'a, D: DeviceApi + ?Sized> SafetyShutdown<'a, D> {
    pub fn new(device: &'a D) -> Self {
        Self { device }
    }

    /// Restore the device and save results, once per session
    pub async fn run(&self, session: &mut SearchSession, trigger: ShutdownTrigger) -> ShutdownReport {
        if !session.begin_reset() {
            info!(trigger = %trigger, "Device already reset, ignoring");
            return ShutdownReport::AlreadyDone;
        }

        match &trigger {
            ShutdownTrigger::Completed => {}
            ShutdownTrigger::Interrupted => {
                warn!("Benchmarking interrupted by user.")
            }
            ShutdownTrigger::Failed(message) => {
                error!("An unexpected error occurred: {}", message)
            }
        }

        let (target, source) = match session.store.best() {
            Some(best) => {
                info!(
                    "Applying best settings: Core Voltage {}mV, Frequency {}MHz ({:.2} GH/s)",
                    best.candidate.core_voltage, best.candidate.frequency, best.average_hash_rate
                );
                (best.candidate, RestoreSource::BestResult)
            }
            None => {
                warn!("No valid benchmarking results found. Applying predefined default settings.");
                (session.defaults.candidate(), RestoreSource::DeviceDefaults)
            }
        };

        let applied = match self.device.apply_settings(target).await {
            Ok(()) => true,
            Err(e) => {
                error!("Error applying {} during shutdown: {}", target, e);
                if let Err(e) = self.device.restart().await {
                    error!("Error restarting system during shutdown: {}", e);
                }
                false
            }
        };

        let results_saved = if session.store.is_empty() {
            false
        } else {
            match session.persist() {
                Ok(()) => true,
                Err(e) => {
                    error!("Error saving results to {}: {}", session.results_path().display(), e);
                    false
                }
            }
        };

        session.finish_reset();

        ShutdownReport::Restored {
            trigger,
            target,
            source,
            applied,
            results_saved,
        }
    }
}
