//! Run state shared by the search controller and the safety shutdown

use crate::error::Result;
use crate::tuning::store::ResultStore;
use axetune_common::{DeviceDefaults, TrialRecord};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Progress of the one-shot device reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetState {
    Armed,
    Resetting,
    Done,
}

/// Everything that lives for the duration of one tuning run
#[derive(Debug)]
pub struct SearchSession {
    pub store: ResultStore,

    /// Settings read from the device at startup (or the fallback)
    pub defaults: DeviceDefaults,

    results_path: PathBuf,
    cancel: CancellationToken,
    reset: ResetState,
}

impl SearchSession {
    pub fn new(defaults: DeviceDefaults, results_path: PathBuf, cancel: CancellationToken) -> Self {
        Self {
            store: ResultStore::new(),
            defaults,
            results_path,
            cancel,
            reset: ResetState::Armed,
        }
    }

    pub fn results_path(&self) -> &Path {
        &self.results_path
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn reset_state(&self) -> ResetState {
        self.reset
    }

    /// Claim the reset; only the first caller gets `true`
    pub fn begin_reset(&mut self) -> bool {
        if self.reset != ResetState::Armed {
            return false;
        }
        self.reset = ResetState::Resetting;
        true
    }

    pub fn finish_reset(&mut self) {
        self.reset = ResetState::Done;
    }

    /// Add a completed trial and checkpoint the record list
    ///
    /// A failed checkpoint is logged; the run goes on.
    pub fn record(&mut self, record: TrialRecord) -> bool {
        if !self.store.add(record) {
            return false;
        }
        if let Err(e) = self.store.checkpoint(&self.results_path) {
            warn!("Failed to checkpoint results to {}: {}", self.results_path.display(), e);
        }
        true
    }

    /// Write the final structured results file
    pub fn persist(&self) -> Result<()> {
        self.store.persist(&self.results_path)
    }

    /// Merge a previous run's results file into the store
    pub fn resume(&mut self) -> Result<usize> {
        self.store.load_for_resume(&self.results_path)
    }
}
