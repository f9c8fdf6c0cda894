//! One tuning run, start to finish
//!
//! Runs the selected search and then [`SafetyShutdown`], including when the
//! search panics. A panic becomes [`ShutdownTrigger::Failed`] so the device is
//! never left on the candidate that was under test.

use crate::device::DeviceApi;
use crate::error::{Error, Result};
use crate::tuning::safety::{SafetyShutdown, ShutdownReport, ShutdownTrigger};
use crate::tuning::search::{SearchController, SearchEnd};
use crate::tuning::session::SearchSession;
use axetune_common::{Candidate, TuningConfig};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Frontier sweep from a start candidate
    Coarse(Candidate),
    /// Grid around the best loaded results
    Fine,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// How the search ended, or why it failed
    pub outcome: std::result::Result<SearchEnd, String>,
    pub report: ShutdownReport,
    /// Records held when the run finished
    pub recorded: usize,
}

impl RunSummary {
    /// The search failed and left nothing to fall back on
    pub fn is_failure(&self) -> bool {
        self.outcome.is_err() && self.recorded == 0
    }
}

/// Run `mode` against `device`, then restore the device
///
/// Returns `Err(Error::NoBaseline)` without touching the device when a fine
/// run has no loaded results. Every other ending, panics included, goes
/// through [`SafetyShutdown`] and yields a [`RunSummary`].
pub async fn run_search<D: DeviceApi + ?Sized>(
    device: &D,
    config: &TuningConfig,
    session: &mut SearchSession,
    mode: SearchMode,
) -> Result<RunSummary> {
    let controller = SearchController::new(device, config);
    let search = async {
        match mode {
            SearchMode::Coarse(start) => Ok(controller.coarse_sweep(session, start).await),
            SearchMode::Fine => controller.fine_tune(session).await,
        }
    };

    let outcome = match AssertUnwindSafe(search).catch_unwind().await {
        Ok(Ok(end)) => Ok(end),
        Ok(Err(Error::NoBaseline)) => return Err(Error::NoBaseline),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!("Search panicked: {}", message);
            Err(message)
        }
    };

    let trigger = match &outcome {
        Ok(SearchEnd::Interrupted) => ShutdownTrigger::Interrupted,
        Ok(_) => ShutdownTrigger::Completed,
        Err(message) => ShutdownTrigger::Failed(message.clone()),
    };
    let report = SafetyShutdown::new(device).run(session, trigger).await;

    Ok(RunSummary {
        outcome,
        report,
        recorded: session.store.len(),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
