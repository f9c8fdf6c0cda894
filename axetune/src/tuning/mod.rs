//! # Voltage/Frequency Tuning
//!
//! Finds the best stable (core voltage, frequency) operating point for the
//! device.
//!
//! **Purpose:** Benchmark candidates one at a time inside a safety envelope
//! and leave the device on the best one found.
//!
//! **Algorithm:** Two modes:
//! - Coarse sweep: walk a voltage/frequency frontier from a start candidate
//! - Fine-tune: trial a small grid around the top results of an earlier run
//!
//! Every exit path, a panicking search included, goes through
//! [`SafetyShutdown`] via [`run_search`].

pub mod metrics;
pub mod report;
pub mod runner;
pub mod safety;
pub mod search;
pub mod session;
pub mod store;
pub mod trial;

#[cfg(test)]
mod test_support;

pub use metrics::{Measurement, Reading, SampleWindow};
pub use report::CliFormatter;
pub use runner::{run_search, RunSummary, SearchMode};
pub use safety::{RestoreSource, SafetyShutdown, ShutdownReport, ShutdownTrigger};
pub use search::{SearchController, SearchEnd};
pub use session::{ResetState, SearchSession};
pub use store::{backup_results_file, Ranking, ResultStore, ResultsDocument, ResultsFile};
pub use trial::{check_sample, TrialEvaluator, TrialOutcome};
