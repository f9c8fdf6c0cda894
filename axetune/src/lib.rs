//! # Axetune
//!
//! Voltage/frequency auto-tuner for NerdQAxe-class mining boards.
//!
//! **Purpose:** Sweep (core voltage, frequency) candidates over the device's
//! HTTP API, benchmark each one for a fixed sampling window inside a safety
//! envelope, and leave the device on the best stable operating point.
//!
//! **Architecture:** `device` talks to the board; `tuning` owns the trial
//! evaluator, the sweep/fine-tune controller, the result store and the
//! safety shutdown.

pub mod device;
pub mod error;
pub mod tuning;

pub use error::{Error, Result};
