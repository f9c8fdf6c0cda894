//! # Axetune Common Library
//!
//! Shared code for the axetune workspace:
//! - Data model for sweep candidates and trial records
//! - Tuning configuration (TOML loading, defaults, validation)
//! - Common error types

pub mod config;
pub mod error;
pub mod model;

pub use config::TuningConfig;
pub use error::{Error, Result};
pub use model::{AbortReason, Candidate, DeviceDefaults, RankedRecord, TrialRecord};
