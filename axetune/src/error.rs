//! Error types for axetune
//!
//! Device transport failures have their own type ([`crate::device::DeviceError`])
//! so the trial evaluator can branch on them without unwinding the run.

use crate::device::DeviceError;
use thiserror::Error;

/// Main error type for the axetune library
#[derive(Error, Debug)]
pub enum Error {
    /// Config, input validation and shared I/O errors
    #[error(transparent)]
    Common(#[from] axetune_common::Error),

    /// Device communication error that could not be handled locally
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Results file I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Results file encode/decode errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Fine-tune requested without prior results
    #[error("No previous results loaded. Cannot fine-tune without baseline data")]
    NoBaseline,

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using axetune Error
pub type Result<T> = std::result::Result<T, Error>;
