//! Device transport errors

use thiserror::Error;

/// Failure talking to the device API
///
/// Never escapes the tuning layer as a panic; callers branch on it and decide
/// whether to abort the current trial.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("HTTP error {status}")]
    Http { status: u16 },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Request error: {0}")]
    Request(String),
}

impl DeviceError {
    /// Timeouts and connection failures are worth another attempt; anything
    /// else will fail the same way again
    pub fn is_retriable(&self) -> bool {
        matches!(self, DeviceError::Timeout(_) | DeviceError::Connection(_))
    }
}

impl From<reqwest::Error> for DeviceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DeviceError::Timeout(e.to_string())
        } else if e.is_connect() {
            DeviceError::Connection(e.to_string())
        } else if let Some(status) = e.status() {
            DeviceError::Http {
                status: status.as_u16(),
            }
        } else if e.is_decode() {
            DeviceError::Decode(e.to_string())
        } else {
            DeviceError::Request(e.to_string())
        }
    }
}
