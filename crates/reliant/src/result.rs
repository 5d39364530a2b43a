//! Result and error types for Reliant.
//!
//! A navigation timing out is not an error: it is reported through
//! [`crate::Outcome::TimedOut`]. The variants here cover misuse of the
//! harness and failures to bring the dispatcher or an engine up.

use thiserror::Error;

/// Result type for Reliant operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors that can occur in Reliant
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A navigation is still pending on the completion gate
    #[error("Navigation to {url} is still in flight; wait for it before starting another")]
    NavigationInFlight {
        /// URL of the navigation that has not finished
        url: String,
    },

    /// The blocking wait was called from the dispatcher thread
    #[error("wait_until_done called from the dispatcher thread; this would deadlock")]
    WaitOnDispatcher,

    /// The harness has shut down (empty URL, explicit shutdown, or dispatcher exit)
    #[error("Harness has shut down")]
    ShutDown,

    /// The dispatcher thread could not be started
    #[error("Failed to start dispatcher: {message}")]
    DispatcherSpawn {
        /// Error message
        message: String,
    },

    /// Rendering engine could not be created
    #[error("Failed to launch rendering engine: {message}")]
    EngineLaunch {
        /// Error message
        message: String,
    },

    /// Configuration rejected by validation
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HarnessError {
    /// Create an engine launch error
    #[must_use]
    pub fn engine_launch(message: impl Into<String>) -> Self {
        Self::EngineLaunch {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
