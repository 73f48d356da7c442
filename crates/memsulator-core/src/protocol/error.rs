//! Protocol errors

use std::time::Duration;
use thiserror::Error;

use super::Frame;

/// Errors that can occur while talking to the ECU or standing in for it
#[derive(Error, Debug)]
pub enum MemsError {
    /// The device could not be opened
    #[error("Failed to open {device}: {reason}")]
    TransportOpen {
        /// Device name
        device: String,
        /// Driver message
        reason: String,
    },

    /// A read or write failed mid-session
    #[error("Serial I/O error: {0}")]
    TransportIo(#[from] std::io::Error),

    /// No link is open
    #[error("Not connected to ECU")]
    NotConnected,

    /// The ECU did not answer in time
    #[error("No response to {command} within {}ms", timeout.as_millis())]
    ResponseTimeout {
        /// Frame that went unanswered
        command: Frame,
        /// Bound that elapsed
        timeout: Duration,
    },

    /// A handshake step got the wrong reply
    #[error("Unexpected response: expected {expected}, got {actual}")]
    UnexpectedResponse {
        /// Reply the handshake called for
        expected: Frame,
        /// Reply received
        actual: Frame,
    },

    /// The loopback pair could not be created or removed
    #[error("Loopback provisioning failed: {0}")]
    Provisioning(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MemsError {
    /// True for failures of the device itself, as opposed to the ECU staying quiet
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            MemsError::TransportOpen { .. } | MemsError::TransportIo(_)
        )
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, MemsError>;
