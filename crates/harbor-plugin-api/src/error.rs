//! Plugin error types

use std::fmt;

/// Plugin error type
///
/// Errors a plugin reports back to the host: lifecycle failures, transport
/// faults, and the two distinguishable action-abort causes (cancellation
/// and timeout).
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// Activation failed
    #[error("Activation failed: {0}")]
    ActivationError(String),

    /// Deactivation failed
    #[error("Deactivation failed: {0}")]
    DeactivationError(String),

    /// Transport-level failure while executing a device action
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Protocol-level failure (device responded, but not usably)
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Task execution failed
    #[error("Task error: {0}")]
    TaskError(String),

    /// The action was cancelled before it completed
    ///
    /// Distinct from [`PluginError::Timeout`]: a cancelled call must never
    /// be reported as a timeout, even if the deadline also elapsed.
    #[error("Action cancelled")]
    Cancelled,

    /// The action did not complete within its deadline
    #[error("Action timed out after {0} ms")]
    Timeout(u64),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

/// Result type for plugin operations
pub type Result<T> = std::result::Result<T, PluginError>;

impl PluginError {
    /// Create a new activation error
    pub fn activation(msg: impl fmt::Display) -> Self {
        Self::ActivationError(msg.to_string())
    }

    /// Create a new deactivation error
    pub fn deactivation(msg: impl fmt::Display) -> Self {
        Self::DeactivationError(msg.to_string())
    }

    /// Create a new transport error
    pub fn transport(msg: impl fmt::Display) -> Self {
        Self::TransportError(msg.to_string())
    }

    /// Create a new protocol error
    pub fn protocol(msg: impl fmt::Display) -> Self {
        Self::ProtocolError(msg.to_string())
    }

    /// Create a new task error
    pub fn task(msg: impl fmt::Display) -> Self {
        Self::TaskError(msg.to_string())
    }

    /// Check whether this error is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check whether this error is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
