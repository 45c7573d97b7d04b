//! Error types for fleetboot-exec

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to a remote host
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Host unreachable or the transport could not be established
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Credentials rejected by the remote host
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Command timed out
    #[error("command timed out after {timeout:?}")]
    Timeout {
        /// Timeout duration that was exceeded
        timeout: Duration,
    },

    /// SSH key error
    #[error("SSH key error: {0}")]
    SshKeyError(String),

    /// Local process spawn error
    #[error("failed to spawn process: {0}")]
    SpawnError(String),

    /// I/O error on an open channel
    #[error("I/O error: {0}")]
    IoError(String),

    /// Session already closed
    #[error("not connected")]
    NotConnected,

    /// File copy refused by the remote side
    #[error("file transfer to {path} failed: {reason}")]
    TransferFailed {
        /// Remote destination path
        path: String,
        /// Remote output or transport error
        reason: String,
    },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    ConfigError(String),
}

impl ExecError {
    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExecError::ConnectionFailed(_) | ExecError::Timeout { .. }
        )
    }

    /// Whether the error happened before a session existed, i.e. the host is down
    /// or refused us
    #[must_use]
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            ExecError::ConnectionFailed(_)
                | ExecError::AuthenticationFailed(_)
                | ExecError::SshKeyError(_)
        )
    }
}
