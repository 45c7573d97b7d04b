//! Core error types for fleetboot-core

use fleetboot_exec::ExecError;
use serde::Serialize;
use thiserror::Error;

use crate::registry::Role;

/// Configuration problems found at load or validation time
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("host {host} has no usable credentials")]
    NoCredentials { host: String },
}

/// Errors raised by orchestration procedures
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// Host unreachable or credentials rejected; the host counts as down
    #[error("cannot connect to {host}: {source}")]
    ConnectFailure {
        host: String,
        #[source]
        source: ExecError,
    },

    /// The remote daemon answered with a recognised error, or with nothing we
    /// could interpret
    #[error("{host} rejected `{command}`: {reason}")]
    CommandRejected {
        host: String,
        command: String,
        reason: String,
    },

    /// Expected on-chain effect never observed within the poll bounds
    #[error("{awaiting} not observed after {attempts} polls")]
    Unconfirmed { awaiting: String, attempts: u32 },

    /// The operator cancelled a wait
    #[error("cancelled")]
    Cancelled,

    /// File copy or rename refused on the remote host
    #[error("file transfer to {host} failed: {reason}")]
    TransferFailure { host: String, reason: String },

    /// Session broke or timed out after connecting
    #[error("session error on {host}: {source}")]
    Session {
        host: String,
        #[source]
        source: ExecError,
    },

    /// A host selector matched nothing
    #[error("no host matches {0}")]
    HostNotFound(String),

    /// The procedure needs a host of a role the fleet lacks
    #[error("no {0} host configured")]
    NoHostForRole(Role),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Serializable classification of an `EngineError`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConnectFailure,
    CommandRejected,
    Unconfirmed,
    Cancelled,
    TransferFailure,
    Session,
    HostNotFound,
    Config,
}

impl EngineError {
    /// Classification for reports
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::ConnectFailure { .. } => ErrorKind::ConnectFailure,
            EngineError::CommandRejected { .. } => ErrorKind::CommandRejected,
            EngineError::Unconfirmed { .. } => ErrorKind::Unconfirmed,
            EngineError::Cancelled => ErrorKind::Cancelled,
            EngineError::TransferFailure { .. } => ErrorKind::TransferFailure,
            EngineError::Session { .. } => ErrorKind::Session,
            EngineError::HostNotFound(_) => ErrorKind::HostNotFound,
            EngineError::NoHostForRole(_) | EngineError::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether the host should be marked down
    #[must_use]
    pub fn is_host_down(&self) -> bool {
        matches!(self, EngineError::ConnectFailure { .. })
    }

    pub(crate) fn rejected(host: &str, command: &str, reason: impl Into<String>) -> Self {
        EngineError::CommandRejected {
            host: host.to_string(),
            command: command.to_string(),
            reason: reason.into(),
        }
    }
}
