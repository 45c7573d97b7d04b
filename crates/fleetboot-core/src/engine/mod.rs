//! Orchestration engine
//!
//! Multi-step, multi-host procedures built from registry lookups, remote
//! sessions and interpreter decisions. Stages run strictly in order, and every
//! host operation inside a stage returns (success or host-down) before the next
//! stage starts. At most one session is open at any time.

mod cold_restart;
mod console;
mod funds;
mod promote;
mod rollout;
mod status;
mod wallet;

use std::sync::Arc;
use std::time::Duration;

use fleetboot_exec::{CommandOutput, Connector, ExecError, LocalRunner, Session};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::FleetConfig;
use crate::daemon::DaemonCommands;
use crate::error::{ConfigError, EngineError};
use crate::interpret::{CommandKind, Decision, interpret};
use crate::nodeconf::NodeConfig;
use crate::poll::{self, PollError};
use crate::registry::{Host, HostRegistry};

pub use cold_restart::ColdRestartOptions;

/// Runs procedures against the fleet
pub struct Engine {
    config: FleetConfig,
    registry: HostRegistry,
    connector: Arc<dyn Connector>,
    commands: DaemonCommands,
    cancel: CancellationToken,
    pinger: Option<LocalRunner>,
    launcher: LocalRunner,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("hosts", &self.registry.entries().len())
            .field("connector", &self.connector.connector_type())
            .field("network", &self.config.network)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create an engine over a fleet config
    ///
    /// # Errors
    /// Returns `ConfigError` if the config fails validation or a host lacks credentials
    pub fn new(config: FleetConfig, connector: Arc<dyn Connector>) -> Result<Self, ConfigError> {
        let registry = HostRegistry::from_config(&config)?;
        let commands = DaemonCommands::new(&config);
        Ok(Self {
            config,
            registry,
            connector,
            commands,
            cancel: CancellationToken::new(),
            pinger: None,
            launcher: LocalRunner::new(),
        })
    }

    /// Use `token` to cancel settle delays and polls
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Ping the main node from the local machine during status sweeps
    #[must_use]
    pub fn with_pinger(mut self, runner: LocalRunner) -> Self {
        self.pinger = Some(runner);
        self
    }

    #[must_use]
    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &HostRegistry {
        &self.registry
    }

    #[must_use]
    pub fn commands(&self) -> &DaemonCommands {
        &self.commands
    }

    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Open a session to `host`
    async fn open(&self, host: &Host) -> Result<Session, EngineError> {
        match self.connector.connect(&host.connection_info()).await {
            Ok(shell) => Ok(Session::new(&host.name, shell)),
            Err(source) => Err(EngineError::ConnectFailure {
                host: host.name.clone(),
                source,
            }),
        }
    }

    /// One round trip, transport errors mapped
    async fn run(
        &self,
        session: &mut Session,
        host: &Host,
        cmd: &str,
    ) -> Result<CommandOutput, EngineError> {
        session.run(cmd).await.map_err(|source| EngineError::Session {
            host: host.name.clone(),
            source,
        })
    }

    /// Run and interpret; rejected or unrecognised output becomes an error
    async fn run_expect(
        &self,
        session: &mut Session,
        host: &Host,
        cmd: &str,
        kind: &CommandKind,
    ) -> Result<Decision, EngineError> {
        let output = self.run(session, host, cmd).await?;
        let decision = interpret(kind, &output);
        debug!(host = %host.name, command = %cmd, decision = ?decision, "interpreted");
        match decision {
            Decision::Rejected(reason) => Err(EngineError::rejected(&host.name, cmd, reason)),
            Decision::Unrecognized(text) => Err(EngineError::rejected(
                &host.name,
                cmd,
                format!("unrecognized response: {text:?}"),
            )),
            other => Ok(other),
        }
    }

    /// Run a command that prints a generated token
    async fn run_token(
        &self,
        session: &mut Session,
        host: &Host,
        cmd: &str,
        kind: &CommandKind,
    ) -> Result<String, EngineError> {
        match self.run_expect(session, host, cmd, kind).await? {
            Decision::Token(token) => Ok(token),
            other => Err(EngineError::rejected(
                &host.name,
                cmd,
                format!("expected a token, got {other:?}"),
            )),
        }
    }

    /// Open, run one interpreted command, close
    async fn query(
        &self,
        host: &Host,
        cmd: &str,
        kind: &CommandKind,
    ) -> Result<Decision, EngineError> {
        let mut session = self.open(host).await?;
        let result = self.run_expect(&mut session, host, cmd, kind).await;
        session.close().await;
        result
    }

    /// Open, run one token-producing command, close
    async fn query_token(
        &self,
        host: &Host,
        cmd: &str,
        kind: &CommandKind,
    ) -> Result<String, EngineError> {
        let mut session = self.open(host).await?;
        let result = self.run_token(&mut session, host, cmd, kind).await;
        session.close().await;
        result
    }

    /// Write a remote file, creating the config directory first
    async fn write_file(
        &self,
        session: &mut Session,
        host: &Host,
        path: &str,
        contents: &[u8],
    ) -> Result<(), EngineError> {
        session
            .write_file(path, contents)
            .await
            .map_err(|e| match e {
                ExecError::TransferFailed { reason, .. } => EngineError::TransferFailure {
                    host: host.name.clone(),
                    reason,
                },
                source => EngineError::Session {
                    host: host.name.clone(),
                    source,
                },
            })
    }

    /// Write the node config for `host`
    async fn write_node_config(
        &self,
        session: &mut Session,
        host: &Host,
        conf: &NodeConfig,
    ) -> Result<(), EngineError> {
        self.run(session, host, &self.commands.ensure_config_dir())
            .await?;
        self.write_file(
            session,
            host,
            &self.commands.conf_path(),
            conf.render().as_bytes(),
        )
        .await
    }

    /// Staking config for `host`: every other fleet member as a peer
    fn staking_config_for(&self, host: &Host) -> NodeConfig {
        NodeConfig::staking(
            &self.config.base_config,
            self.registry.peer_addresses(Some(host)),
        )
    }

    /// Amount to move: the override if given, else the configured collateral
    fn amount(&self, requested: Option<f64>) -> Result<f64, EngineError> {
        let amount = requested.unwrap_or(self.config.collateral_amount);
        if amount.is_finite() && amount > 0.0 {
            Ok(amount)
        } else {
            Err(ConfigError::Invalid(format!(
                "amount must be a positive number, got {amount}"
            ))
            .into())
        }
    }

    /// Fixed wait after a state-changing command
    async fn settle(&self, delay: Duration) -> Result<(), EngineError> {
        poll::settle(delay, &self.cancel)
            .await
            .map_err(|_| EngineError::Cancelled)
    }
}

/// Map a poll failure while waiting for `awaiting`
fn poll_failure(err: &PollError, awaiting: impl Into<String>) -> EngineError {
    match err {
        PollError::Cancelled { .. } => EngineError::Cancelled,
        other => EngineError::Unconfirmed {
            awaiting: awaiting.into(),
            attempts: other.attempts(),
        },
    }
}
