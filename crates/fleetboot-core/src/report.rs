//! Structured procedure results

use chrono::{DateTime, Utc};
use kameo_macros::Reply;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{EngineError, ErrorKind};
use crate::registry::{Host, Role};

/// Which procedure a report belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Procedure {
    StatusSweep,
    StopWallets,
    StartWallets,
    RestartWallets,
    GenerateStakingConfig,
    PromoteMasternodes,
    ColdRestart,
    InstallBinaries,
    TransferFunds,
    AwaitBalance,
    Reboot,
    OpenConsoles,
}

impl Procedure {
    /// Name as used on the command line and in logs
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Procedure::StatusSweep => "status-sweep",
            Procedure::StopWallets => "stop-wallets",
            Procedure::StartWallets => "start-wallets",
            Procedure::RestartWallets => "restart-wallets",
            Procedure::GenerateStakingConfig => "generate-staking-config",
            Procedure::PromoteMasternodes => "promote-masternodes",
            Procedure::ColdRestart => "cold-restart",
            Procedure::InstallBinaries => "install-binaries",
            Procedure::TransferFunds => "transfer-funds",
            Procedure::AwaitBalance => "await-balance",
            Procedure::Reboot => "reboot",
            Procedure::OpenConsoles => "open-consoles",
        }
    }
}

impl std::fmt::Display for Procedure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One completed stage, logged as it happens
#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    pub stage: String,
    pub host: Option<String>,
    pub ok: bool,
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

/// Final per-host result of a fan-out procedure
#[derive(Debug, Clone, Serialize)]
pub struct HostOutcome {
    pub host: String,
    pub address: String,
    pub ok: bool,
    pub host_down: bool,
    pub error: Option<String>,
}

/// One presence check on the main node
#[derive(Debug, Clone, Serialize)]
pub struct ServiceCheck {
    pub name: String,
    pub present: bool,
}

/// Health snapshot from the status sweep
#[derive(Debug, Clone, Serialize)]
pub struct HostSnapshot {
    pub host: String,
    pub address: String,
    pub role: Role,
    pub reachable: bool,
    pub uptime: Option<String>,
    pub services: Vec<ServiceCheck>,
    pub daemon_running: Option<bool>,
    pub daemon_status: Option<String>,
    pub masternode_status: Option<String>,
    pub balance: Option<f64>,
    pub ping: Option<bool>,
    /// Health defects found, e.g. a required service not running
    pub defects: Vec<String>,
    /// Observations that are not defects
    pub notes: Vec<String>,
}

impl HostSnapshot {
    #[must_use]
    pub fn new(host: &Host) -> Self {
        Self {
            host: host.name.clone(),
            address: host.address.clone(),
            role: host.role,
            reachable: false,
            uptime: None,
            services: Vec::new(),
            daemon_running: None,
            daemon_status: None,
            masternode_status: None,
            balance: None,
            ping: None,
            defects: Vec::new(),
            notes: Vec::new(),
        }
    }
}

/// A fund transfer sent from the main wallet
#[derive(Debug, Clone, Serialize)]
pub struct TransferRecord {
    pub destination: String,
    pub address: String,
    pub amount: f64,
    pub tx_hash: String,
}

/// How a procedure ended
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Running,
    Completed,
    Aborted {
        stage: String,
        kind: ErrorKind,
        error: String,
    },
}

/// Result of one procedure invocation
#[derive(Debug, Clone, Serialize, Reply)]
pub struct ProcedureReport {
    pub procedure: Procedure,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: Outcome,
    pub stages: Vec<StageRecord>,
    pub hosts: Vec<HostOutcome>,
    pub snapshots: Vec<HostSnapshot>,
    pub transfers: Vec<TransferRecord>,
}

impl ProcedureReport {
    #[must_use]
    pub fn new(procedure: Procedure) -> Self {
        info!(procedure = %procedure, "procedure starting");
        Self {
            procedure,
            started_at: Utc::now(),
            finished_at: None,
            outcome: Outcome::Running,
            stages: Vec::new(),
            hosts: Vec::new(),
            snapshots: Vec::new(),
            transfers: Vec::new(),
        }
    }

    /// Record a stage that completed
    pub fn stage_ok(&mut self, stage: &str, host: Option<&Host>, detail: Option<String>) {
        info!(
            stage,
            host = host.map_or("-", |h| h.name.as_str()),
            detail = detail.as_deref().unwrap_or(""),
            "stage ok"
        );
        self.stages.push(StageRecord {
            stage: stage.to_string(),
            host: host.map(|h| h.name.clone()),
            ok: true,
            detail,
            at: Utc::now(),
        });
    }

    /// Record a stage that failed without ending the procedure
    pub fn stage_failed(&mut self, stage: &str, host: Option<&Host>, err: &EngineError) {
        warn!(
            stage,
            host = host.map_or("-", |h| h.name.as_str()),
            error = %err,
            "stage failed"
        );
        self.stages.push(StageRecord {
            stage: stage.to_string(),
            host: host.map(|h| h.name.clone()),
            ok: false,
            detail: Some(err.to_string()),
            at: Utc::now(),
        });
    }

    /// Record the per-host result of a fan-out stage
    pub fn host_result(&mut self, host: &Host, result: Result<(), &EngineError>) {
        self.target_result(&host.name, &host.address, result);
    }

    /// Record a per-target result for something that is not a registry host,
    /// such as a raw destination address
    pub fn target_result(&mut self, name: &str, address: &str, result: Result<(), &EngineError>) {
        let (ok, host_down, error) = match result {
            Ok(()) => (true, false, None),
            Err(e) => (false, e.is_host_down(), Some(e.to_string())),
        };
        self.hosts.push(HostOutcome {
            host: name.to_string(),
            address: address.to_string(),
            ok,
            host_down,
            error,
        });
    }

    /// End the procedure early; later stages are not attempted
    #[must_use]
    pub fn abort(mut self, stage: &str, err: &EngineError) -> Self {
        error!(procedure = %self.procedure, stage, error = %err, "procedure aborted");
        self.stages.push(StageRecord {
            stage: stage.to_string(),
            host: None,
            ok: false,
            detail: Some(err.to_string()),
            at: Utc::now(),
        });
        self.outcome = Outcome::Aborted {
            stage: stage.to_string(),
            kind: err.kind(),
            error: err.to_string(),
        };
        self.finished_at = Some(Utc::now());
        self
    }

    /// Mark the procedure complete
    #[must_use]
    pub fn finish(mut self) -> Self {
        if matches!(self.outcome, Outcome::Running) {
            self.outcome = Outcome::Completed;
        }
        self.finished_at = Some(Utc::now());
        info!(
            procedure = %self.procedure,
            succeeded = self.succeeded(),
            hosts = self.hosts.len(),
            "procedure finished"
        );
        self
    }

    /// Completed, and every host that took part succeeded
    ///
    /// For fan-out procedures this is the logical AND of the per-host results.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, Outcome::Completed) && self.hosts.iter().all(|h| h.ok)
    }

    /// Stage name and error kind if aborted
    #[must_use]
    pub fn aborted_at(&self) -> Option<(&str, ErrorKind)> {
        match &self.outcome {
            Outcome::Aborted { stage, kind, .. } => Some((stage.as_str(), *kind)),
            _ => None,
        }
    }

    /// Outcome for one host by name
    #[must_use]
    pub fn host(&self, name: &str) -> Option<&HostOutcome> {
        self.hosts.iter().find(|h| h.host == name)
    }
}
