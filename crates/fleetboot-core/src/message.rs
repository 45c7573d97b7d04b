//! Message types for the fleet actor
//!
//! Host selectors are raw tokens; the actor resolves them against the
//! registry. An empty selector means the procedure's default host set.

use kameo_macros::Reply;

use crate::engine::ColdRestartOptions;
use crate::state::ObservedState;

// ============================================================================
// Procedures
// ============================================================================

/// Health sweep; defaults to every host
#[derive(Debug, Default)]
pub struct SweepStatus {
    pub targets: Vec<String>,
}

/// Stop daemons; defaults to every host
#[derive(Debug, Default)]
pub struct StopWallets {
    pub targets: Vec<String>,
}

/// Start daemons; defaults to every host
#[derive(Debug, Default)]
pub struct StartWallets {
    pub targets: Vec<String>,
    /// Erase chain data before starting
    pub wipe: bool,
}

/// Stop all, then start all
#[derive(Debug, Default)]
pub struct RestartWallets {
    pub wipe: bool,
}

/// Full network bring-up with masternode provisioning
#[derive(Debug, Default)]
pub struct ColdRestart {
    pub options: ColdRestartOptions,
}

/// Write staking configs; defaults to the main node and staking nodes
#[derive(Debug, Default)]
pub struct GenerateStakingConfig {
    pub targets: Vec<String>,
}

/// Promote the masternode-role hosts
#[derive(Debug, Default)]
pub struct PromoteMasternodes {
    /// Selector for the staking host; first staking node, else main, when unset
    pub staking_host: Option<String>,
}

/// Push binaries; defaults to every host
#[derive(Debug, Default)]
pub struct InstallBinaries {
    pub targets: Vec<String>,
}

/// Send funds from the main wallet
///
/// Tokens that match hosts select destinations. Of the rest, the first
/// numeric one is the amount (unless `amount` is set) and the others are raw
/// addresses.
#[derive(Debug, Default)]
pub struct TransferFunds {
    pub tokens: Vec<String>,
    pub amount: Option<f64>,
}

/// Wait for balances; defaults to the masternodes
#[derive(Debug, Default)]
pub struct AwaitBalance {
    pub targets: Vec<String>,
    pub amount: Option<f64>,
}

/// Reboot hosts and restart their daemons; defaults to every host
#[derive(Debug, Default)]
pub struct Reboot {
    pub targets: Vec<String>,
}

/// Open an operator console per host; defaults to every host
#[derive(Debug, Default)]
pub struct OpenConsoles {
    pub targets: Vec<String>,
}

// ============================================================================
// Queries
// ============================================================================

/// Read the observed-state side table
#[derive(Debug)]
pub struct GetObservedState;

/// Observed state of every swept host, sorted by name
#[derive(Debug, Clone, Reply)]
pub struct ObservedSnapshot {
    pub hosts: Vec<(String, ObservedState)>,
}

/// Resolve selector tokens without running anything
#[derive(Debug)]
pub struct ResolveHosts {
    pub tokens: Vec<String>,
}
