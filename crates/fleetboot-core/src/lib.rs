//! fleetboot-core: fleet model and orchestration
//!
//! Host registry, command result interpretation, the orchestration engine's
//! procedures, structured reports, and the `FleetActor` that serialises them.

pub mod actor;
pub mod config;
pub mod daemon;
pub mod engine;
pub mod error;
pub mod interpret;
pub mod message;
pub mod nodeconf;
pub mod poll;
pub mod registry;
pub mod report;
pub mod state;

pub use actor::{FleetActor, FleetActorArgs};
pub use config::{FleetConfig, HostConfig, NetworkMode, PollSettings, Timing};
pub use engine::{ColdRestartOptions, Engine};
pub use error::{ConfigError, EngineError, ErrorKind};
pub use interpret::{Classification, CommandKind, Decision, interpret};
pub use message::{
    AwaitBalance, ColdRestart, GenerateStakingConfig, GetObservedState, InstallBinaries,
    ObservedSnapshot, PromoteMasternodes, Reboot, ResolveHosts, RestartWallets, StartWallets,
    OpenConsoles, StopWallets, SweepStatus, TransferFunds,
};
pub use nodeconf::{NodeConfig, ProvisioningRecord};
pub use registry::{Host, HostRegistry, Resolution, Role};
pub use report::{HostOutcome, HostSnapshot, Outcome, Procedure, ProcedureReport};
pub use state::{ObservedState, ObservedStates};
