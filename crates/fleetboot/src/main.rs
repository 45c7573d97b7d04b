//! fleetboot
//!
//! Bootstraps and operates a masternode fleet by driving the coin daemon over SSH.

mod config;
mod logging;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use eyre::eyre;
use kameo::actor::{ActorRef, Spawn};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use fleetboot_core::{
    AwaitBalance, ColdRestart, ColdRestartOptions, Engine, FleetActor, FleetActorArgs,
    GenerateStakingConfig, InstallBinaries, OpenConsoles, ProcedureReport, PromoteMasternodes,
    Reboot, RestartWallets, StartWallets, StopWallets, SweepStatus, TransferFunds,
};
use fleetboot_exec::{LocalRunner, SshConnector};

#[derive(Parser)]
#[command(name = "fleetboot")]
#[command(about = "Bootstrap and operate a masternode fleet over SSH", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (TOML, or JSON by extension)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Print the procedure report as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Health sweep: uptime, services, daemon status, balances
    #[command(name = "status")]
    Status {
        /// Host names, addresses or name fragments (default: all)
        hosts: Vec<String>,
    },

    /// Stop wallet daemons
    #[command(name = "stop-daemon")]
    StopDaemon { hosts: Vec<String> },

    /// Write staking configs and start wallet daemons
    #[command(name = "start")]
    Start {
        /// Erase chain data first
        #[arg(long)]
        wipe: bool,
        hosts: Vec<String>,
    },

    /// Stop every wallet, then start every wallet
    #[command(name = "restart-wallet")]
    RestartWallet {
        #[arg(long)]
        wipe: bool,
    },

    /// Bring the network up from nothing and provision the first masternode
    #[command(name = "restart-wallet-hard")]
    RestartWalletHard {
        #[arg(long)]
        wipe: bool,
        /// Collateral amount (default from config)
        amount: Option<f64>,
    },

    /// Write staking configs without starting anything
    #[command(name = "generate-staking-config")]
    GenerateStakingConfig { hosts: Vec<String> },

    /// Turn the masternode hosts into masternodes
    #[command(name = "promote")]
    Promote {
        /// Host that generates the key (default: first staking node, else main)
        #[arg(long)]
        staking_host: Option<String>,
    },

    /// Push daemon and CLI binaries
    #[command(name = "install-binaries")]
    InstallBinaries { hosts: Vec<String> },

    /// Send funds from the main wallet to hosts or raw addresses
    #[command(name = "transfer")]
    Transfer {
        /// Hosts, raw addresses and an optional amount
        #[arg(required = true)]
        targets: Vec<String>,
    },

    /// Wait until hosts hold at least an amount (default: masternodes)
    #[command(name = "await-balance")]
    AwaitBalance {
        #[arg(long)]
        amount: Option<f64>,
        hosts: Vec<String>,
    },

    /// Reboot hosts and start their daemons again
    #[command(name = "reboot")]
    Reboot { hosts: Vec<String> },

    /// Open a `gcloud compute ssh` terminal per host (default: all)
    #[command(name = "console")]
    Console { hosts: Vec<String> },
}

/// Ask the actor, mapping a dead mailbox to an error
macro_rules! ask {
    ($actor:expr, $msg:expr) => {
        $actor
            .ask($msg)
            .await
            .map_err(|_| eyre!("fleet actor stopped before replying"))
    };
}

async fn dispatch(actor: &ActorRef<FleetActor>, command: Commands) -> Result<ProcedureReport> {
    match command {
        Commands::Status { hosts } => ask!(actor, SweepStatus { targets: hosts }),
        Commands::StopDaemon { hosts } => ask!(actor, StopWallets { targets: hosts }),
        Commands::Start { wipe, hosts } => ask!(actor, StartWallets { targets: hosts, wipe }),
        Commands::RestartWallet { wipe } => ask!(actor, RestartWallets { wipe }),
        Commands::RestartWalletHard { wipe, amount } => ask!(
            actor,
            ColdRestart {
                options: ColdRestartOptions { wipe, amount },
            }
        ),
        Commands::GenerateStakingConfig { hosts } => {
            ask!(actor, GenerateStakingConfig { targets: hosts })
        }
        Commands::Promote { staking_host } => ask!(actor, PromoteMasternodes { staking_host }),
        Commands::InstallBinaries { hosts } => ask!(actor, InstallBinaries { targets: hosts }),
        Commands::Transfer { targets } => ask!(
            actor,
            TransferFunds {
                tokens: targets,
                amount: None,
            }
        ),
        Commands::AwaitBalance { amount, hosts } => ask!(
            actor,
            AwaitBalance {
                targets: hosts,
                amount,
            }
        ),
        Commands::Reboot { hosts } => ask!(actor, Reboot { targets: hosts }),
        Commands::Console { hosts } => ask!(actor, OpenConsoles { targets: hosts }),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let (fleet, source) = config::discover(cli.config.as_deref())?;
    logging::init(&fleet.log_level, cli.verbose, cli.json_logs)?;
    info!(config = %source.display(), network = ?fleet.network, "configuration loaded");

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            interrupt.cancel();
        }
    });

    let connector = SshConnector::new().with_command_timeout(fleet.timing.command_timeout());
    let engine = Engine::new(fleet, Arc::new(connector))?
        .with_cancellation(cancel)
        .with_pinger(LocalRunner::new());
    let actor = FleetActor::spawn(FleetActorArgs { engine });

    let report = dispatch(&actor, cli.command).await?;
    if actor.stop_gracefully().await.is_err() {
        warn!("fleet actor already stopped");
    }

    output::print(&report, cli.json)?;
    Ok(if report.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
