//! `FleetActor`: serialises procedure invocations
//!
//! The engine never runs two procedures at once: the actor's mailbox queues
//! them, so two sessions to one host cannot overlap. The actor also keeps the
//! observed-state side table filled in by status sweeps.

use kameo::actor::{ActorRef, WeakActorRef};
use kameo::error::ActorStopReason;
use kameo::message::{Context, Message};
use kameo::prelude::*;
use tracing::{info, warn};

use crate::engine::Engine;
use crate::error::EngineError;
use crate::message::{
    AwaitBalance, ColdRestart, GenerateStakingConfig, GetObservedState, InstallBinaries,
    ObservedSnapshot, PromoteMasternodes, Reboot, ResolveHosts, RestartWallets, StartWallets,
    OpenConsoles, StopWallets, SweepStatus, TransferFunds,
};
use crate::registry::{Host, Resolution, Role};
use crate::report::{Procedure, ProcedureReport};
use crate::state::ObservedStates;

/// Arguments for spawning a `FleetActor`
pub struct FleetActorArgs {
    pub engine: Engine,
}

/// Owns the engine and runs one procedure at a time
pub struct FleetActor {
    engine: Engine,
    observed: ObservedStates,
}

impl FleetActor {
    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Resolve `tokens`, falling back to `default`; a failed resolution is
    /// turned into an aborted report
    fn targets(
        &self,
        procedure: Procedure,
        tokens: &[String],
        default: Vec<Host>,
    ) -> Result<Vec<Host>, ProcedureReport> {
        self.engine
            .registry()
            .select(tokens, default)
            .map_err(|e| ProcedureReport::new(procedure).abort("select", &e))
    }

    /// Main node plus every staking node, each once
    fn staking_targets(&self) -> Vec<Host> {
        let registry = self.engine.registry();
        let mut hosts = vec![registry.main().clone()];
        for host in registry.by_role(Role::Staking) {
            if !hosts.iter().any(|h| h.name == host.name) {
                hosts.push(host.clone());
            }
        }
        hosts
    }
}

impl Actor for FleetActor {
    type Args = FleetActorArgs;
    type Error = EngineError;

    async fn on_start(args: Self::Args, actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        info!(
            id = %actor_ref.id(),
            hosts = args.engine.registry().all().len(),
            "FleetActor starting"
        );
        Ok(Self {
            engine: args.engine,
            observed: ObservedStates::new(),
        })
    }

    async fn on_stop(
        &mut self,
        _actor_ref: WeakActorRef<Self>,
        reason: ActorStopReason,
    ) -> Result<(), Self::Error> {
        info!(reason = ?reason, "FleetActor stopping");
        Ok(())
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Message<SweepStatus> for FleetActor {
    type Reply = ProcedureReport;

    async fn handle(
        &mut self,
        msg: SweepStatus,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let default = self.engine.registry().all();
        let hosts = match self.targets(Procedure::StatusSweep, &msg.targets, default) {
            Ok(h) => h,
            Err(report) => return report,
        };

        let report = self.engine.status_sweep(&hosts).await;
        for snapshot in &report.snapshots {
            self.observed.record(snapshot);
        }
        report
    }
}

impl Message<StopWallets> for FleetActor {
    type Reply = ProcedureReport;

    async fn handle(
        &mut self,
        msg: StopWallets,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let default = self.engine.registry().all();
        match self.targets(Procedure::StopWallets, &msg.targets, default) {
            Ok(hosts) => self.engine.stop_wallets(&hosts).await,
            Err(report) => report,
        }
    }
}

impl Message<StartWallets> for FleetActor {
    type Reply = ProcedureReport;

    async fn handle(
        &mut self,
        msg: StartWallets,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let default = self.engine.registry().all();
        match self.targets(Procedure::StartWallets, &msg.targets, default) {
            Ok(hosts) => self.engine.start_wallets(&hosts, msg.wipe).await,
            Err(report) => report,
        }
    }
}

impl Message<RestartWallets> for FleetActor {
    type Reply = ProcedureReport;

    async fn handle(
        &mut self,
        msg: RestartWallets,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.engine.restart_wallets(msg.wipe).await
    }
}

impl Message<ColdRestart> for FleetActor {
    type Reply = ProcedureReport;

    async fn handle(
        &mut self,
        msg: ColdRestart,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.engine.cold_restart(&msg.options).await
    }
}

impl Message<GenerateStakingConfig> for FleetActor {
    type Reply = ProcedureReport;

    async fn handle(
        &mut self,
        msg: GenerateStakingConfig,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let default = self.staking_targets();
        match self.targets(Procedure::GenerateStakingConfig, &msg.targets, default) {
            Ok(hosts) => self.engine.write_staking_configs(&hosts).await,
            Err(report) => report,
        }
    }
}

impl Message<PromoteMasternodes> for FleetActor {
    type Reply = ProcedureReport;

    async fn handle(
        &mut self,
        msg: PromoteMasternodes,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let Some(selector) = msg.staking_host else {
            return self.engine.promote_masternodes(None).await;
        };

        let hosts = match self.targets(
            Procedure::PromoteMasternodes,
            std::slice::from_ref(&selector),
            Vec::new(),
        ) {
            Ok(h) => h,
            Err(report) => return report,
        };
        if hosts.len() > 1 {
            warn!(selector = %selector, matched = hosts.len(), "several staking hosts matched, using the first");
        }
        self.engine.promote_masternodes(hosts.first()).await
    }
}

impl Message<InstallBinaries> for FleetActor {
    type Reply = ProcedureReport;

    async fn handle(
        &mut self,
        msg: InstallBinaries,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let default = self.engine.registry().all();
        match self.targets(Procedure::InstallBinaries, &msg.targets, default) {
            Ok(hosts) => self.engine.install_binaries(&hosts).await,
            Err(report) => report,
        }
    }
}

impl Message<TransferFunds> for FleetActor {
    type Reply = ProcedureReport;

    async fn handle(
        &mut self,
        msg: TransferFunds,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let Resolution { hosts, free } = self.engine.registry().resolve(&msg.tokens);

        let mut amount = msg.amount;
        let mut addresses = Vec::new();
        for token in free {
            match token.parse::<f64>() {
                Ok(value) if !value.is_finite() => {
                    warn!(token = %token, "non-finite amount ignored");
                }
                Ok(value) if amount.is_none() => amount = Some(value),
                Ok(_) => warn!(token = %token, "extra amount ignored"),
                Err(_) => addresses.push(token),
            }
        }

        self.engine.transfer_funds(&hosts, &addresses, amount).await
    }
}

impl Message<AwaitBalance> for FleetActor {
    type Reply = ProcedureReport;

    async fn handle(
        &mut self,
        msg: AwaitBalance,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let default = self
            .engine
            .registry()
            .by_role(Role::Masternode)
            .cloned()
            .collect();
        match self.targets(Procedure::AwaitBalance, &msg.targets, default) {
            Ok(hosts) => self.engine.await_balance(&hosts, msg.amount).await,
            Err(report) => report,
        }
    }
}

impl Message<Reboot> for FleetActor {
    type Reply = ProcedureReport;

    async fn handle(&mut self, msg: Reboot, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        let default = self.engine.registry().all();
        match self.targets(Procedure::Reboot, &msg.targets, default) {
            Ok(hosts) => self.engine.reboot(&hosts).await,
            Err(report) => report,
        }
    }
}

impl Message<OpenConsoles> for FleetActor {
    type Reply = ProcedureReport;

    async fn handle(
        &mut self,
        msg: OpenConsoles,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let default = self.engine.registry().all();
        match self.targets(Procedure::OpenConsoles, &msg.targets, default) {
            Ok(hosts) => self.engine.open_consoles(&hosts),
            Err(report) => report,
        }
    }
}

impl Message<GetObservedState> for FleetActor {
    type Reply = ObservedSnapshot;

    async fn handle(
        &mut self,
        _msg: GetObservedState,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        ObservedSnapshot {
            hosts: self.observed.snapshot(),
        }
    }
}

impl Message<ResolveHosts> for FleetActor {
    type Reply = Resolution;

    async fn handle(
        &mut self,
        msg: ResolveHosts,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.engine.registry().resolve(&msg.tokens)
    }
}

