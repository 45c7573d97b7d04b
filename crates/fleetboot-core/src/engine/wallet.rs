use tracing::{info, warn};

use super::Engine;
use crate::error::EngineError;
use crate::interpret::{self, CommandKind};
use crate::registry::{Host, Role};
use crate::report::{Procedure, ProcedureReport};

/// What a stop request found on the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stopped {
    Stopped,
    AlreadyStopped,
}

impl Stopped {
    fn describe(self) -> String {
        match self {
            Stopped::Stopped => "stopped".to_string(),
            Stopped::AlreadyStopped => "already stopped".to_string(),
        }
    }
}

impl Engine {
    /// Stop the daemon on each host
    pub async fn stop_wallets(&self, hosts: &[Host]) -> ProcedureReport {
        let mut report = ProcedureReport::new(Procedure::StopWallets);
        if let Err(e) = self.stop_stage(&mut report, hosts, "stop").await {
            return report.abort("stop", &e);
        }
        report.finish()
    }

    /// Start the daemon on each host, optionally wiping chain data first
    ///
    /// Staking config is regenerated for every host that is not a masternode;
    /// masternode configs carry a private key and are left alone. The main
    /// node additionally gets generation enabled.
    pub async fn start_wallets(&self, hosts: &[Host], wipe: bool) -> ProcedureReport {
        let mut report = ProcedureReport::new(Procedure::StartWallets);
        if let Err(e) = self.start_stage(&mut report, hosts, wipe, "start").await {
            return report.abort("start", &e);
        }
        report.finish()
    }

    /// Stop every host, then start every host
    pub async fn restart_wallets(&self, wipe: bool) -> ProcedureReport {
        let mut report = ProcedureReport::new(Procedure::RestartWallets);
        let hosts = self.registry.all();

        if let Err(e) = self.stop_stage(&mut report, &hosts, "stop").await {
            return report.abort("stop", &e);
        }
        if let Err(e) = self.start_stage(&mut report, &hosts, wipe, "start").await {
            return report.abort("start", &e);
        }
        report.finish()
    }

    /// Write the staking config to each host without touching the daemon
    pub async fn write_staking_configs(&self, hosts: &[Host]) -> ProcedureReport {
        let mut report = ProcedureReport::new(Procedure::GenerateStakingConfig);

        for host in hosts {
            let conf = self.staking_config_for(host);
            let result = match self.open(host).await {
                Ok(mut session) => {
                    let r = self.write_node_config(&mut session, host, &conf).await;
                    session.close().await;
                    r
                }
                Err(e) => Err(e),
            };
            match &result {
                Ok(()) => report.stage_ok(
                    "write-config",
                    Some(host),
                    Some(format!("{} peers", conf.peers().len())),
                ),
                Err(e) => report.stage_failed("write-config", Some(host), e),
            }
            report.host_result(host, result.as_ref().map(|_| ()));
        }

        report.finish()
    }

    /// Reboot each host, wait, then bring the daemon back up
    pub async fn reboot(&self, hosts: &[Host]) -> ProcedureReport {
        let mut report = ProcedureReport::new(Procedure::Reboot);
        let mut rebooted = Vec::new();

        for host in hosts {
            match self.reboot_host(host).await {
                Ok(()) => {
                    report.stage_ok("reboot", Some(host), None);
                    rebooted.push(host);
                }
                Err(e) => {
                    report.stage_failed("reboot", Some(host), &e);
                    report.host_result(host, Err(&e));
                }
            }
        }

        if rebooted.is_empty() {
            return report.finish();
        }

        if let Err(e) = self.settle(self.config.timing.reboot_settle()).await {
            return report.abort("reboot-settle", &e);
        }

        for host in rebooted {
            let result = self.start_daemon_on(host).await;
            if matches!(result, Err(EngineError::Cancelled)) {
                return report.abort("start", &EngineError::Cancelled);
            }
            match &result {
                Ok(()) => report.stage_ok("start", Some(host), None),
                Err(e) => report.stage_failed("start", Some(host), e),
            }
            report.host_result(host, result.as_ref().map(|_| ()));
        }

        report.finish()
    }

    /// Stop each host in turn, recording per-host results
    ///
    /// Only cancellation escapes; host failures are isolated.
    pub(crate) async fn stop_stage(
        &self,
        report: &mut ProcedureReport,
        hosts: &[Host],
        stage: &str,
    ) -> Result<(), EngineError> {
        for host in hosts {
            let result = self.stop_host(host).await;
            if matches!(result, Err(EngineError::Cancelled)) {
                return Err(EngineError::Cancelled);
            }
            match &result {
                Ok(stopped) => report.stage_ok(stage, Some(host), Some(stopped.describe())),
                Err(e) => report.stage_failed(stage, Some(host), e),
            }
            report.host_result(host, result.as_ref().map(|_| ()));
        }
        Ok(())
    }

    /// Start each host in turn, recording per-host results
    pub(crate) async fn start_stage(
        &self,
        report: &mut ProcedureReport,
        hosts: &[Host],
        wipe: bool,
        stage: &str,
    ) -> Result<(), EngineError> {
        for host in hosts {
            let result = self.start_host(host, wipe).await;
            if matches!(result, Err(EngineError::Cancelled)) {
                return Err(EngineError::Cancelled);
            }
            match &result {
                Ok(()) => report.stage_ok(stage, Some(host), wipe.then(|| "wiped".to_string())),
                Err(e) => report.stage_failed(stage, Some(host), e),
            }
            report.host_result(host, result.as_ref().map(|_| ()));
        }
        Ok(())
    }

    /// connect, stop, settle, disconnect
    pub(crate) async fn stop_host(&self, host: &Host) -> Result<Stopped, EngineError> {
        let mut session = self.open(host).await?;
        let result: Result<Stopped, EngineError> = async {
            let stopped = match self
                .run_expect(&mut session, host, &self.commands.stop(), &CommandKind::Stop)
                .await
            {
                Ok(_) => Stopped::Stopped,
                Err(EngineError::CommandRejected { reason, .. })
                    if interpret::daemon_not_running(&reason) =>
                {
                    info!(host = %host.name, "daemon already stopped");
                    Stopped::AlreadyStopped
                }
                Err(e) => return Err(e),
            };
            if stopped == Stopped::Stopped {
                self.settle(self.config.timing.stop_settle()).await?;
            }
            Ok(stopped)
        }
        .await;
        session.close().await;
        result
    }

    /// Wipe (optional), regenerate config, start, settle; main also enables
    /// generation
    pub(crate) async fn start_host(&self, host: &Host, wipe: bool) -> Result<(), EngineError> {
        let mut session = self.open(host).await?;
        let result: Result<(), EngineError> = async {
            if wipe {
                self.run_expect(
                    &mut session,
                    host,
                    &self.commands.wipe_chain_data(),
                    &CommandKind::FileOperation,
                )
                .await?;
                info!(host = %host.name, "chain data wiped");
            }

            if host.role == Role::Masternode {
                info!(host = %host.name, "keeping existing masternode config");
            } else {
                let conf = self.staking_config_for(host);
                self.write_node_config(&mut session, host, &conf).await?;
            }

            self.run_expect(
                &mut session,
                host,
                &self.commands.start_daemon(),
                &CommandKind::Start,
            )
            .await?;
            self.settle(self.config.timing.daemon_settle()).await?;

            if host.role == Role::Main {
                self.run_expect(
                    &mut session,
                    host,
                    &self.commands.enable_generation(),
                    &CommandKind::SetGenerate,
                )
                .await?;
            }
            Ok(())
        }
        .await;
        session.close().await;
        result
    }

    /// Start the daemon as-is, without touching config or data
    async fn start_daemon_on(&self, host: &Host) -> Result<(), EngineError> {
        let mut session = self.open(host).await?;
        let result: Result<(), EngineError> = async {
            self.run_expect(
                &mut session,
                host,
                &self.commands.start_daemon(),
                &CommandKind::Start,
            )
            .await?;
            self.settle(self.config.timing.daemon_settle()).await
        }
        .await;
        session.close().await;
        result
    }

    async fn reboot_host(&self, host: &Host) -> Result<(), EngineError> {
        let mut session = self.open(host).await?;
        let result = self.run(&mut session, host, &self.config.reboot_command).await;
        session.close().await;
        match result {
            Ok(_) => Ok(()),
            // the host drops the connection while going down
            Err(EngineError::Session { source, .. }) => {
                warn!(host = %host.name, error = %source, "session dropped during reboot");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
