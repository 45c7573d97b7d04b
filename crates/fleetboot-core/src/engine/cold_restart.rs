use tracing::{info, instrument, warn};

use super::{Engine, poll_failure};
use crate::error::EngineError;
use crate::interpret::{CommandKind, Decision};
use crate::nodeconf::{Confirmation, NodeConfig, ProvisioningRecord};
use crate::poll::Poller;
use crate::registry::{Host, Role};
use crate::report::{Procedure, ProcedureReport, TransferRecord};

/// Knobs for a cold restart
#[derive(Debug, Clone, Default)]
pub struct ColdRestartOptions {
    /// Erase chain data on every host after stopping
    pub wipe: bool,
    /// Collateral to send; the configured amount when unset
    pub amount: Option<f64>,
}

type StageResult<T> = Result<T, (&'static str, EngineError)>;

impl Engine {
    /// Bring the whole network up from nothing and provision the first
    /// masternode
    ///
    /// Stages run in order and any failure aborts the rest. The collateral
    /// confirmation poll is the only unbounded wait, unless the poll policy
    /// sets a bound.
    #[instrument(skip(self), fields(network = ?self.config.network))]
    pub async fn cold_restart(&self, options: &ColdRestartOptions) -> ProcedureReport {
        let mut report = ProcedureReport::new(Procedure::ColdRestart);
        match self.cold_restart_stages(&mut report, options).await {
            Ok(()) => report.finish(),
            Err((stage, e)) => report.abort(stage, &e),
        }
    }

    async fn cold_restart_stages(
        &self,
        report: &mut ProcedureReport,
        options: &ColdRestartOptions,
    ) -> StageResult<()> {
        let amount = self.amount(options.amount).map_err(|e| ("select", e))?;
        let main = self.registry.main();
        let control = self.registry.control_wallet(&self.config);
        let Some(masternode) = self.registry.first_masternode() else {
            return Err((
                "select-masternode",
                EngineError::NoHostForRole(Role::Masternode),
            ));
        };
        if self.registry.by_role(Role::Masternode).count() > 1 {
            warn!(
                provisioned = %masternode.name,
                "only the first masternode is provisioned by a cold restart"
            );
        }
        let all = self.registry.all();

        // every host is attempted before the stage decides
        let mut first_failure = None;
        for host in &all {
            match self.stop_host(host).await {
                Ok(_) => report.stage_ok("stop-all", Some(host), None),
                Err(e) => {
                    report.stage_failed("stop-all", Some(host), &e);
                    first_failure.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_failure {
            return Err(("stop-all", e));
        }

        if options.wipe {
            for host in &all {
                self.wipe_host(host).await.map_err(|e| ("wipe", e))?;
                report.stage_ok("wipe", Some(host), None);
            }
        }

        self.start_host(main, false)
            .await
            .map_err(|e| ("start-main", e))?;
        report.stage_ok("start-main", Some(main), None);

        self.settle(self.config.timing.bootstrap_settle())
            .await
            .map_err(|e| ("bootstrap-settle", e))?;

        if control.name != main.name {
            self.stop_host(control)
                .await
                .map_err(|e| ("restart-control", e))?;
            self.start_host(control, false)
                .await
                .map_err(|e| ("restart-control", e))?;
            report.stage_ok("restart-control", Some(control), None);
        }

        let key = self
            .query_token(control, &self.commands.genkey(), &CommandKind::GenKey)
            .await
            .map_err(|e| ("genkey", e))?;
        report.stage_ok("genkey", Some(control), None);
        let mut record = ProvisioningRecord::new(
            &self.config.masternode_alias,
            key,
            self.config.network.masternode_port(),
        );

        let funding_address = self
            .query_token(
                control,
                &self.commands.account_address(&record.alias),
                &CommandKind::AccountAddress,
            )
            .await
            .map_err(|e| ("funding-address", e))?;
        report.stage_ok("funding-address", Some(control), Some(funding_address.clone()));

        let tx_hash = self
            .query_token(
                main,
                &self.commands.send_to_address(&funding_address, amount),
                &CommandKind::SendToAddress,
            )
            .await
            .map_err(|e| ("send-collateral", e))?;
        report.stage_ok("send-collateral", Some(main), Some(tx_hash.clone()));
        report.transfers.push(TransferRecord {
            destination: control.name.clone(),
            address: funding_address,
            amount,
            tx_hash: tx_hash.clone(),
        });
        record.collateral_tx = Some(tx_hash.clone());

        let attempts = self
            .await_confirmation(control, &tx_hash)
            .await
            .map_err(|e| ("confirm-collateral", e))?;
        record.confirmation = Confirmation::Confirmed;
        report.stage_ok(
            "confirm-collateral",
            Some(control),
            Some(format!("confirmed after {attempts} polls")),
        );

        let line = record
            .masternode_conf_line(&masternode.address)
            .ok_or_else(|| {
                (
                    "masternode-conf",
                    EngineError::Unconfirmed {
                        awaiting: format!("transaction {tx_hash}"),
                        attempts,
                    },
                )
            })?;
        self.write_masternode_conf(control, &line)
            .await
            .map_err(|e| ("masternode-conf", e))?;
        report.stage_ok("masternode-conf", Some(control), Some(line));

        let conf = NodeConfig::staking(
            &self.config.base_config,
            self.registry.peer_addresses(Some(masternode)),
        )
        .with_masternode_key(&masternode.address, &record.private_key)
        .promoted();
        self.start_configured(masternode, &conf)
            .await
            .map_err(|e| ("start-masternode-daemon", e))?;
        report.stage_ok("start-masternode-daemon", Some(masternode), None);

        self.query(
            control,
            &self.commands.start_masternode_alias(&record.alias),
            &CommandKind::StartMasternode,
        )
        .await
        .map_err(|e| ("start-masternode-alias", e))?;
        report.stage_ok("start-masternode-alias", Some(control), None);

        self.query(
            masternode,
            &self.commands.start_masternode_local(),
            &CommandKind::StartMasternode,
        )
        .await
        .map_err(|e| ("start-masternode-local", e))?;
        report.stage_ok("start-masternode-local", Some(masternode), None);

        info!(masternode = %masternode.name, alias = %record.alias, "masternode provisioned");
        Ok(())
    }

    /// Poll `masternode outputs` on `host` until `tx_hash` shows up
    ///
    /// Returns the number of polls made. A poll that cannot reach the host
    /// counts as not yet confirmed.
    pub(crate) async fn await_confirmation(
        &self,
        host: &Host,
        tx_hash: &str,
    ) -> Result<u32, EngineError> {
        let policy = self.config.timing.poll.policy();
        if policy.is_unbounded() {
            info!(tx = %tx_hash, "waiting for confirmation without a bound");
        }
        let mut poller = Poller::new(&policy, &self.cancel);
        let kind = CommandKind::MasternodeOutputs {
            tx_hash: tx_hash.to_string(),
        };

        loop {
            let attempt = poller
                .next_attempt()
                .await
                .map_err(|e| poll_failure(&e, format!("transaction {tx_hash}")))?;

            match self
                .query(host, &self.commands.masternode_outputs(), &kind)
                .await
            {
                Ok(Decision::Confirmed(true)) => {
                    info!(tx = %tx_hash, attempt, "transaction confirmed");
                    return Ok(attempt);
                }
                Ok(_) => info!(tx = %tx_hash, attempt, "not confirmed yet"),
                Err(e) => warn!(tx = %tx_hash, attempt, error = %e, "confirmation poll failed"),
            }
        }
    }

    async fn wipe_host(&self, host: &Host) -> Result<(), EngineError> {
        self.query(
            host,
            &self.commands.wipe_chain_data(),
            &CommandKind::FileOperation,
        )
        .await
        .map(|_| ())
    }

    async fn write_masternode_conf(&self, host: &Host, line: &str) -> Result<(), EngineError> {
        let mut session = self.open(host).await?;
        let result: Result<(), EngineError> = async {
            self.run(&mut session, host, &self.commands.ensure_config_dir())
                .await?;
            self.write_file(
                &mut session,
                host,
                &self.commands.masternode_conf_path(),
                format!("{line}\n").as_bytes(),
            )
            .await
        }
        .await;
        session.close().await;
        result
    }

    /// Write `conf`, start the daemon and settle
    async fn start_configured(&self, host: &Host, conf: &NodeConfig) -> Result<(), EngineError> {
        let mut session = self.open(host).await?;
        let result: Result<(), EngineError> = async {
            self.write_node_config(&mut session, host, conf).await?;
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
}
