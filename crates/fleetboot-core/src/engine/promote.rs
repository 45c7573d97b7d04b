use tracing::{info, warn};

use super::Engine;
use crate::error::EngineError;
use crate::interpret::CommandKind;
use crate::nodeconf::NodeConfig;
use crate::registry::{Host, Role};
use crate::report::{Procedure, ProcedureReport};

impl Engine {
    /// Turn every masternode-role host into a masternode fed by one staking host
    ///
    /// The staking host gets a config listing each masternode as a peer, is
    /// started, and generates a single masternode key. Each masternode is then
    /// reconfigured with that key and restarted. Failing to reach the staking
    /// host or to obtain a key is fatal; a masternode that fails does not stop
    /// its siblings.
    pub async fn promote_masternodes(&self, staking_host: Option<&Host>) -> ProcedureReport {
        let mut report = ProcedureReport::new(Procedure::PromoteMasternodes);
        let staking = staking_host.unwrap_or_else(|| self.registry.staking_host());
        let masternodes: Vec<&Host> = self.registry.by_role(Role::Masternode).collect();
        if masternodes.is_empty() {
            return report.abort("select", &EngineError::NoHostForRole(Role::Masternode));
        }

        let key = match self.prepare_staking_host(&mut report, staking, &masternodes).await {
            Ok(key) => key,
            Err((stage, e)) => return report.abort(stage, &e),
        };

        for masternode in masternodes {
            let result = self.install_masternode(masternode, staking, &key).await;
            if matches!(result, Err(EngineError::Cancelled)) {
                return report.abort("restart-masternode", &EngineError::Cancelled);
            }
            match &result {
                Ok(()) => report.stage_ok("restart-masternode", Some(masternode), None),
                Err(e) => report.stage_failed("restart-masternode", Some(masternode), e),
            }
            report.host_result(masternode, result.as_ref().map(|_| ()));
        }

        report.finish()
    }

    /// Config, start and genkey on the staking host; returns the key
    async fn prepare_staking_host(
        &self,
        report: &mut ProcedureReport,
        staking: &Host,
        masternodes: &[&Host],
    ) -> Result<String, (&'static str, EngineError)> {
        let mut session = self
            .open(staking)
            .await
            .map_err(|e| ("connect-staking", e))?;

        let result: Result<String, (&'static str, EngineError)> = async {
            let mut peers: Vec<String> = masternodes.iter().map(|h| h.address.clone()).collect();
            peers.extend(self.registry.peer_addresses(Some(staking)));
            let conf = NodeConfig::staking(&self.config.base_config, peers);
            self.write_node_config(&mut session, staking, &conf)
                .await
                .map_err(|e| ("staking-config", e))?;
            report.stage_ok(
                "staking-config",
                Some(staking),
                Some(format!("{} peers", conf.peers().len())),
            );

            // the daemon may already be up; carry on either way
            match self
                .run_expect(
                    &mut session,
                    staking,
                    &self.commands.start_daemon(),
                    &CommandKind::Start,
                )
                .await
            {
                Ok(_) => report.stage_ok("start-staking", Some(staking), None),
                Err(e) => report.stage_failed("start-staking", Some(staking), &e),
            }
            self.settle(self.config.timing.daemon_settle())
                .await
                .map_err(|e| ("start-staking", e))?;

            let key = self
                .run_token(
                    &mut session,
                    staking,
                    &self.commands.genkey(),
                    &CommandKind::GenKey,
                )
                .await
                .map_err(|e| ("genkey", e))?;
            report.stage_ok("genkey", Some(staking), None);
            Ok(key)
        }
        .await;

        session.close().await;
        result
    }

    /// Rewrite one masternode's config with `key` and restart it
    async fn install_masternode(
        &self,
        masternode: &Host,
        staking: &Host,
        key: &str,
    ) -> Result<(), EngineError> {
        let conf = NodeConfig::staking(&self.config.base_config, [staking.address.as_str()])
            .with_masternode_key(&masternode.address, key)
            .promoted();

        let mut session = self.open(masternode).await?;
        let result: Result<(), EngineError> = async {
            self.write_node_config(&mut session, masternode, &conf)
                .await?;

            match self
                .run_expect(
                    &mut session,
                    masternode,
                    &self.commands.stop(),
                    &CommandKind::Stop,
                )
                .await
            {
                Ok(_) => self.settle(self.config.timing.stop_settle()).await?,
                Err(EngineError::CommandRejected { reason, .. }) => {
                    warn!(host = %masternode.name, %reason, "stop refused, starting anyway");
                }
                Err(e) => return Err(e),
            }

            self.run_expect(
                &mut session,
                masternode,
                &self.commands.start_daemon(),
                &CommandKind::Start,
            )
            .await?;
            self.settle(self.config.timing.daemon_settle()).await?;
            info!(host = %masternode.name, "masternode restarted with new key");
            Ok(())
        }
        .await;
        session.close().await;
        result
    }
}
