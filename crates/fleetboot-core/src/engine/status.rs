use fleetboot_exec::Session;
use tracing::{debug, warn};

use super::Engine;
use crate::daemon::DaemonCommands;
use crate::error::EngineError;
use crate::interpret::{self, CommandKind, Decision, interpret};
use crate::registry::{Host, Role};
use crate::report::{HostSnapshot, Procedure, ProcedureReport, ServiceCheck};

impl Engine {
    /// Health snapshot of each host, one at a time
    ///
    /// An unreachable host yields a snapshot with `reachable == false`; the
    /// sweep carries on with the rest.
    pub async fn status_sweep(&self, hosts: &[Host]) -> ProcedureReport {
        let mut report = ProcedureReport::new(Procedure::StatusSweep);

        for (i, host) in hosts.iter().enumerate() {
            if i > 0
                && let Err(e) = self.settle(self.config.timing.sweep_pause()).await
            {
                return report.abort("sweep-pause", &e);
            }

            let mut snapshot = HostSnapshot::new(host);
            let result = match self.open(host).await {
                Ok(mut session) => {
                    snapshot.reachable = true;
                    let r = self.inspect(&mut session, host, &mut snapshot).await;
                    session.close().await;
                    r
                }
                Err(e) => Err(e),
            };

            if host.role == Role::Main
                && let Some(pinger) = &self.pinger
            {
                let alive = pinger.ping(&host.address).await;
                if !alive {
                    snapshot.defects.push("no ping reply".to_string());
                }
                snapshot.ping = Some(alive);
            }

            match &result {
                Ok(()) => {
                    let detail = if snapshot.defects.is_empty() {
                        "healthy".to_string()
                    } else {
                        snapshot.defects.join("; ")
                    };
                    report.stage_ok("inspect", Some(host), Some(detail));
                }
                Err(e) => report.stage_failed("inspect", Some(host), e),
            }
            report.host_result(host, result.as_ref().map(|_| ()));
            report.snapshots.push(snapshot);
        }

        report.finish()
    }

    async fn inspect(
        &self,
        session: &mut Session,
        host: &Host,
        snapshot: &mut HostSnapshot,
    ) -> Result<(), EngineError> {
        let uptime = self.run(session, host, DaemonCommands::uptime()).await?;
        snapshot.uptime = uptime.first_line().map(str::to_string);

        if host.role == Role::Main {
            for name in &self.config.main_services {
                let output = self
                    .run(session, host, &DaemonCommands::service_check(name))
                    .await?;
                let present = interpret::service_present(&output);
                if !present {
                    warn!(host = %host.name, service = %name, "service not detected");
                    snapshot.defects.push(format!("{name} not running"));
                }
                snapshot.services.push(ServiceCheck {
                    name: name.clone(),
                    present,
                });
            }

            let output = self.run(session, host, &self.commands.status()).await?;
            snapshot.daemon_status = Some(output.text());
            note_running(host, &interpret(&CommandKind::Status, &output), snapshot);
        } else {
            let output = self
                .run(session, host, &self.commands.masternode_status())
                .await?;
            snapshot.masternode_status = Some(output.text());
            match interpret(&CommandKind::MasternodeStatus, &output) {
                Decision::Rejected(reason) => {
                    debug!(host = %host.name, reason = %reason, "masternode status refused");
                    snapshot.daemon_running = Some(true);
                    if host.role == Role::Masternode {
                        snapshot.defects.push("not an active masternode".to_string());
                    } else {
                        snapshot.notes.push("not an active masternode".to_string());
                    }
                }
                decision => note_running(host, &decision, snapshot),
            }

            let output = self.run(session, host, &self.commands.get_balance()).await?;
            match interpret(&CommandKind::GetBalance, &output) {
                Decision::Balance(amount) => snapshot.balance = Some(amount),
                other => debug!(host = %host.name, decision = ?other, "no balance"),
            }
        }

        Ok(())
    }
}

fn note_running(host: &Host, decision: &Decision, snapshot: &mut HostSnapshot) {
    match decision {
        Decision::Running(running) => {
            snapshot.daemon_running = Some(*running);
            if !running {
                snapshot.defects.push("daemon not running".to_string());
            }
        }
        other => {
            debug!(host = %host.name, decision = ?other, "status not understood");
            snapshot.defects.push("daemon status unreadable".to_string());
        }
    }
}
