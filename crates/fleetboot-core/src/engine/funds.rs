use tracing::{info, instrument, warn};

use super::{Engine, poll_failure};
use crate::error::EngineError;
use crate::interpret::{CommandKind, Decision};
use crate::poll::Poller;
use crate::registry::Host;
use crate::report::{Procedure, ProcedureReport, TransferRecord};

/// Where a transfer goes
#[derive(Debug, Clone)]
struct Destination<'a> {
    label: String,
    address: String,
    host: Option<&'a Host>,
}

impl Engine {
    /// Send `amount` from the main wallet to each destination
    ///
    /// Host destinations get their default account address derived first;
    /// `addresses` are used as-is. Every send goes through one session to
    /// the main node. A destination that fails does not stop the others.
    #[instrument(skip(self, hosts, addresses), fields(hosts = hosts.len(), addresses = addresses.len()))]
    pub async fn transfer_funds(
        &self,
        hosts: &[Host],
        addresses: &[String],
        amount: Option<f64>,
    ) -> ProcedureReport {
        let mut report = ProcedureReport::new(Procedure::TransferFunds);
        if hosts.is_empty() && addresses.is_empty() {
            return report.abort(
                "select",
                &EngineError::HostNotFound("no transfer destination".to_string()),
            );
        }
        let amount = match self.amount(amount) {
            Ok(a) => a,
            Err(e) => return report.abort("select", &e),
        };

        let mut destinations = Vec::new();
        for host in hosts {
            match self
                .query_token(host, &self.commands.account_address(""), &CommandKind::AccountAddress)
                .await
            {
                Ok(address) => {
                    report.stage_ok("derive-address", Some(host), Some(address.clone()));
                    destinations.push(Destination {
                        label: host.name.clone(),
                        address,
                        host: Some(host),
                    });
                }
                Err(e) => {
                    report.stage_failed("derive-address", Some(host), &e);
                    report.host_result(host, Err(&e));
                }
            }
        }
        destinations.extend(addresses.iter().map(|a| Destination {
            label: a.clone(),
            address: a.clone(),
            host: None,
        }));

        if destinations.is_empty() {
            return report.finish();
        }

        let main = self.registry.main();
        let mut session = match self.open(main).await {
            Ok(s) => s,
            Err(e) => return report.abort("connect-main", &e),
        };

        for dest in destinations {
            let result = self
                .run_token(
                    &mut session,
                    main,
                    &self.commands.send_to_address(&dest.address, amount),
                    &CommandKind::SendToAddress,
                )
                .await;
            match &result {
                Ok(tx_hash) => {
                    report.stage_ok("send", dest.host, Some(tx_hash.clone()));
                    report.transfers.push(TransferRecord {
                        destination: dest.label.clone(),
                        address: dest.address.clone(),
                        amount,
                        tx_hash: tx_hash.clone(),
                    });
                }
                Err(e) => report.stage_failed("send", dest.host, e),
            }
            report.target_result(&dest.label, &dest.address, result.as_ref().map(|_| ()));
        }

        session.close().await;
        report.finish()
    }

    /// Poll `getbalance` on each host until all of them hold at least `amount`
    #[instrument(skip(self, hosts), fields(hosts = hosts.len()))]
    pub async fn await_balance(&self, hosts: &[Host], amount: Option<f64>) -> ProcedureReport {
        let mut report = ProcedureReport::new(Procedure::AwaitBalance);
        let amount = match self.amount(amount) {
            Ok(a) => a,
            Err(e) => return report.abort("select", &e),
        };
        let policy = self.config.timing.poll.policy();
        let mut poller = Poller::new(&policy, &self.cancel);

        loop {
            let attempt = match poller.next_attempt().await {
                Ok(n) => n,
                Err(e) => {
                    let err = poll_failure(&e, format!("balance of {amount}"));
                    return report.abort("await-balance", &err);
                }
            };

            let mut balances = Vec::with_capacity(hosts.len());
            for host in hosts {
                let balance = match self
                    .query(host, &self.commands.get_balance(), &CommandKind::GetBalance)
                    .await
                {
                    Ok(Decision::Balance(b)) => Some(b),
                    Ok(other) => {
                        warn!(host = %host.name, decision = ?other, "balance not readable");
                        None
                    }
                    Err(e) => {
                        warn!(host = %host.name, error = %e, "balance poll failed");
                        None
                    }
                };
                balances.push(balance);
            }

            let funded = balances.iter().filter(|b| b.is_some_and(|b| b >= amount)).count();
            info!(attempt, funded, total = hosts.len(), "balance poll");
            if funded == hosts.len() {
                for (host, balance) in hosts.iter().zip(balances) {
                    report.stage_ok(
                        "await-balance",
                        Some(host),
                        balance.map(|b| b.to_string()),
                    );
                    report.host_result(host, Ok(()));
                }
                return report.finish();
            }
        }
    }
}
