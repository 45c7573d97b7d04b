//! Command lines for the remote daemon and its CLI

use crate::config::FleetConfig;

/// Chain data removed by a wipe; wallet and config files are kept
const CHAIN_DATA: [&str; 12] = [
    "blocks",
    "chainstate",
    "database",
    "sporks",
    "zerocoin",
    "peers.dat",
    "banlist.dat",
    "mncache.dat",
    "mnpayments.dat",
    "budget.dat",
    "fee_estimates.dat",
    "debug.log",
];

/// Builds the command strings sent to remote hosts
///
/// Network mode is folded in once here, so every command and path produced
/// carries the right `-testnet` flag and config directory.
#[derive(Debug, Clone)]
pub struct DaemonCommands {
    cli: String,
    daemon: String,
    options: String,
    config_dir: String,
    conf_file: String,
}

impl DaemonCommands {
    #[must_use]
    pub fn new(config: &FleetConfig) -> Self {
        let mut parts: Vec<&str> = config.server_option.split_whitespace().collect();
        if let Some(flag) = config.network.flag() {
            parts.push(flag);
        }
        let options = parts.join(" ");

        Self {
            cli: config.cli_binary.clone(),
            daemon: config.daemon_binary.clone(),
            options,
            config_dir: config.config_dir(),
            conf_file: config.conf_file.clone(),
        }
    }

    /// `<cli> [options] <args>`
    #[must_use]
    pub fn cli(&self, args: &str) -> String {
        if self.options.is_empty() {
            format!("{} {args}", self.cli)
        } else {
            format!("{} {} {args}", self.cli, self.options)
        }
    }

    #[must_use]
    pub fn start_daemon(&self) -> String {
        if self.options.is_empty() {
            format!("{} -daemon", self.daemon)
        } else {
            format!("{} {} -daemon", self.daemon, self.options)
        }
    }

    #[must_use]
    pub fn stop(&self) -> String {
        self.cli("stop")
    }

    #[must_use]
    pub fn status(&self) -> String {
        self.cli("status")
    }

    #[must_use]
    pub fn masternode_status(&self) -> String {
        self.cli("masternode status")
    }

    #[must_use]
    pub fn get_balance(&self) -> String {
        self.cli("getbalance")
    }

    #[must_use]
    pub fn genkey(&self) -> String {
        self.cli("masternode genkey")
    }

    #[must_use]
    pub fn account_address(&self, account: &str) -> String {
        self.cli(&format!("getaccountaddress \"{account}\""))
    }

    #[must_use]
    pub fn send_to_address(&self, address: &str, amount: f64) -> String {
        self.cli(&format!("sendtoaddress {address} {amount}"))
    }

    #[must_use]
    pub fn masternode_outputs(&self) -> String {
        self.cli("masternode outputs")
    }

    #[must_use]
    pub fn enable_generation(&self) -> String {
        self.cli("setgenerate true 1")
    }

    /// Start a masternode by alias from the control wallet
    #[must_use]
    pub fn start_masternode_alias(&self, alias: &str) -> String {
        self.cli(&format!("startmasternode alias false {alias}"))
    }

    /// Start the masternode role on the masternode host itself
    #[must_use]
    pub fn start_masternode_local(&self) -> String {
        self.cli("startmasternode local false")
    }

    /// Remove on-disk chain data, keeping wallet and config
    #[must_use]
    pub fn wipe_chain_data(&self) -> String {
        let targets = CHAIN_DATA
            .iter()
            .map(|entry| format!("{}/{entry}", self.config_dir))
            .collect::<Vec<_>>()
            .join(" ");
        format!("rm -rf {targets}")
    }

    /// Make sure the config directory exists
    #[must_use]
    pub fn ensure_config_dir(&self) -> String {
        format!("mkdir -p {}", self.config_dir)
    }

    #[must_use]
    pub fn conf_path(&self) -> String {
        format!("{}/{}", self.config_dir, self.conf_file)
    }

    #[must_use]
    pub fn masternode_conf_path(&self) -> String {
        format!("{}/masternode.conf", self.config_dir)
    }

    #[must_use]
    pub fn uptime() -> &'static str {
        "uptime"
    }

    #[must_use]
    pub fn service_check(name: &str) -> String {
        format!("ps -e|grep {name}")
    }
}
