//! Fleet configuration
//!
//! One immutable value describing every host, the shared credentials and the
//! daemon layout. Loaded once at startup and handed to the engine.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::poll::PollPolicy;

/// Configuration for a single host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Unique host name
    pub name: String,
    /// IP address or hostname for SSH and for peer lines
    pub address: String,
    /// SSH user, falls back to the shared username
    pub username: Option<String>,
    /// SSH password, falls back to the shared password
    pub password: Option<String>,
    /// Private key file, falls back to the shared key file
    #[serde(alias = "publickeyfile")]
    pub public_key_file: Option<String>,
    /// SSH port, falls back to the shared port, then 22
    pub port: Option<u16>,
}

impl HostConfig {
    /// Host entry with only name and address set
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            username: None,
            password: None,
            public_key_file: None,
            port: None,
        }
    }
}

/// Which chain the fleet runs on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    #[default]
    Mainnet,
    Testnet,
}

impl NetworkMode {
    /// Masternode listening port
    #[must_use]
    pub fn masternode_port(self) -> u16 {
        match self {
            NetworkMode::Mainnet => 53572,
            NetworkMode::Testnet => 53575,
        }
    }

    /// Directory holding the node config, `masternode.conf` and chain data
    #[must_use]
    pub fn config_dir(self, data_dir: &str) -> String {
        let data_dir = data_dir.trim_end_matches('/');
        match self {
            NetworkMode::Mainnet => data_dir.to_string(),
            NetworkMode::Testnet => format!("{data_dir}/testnet4"),
        }
    }

    /// Extra flag passed to the daemon and its CLI
    #[must_use]
    pub fn flag(self) -> Option<&'static str> {
        match self {
            NetworkMode::Mainnet => None,
            NetworkMode::Testnet => Some("-testnet"),
        }
    }
}

/// Fixed waits and poll bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Wait after starting a daemon before talking to it
    pub daemon_settle_secs: u64,
    /// Wait after asking a daemon to stop
    pub stop_settle_secs: u64,
    /// Wait after the main staking wallet starts during a cold restart
    pub bootstrap_settle_secs: u64,
    /// Wait for rebooted hosts to come back
    pub reboot_settle_secs: u64,
    /// Pause between hosts in the status sweep
    pub sweep_pause_secs: u64,
    /// Per-command timeout on remote sessions
    pub command_timeout_secs: u64,
    /// Confirmation and balance polling
    pub poll: PollSettings,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            daemon_settle_secs: 10,
            stop_settle_secs: 5,
            bootstrap_settle_secs: 60,
            reboot_settle_secs: 60,
            sweep_pause_secs: 2,
            command_timeout_secs: 120,
            poll: PollSettings::default(),
        }
    }
}

impl Timing {
    /// No waits at all
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            daemon_settle_secs: 0,
            stop_settle_secs: 0,
            bootstrap_settle_secs: 0,
            reboot_settle_secs: 0,
            sweep_pause_secs: 0,
            command_timeout_secs: 120,
            poll: PollSettings {
                interval_secs: 0,
                max_attempts: None,
                deadline_secs: None,
            },
        }
    }

    #[must_use]
    pub fn daemon_settle(&self) -> Duration {
        Duration::from_secs(self.daemon_settle_secs)
    }

    #[must_use]
    pub fn stop_settle(&self) -> Duration {
        Duration::from_secs(self.stop_settle_secs)
    }

    #[must_use]
    pub fn bootstrap_settle(&self) -> Duration {
        Duration::from_secs(self.bootstrap_settle_secs)
    }

    #[must_use]
    pub fn reboot_settle(&self) -> Duration {
        Duration::from_secs(self.reboot_settle_secs)
    }

    #[must_use]
    pub fn sweep_pause(&self) -> Duration {
        Duration::from_secs(self.sweep_pause_secs)
    }

    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Poll loop settings; both bounds are optional and an unbounded poll only
/// ends on success or cancellation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    /// Delay between attempts
    pub interval_secs: u64,
    /// Give up after this many attempts
    pub max_attempts: Option<u32>,
    /// Give up once this much time has passed
    pub deadline_secs: Option<u64>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            max_attempts: None,
            deadline_secs: Some(6 * 60 * 60),
        }
    }
}

impl PollSettings {
    /// Convert to the poller's policy
    #[must_use]
    pub fn policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.interval_secs),
            max_attempts: self.max_attempts,
            deadline: self.deadline_secs.map(Duration::from_secs),
        }
    }
}

/// Top-level fleet configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    /// Shared SSH user
    #[serde(default = "default_user")]
    pub username: String,
    /// Shared SSH password
    #[serde(default)]
    pub password: Option<String>,
    /// Shared private key file
    #[serde(default, alias = "publickeyfile")]
    pub public_key_file: Option<String>,
    /// Environment variable holding a base64 private key
    #[serde(default)]
    pub key_env: Option<String>,
    /// Shared SSH port
    #[serde(default)]
    pub port: Option<u16>,

    /// The proof-of-work node that funds everything else
    pub main: HostConfig,
    #[serde(default)]
    pub masternodes: Vec<HostConfig>,
    #[serde(default, alias = "stakingnodes")]
    pub staking_nodes: Vec<HostConfig>,
    #[serde(default)]
    pub wallets: Vec<HostConfig>,

    #[serde(default)]
    pub network: NetworkMode,
    /// Default collateral transfer amount
    #[serde(default = "default_collateral", alias = "coinamount")]
    pub collateral_amount: f64,
    /// Alias used in `masternode.conf` and for the funding account
    #[serde(default = "default_alias", alias = "alias")]
    pub masternode_alias: String,
    /// Host that holds the collateral and `masternode.conf` (default: main)
    #[serde(default)]
    pub control_wallet: Option<String>,

    #[serde(default = "default_cli_binary")]
    pub cli_binary: String,
    #[serde(default = "default_daemon_binary")]
    pub daemon_binary: String,
    /// Extra flags appended to every daemon and CLI invocation
    #[serde(default, alias = "serveroption")]
    pub server_option: String,
    /// Daemon data directory on the remote hosts
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Node config file name inside the config directory
    #[serde(default = "default_conf_file")]
    pub conf_file: String,
    /// Lines every generated node config starts with
    #[serde(default = "default_base_config")]
    pub base_config: Vec<String>,
    /// Processes that must be running on the main node
    #[serde(default = "default_main_services")]
    pub main_services: Vec<String>,
    /// Command used to reboot a host
    #[serde(default = "default_reboot_command")]
    pub reboot_command: String,

    /// Local binaries pushed by the rollout
    #[serde(default = "default_binaries")]
    pub binaries: Vec<PathBuf>,
    /// Remote directory the binaries are installed into
    #[serde(default = "default_install_dir")]
    pub install_dir: String,

    /// Cloud project for operator consoles
    #[serde(default)]
    pub project: Option<String>,
    /// Cloud zone for operator consoles
    #[serde(default)]
    pub zone: Option<String>,
    /// Terminal program and flags that wrap each console
    #[serde(default = "default_terminal")]
    pub terminal: Vec<String>,

    #[serde(default)]
    pub timing: Timing,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_user() -> String {
    "root".to_string()
}

fn default_collateral() -> f64 {
    1_000_000.0
}

fn default_alias() -> String {
    "mn1".to_string()
}

fn default_cli_binary() -> String {
    "dapscoin-cli".to_string()
}

fn default_daemon_binary() -> String {
    "dapscoind".to_string()
}

fn default_data_dir() -> String {
    "~/.dapscoin".to_string()
}

fn default_conf_file() -> String {
    "dapscoin.conf".to_string()
}

fn default_base_config() -> Vec<String> {
    vec![
        "daemon=1".to_string(),
        "server=1".to_string(),
        "listen=1".to_string(),
    ]
}

fn default_main_services() -> Vec<String> {
    vec!["mongo".to_string(), "node".to_string()]
}

fn default_reboot_command() -> String {
    "sudo reboot".to_string()
}

fn default_binaries() -> Vec<PathBuf> {
    vec![PathBuf::from("dapscoind"), PathBuf::from("dapscoin-cli")]
}

fn default_install_dir() -> String {
    "/usr/local/bin".to_string()
}

fn default_terminal() -> Vec<String> {
    vec!["xterm".to_string(), "-e".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}

impl FleetConfig {
    /// Config with only a main host and defaults everywhere else
    pub fn new(main: HostConfig) -> Self {
        Self {
            username: default_user(),
            password: None,
            public_key_file: None,
            key_env: None,
            port: None,
            main,
            masternodes: Vec::new(),
            staking_nodes: Vec::new(),
            wallets: Vec::new(),
            network: NetworkMode::default(),
            collateral_amount: default_collateral(),
            masternode_alias: default_alias(),
            control_wallet: None,
            cli_binary: default_cli_binary(),
            daemon_binary: default_daemon_binary(),
            server_option: String::new(),
            data_dir: default_data_dir(),
            conf_file: default_conf_file(),
            base_config: default_base_config(),
            main_services: default_main_services(),
            reboot_command: default_reboot_command(),
            binaries: default_binaries(),
            install_dir: default_install_dir(),
            project: None,
            zone: None,
            terminal: default_terminal(),
            timing: Timing::default(),
            log_level: default_log_level(),
        }
    }

    /// Every host entry, main first, then masternodes, staking nodes, wallets
    pub fn host_entries(&self) -> impl Iterator<Item = &HostConfig> {
        std::iter::once(&self.main)
            .chain(&self.masternodes)
            .chain(&self.staking_nodes)
            .chain(&self.wallets)
    }

    /// Check the config for mistakes that would only surface mid-procedure
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` describing the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        for host in self.host_entries() {
            if host.name.trim().is_empty() {
                return Err(ConfigError::Invalid("host with empty name".to_string()));
            }
            if host.address.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "host {} has an empty address",
                    host.name
                )));
            }
        }

        // the same host may appear in two role lists, but not twice in one
        for (role, list) in [
            ("masternodes", &self.masternodes),
            ("staking_nodes", &self.staking_nodes),
            ("wallets", &self.wallets),
        ] {
            let mut seen = HashSet::new();
            for host in list {
                if !seen.insert(host.name.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "host {} listed twice in {role}",
                        host.name
                    )));
                }
            }
        }

        if let Some(control) = &self.control_wallet
            && !self.host_entries().any(|h| &h.name == control)
        {
            return Err(ConfigError::Invalid(format!(
                "control_wallet {control} is not a configured host"
            )));
        }

        if !(self.collateral_amount.is_finite() && self.collateral_amount > 0.0) {
            return Err(ConfigError::Invalid(
                "collateral_amount must be a positive number".to_string(),
            ));
        }

        if self.masternode_alias.trim().is_empty()
            || self.masternode_alias.contains(char::is_whitespace)
        {
            return Err(ConfigError::Invalid(
                "masternode_alias must be a single non-empty word".to_string(),
            ));
        }

        Ok(())
    }

    /// Directory holding node config and `masternode.conf` for this network
    #[must_use]
    pub fn config_dir(&self) -> String {
        self.network.config_dir(&self.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> FleetConfig {
        let mut config = FleetConfig::new(HostConfig::new("main", "10.0.0.1"));
        config.masternodes = vec![HostConfig::new("mn1", "10.0.0.2")];
        config.staking_nodes = vec![HostConfig::new("stake1", "10.0.0.3")];
        config
    }

    #[test]
    fn test_network_mode_ports_and_paths() {
        assert_eq!(NetworkMode::Mainnet.masternode_port(), 53572);
        assert_eq!(NetworkMode::Testnet.masternode_port(), 53575);
        assert_eq!(NetworkMode::Mainnet.config_dir("~/.dapscoin/"), "~/.dapscoin");
        assert_eq!(
            NetworkMode::Testnet.config_dir("~/.dapscoin"),
            "~/.dapscoin/testnet4"
        );
        assert_eq!(NetworkMode::Testnet.flag(), Some("-testnet"));
    }

    #[test]
    fn test_validate_ok() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_same_host_in_two_role_lists_is_allowed() {
        let mut config = config();
        config.staking_nodes.push(HostConfig::new("mn1", "10.0.0.2"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_in_one_list_rejected() {
        let mut config = config();
        config.masternodes.push(HostConfig::new("mn1", "10.0.0.9"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_control_wallet_rejected() {
        let mut config = config();
        config.control_wallet = Some("nowhere".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_address_rejected() {
        let mut config = config();
        config.wallets.push(HostConfig::new("watch", " "));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_collateral_rejected() {
        for amount in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let mut config = config();
            config.collateral_amount = amount;
            assert!(config.validate().is_err(), "amount {amount}");
        }
    }

    #[test]
    fn test_alias_with_whitespace_rejected() {
        let mut config = config();
        config.masternode_alias = "mn one".to_string();
        assert!(config.validate().is_err());

        config.masternode_alias = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_host_entries_order() {
        let mut config = config();
        config.wallets.push(HostConfig::new("watch", "10.0.0.4"));
        let names: Vec<_> = config.host_entries().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["main", "mn1", "stake1", "watch"]);
    }
}
