//! On-disk node configuration
//!
//! Node configs are a base template followed by one `addnode=` line per peer;
//! masternodes add `externalip=` and `masternodeprivkey=`, and a promoted
//! masternode also `masternode=1`.

use std::fmt;

/// A node config file about to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    base: Vec<String>,
    peers: Vec<String>,
    external_ip: Option<String>,
    private_key: Option<String>,
    masternode: bool,
}

impl NodeConfig {
    /// Staking node config: base lines plus peers, duplicates dropped in order
    pub fn staking<I, S>(base: &[String], peers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for peer in peers {
            let peer = peer.into();
            if !unique.contains(&peer) {
                unique.push(peer);
            }
        }
        Self {
            base: base.to_vec(),
            peers: unique,
            external_ip: None,
            private_key: None,
            masternode: false,
        }
    }

    /// Add the masternode identity lines
    #[must_use]
    pub fn with_masternode_key(
        mut self,
        external_ip: impl Into<String>,
        private_key: impl Into<String>,
    ) -> Self {
        self.external_ip = Some(external_ip.into());
        self.private_key = Some(private_key.into());
        self
    }

    /// Enable the masternode role
    #[must_use]
    pub fn promoted(mut self) -> Self {
        self.masternode = true;
        self
    }

    #[must_use]
    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    /// File contents, newline terminated
    #[must_use]
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for NodeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.base {
            writeln!(f, "{line}")?;
        }
        for peer in &self.peers {
            writeln!(f, "addnode={peer}")?;
        }
        if let Some(ip) = &self.external_ip {
            writeln!(f, "externalip={ip}")?;
        }
        if let Some(key) = &self.private_key {
            writeln!(f, "masternodeprivkey={key}")?;
        }
        if self.masternode {
            writeln!(f, "masternode=1")?;
        }
        Ok(())
    }
}

/// Confirmation state of the collateral transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Pending,
    Confirmed,
}

/// Everything gathered while provisioning one masternode
///
/// Written by the stage that produces each field, read by later stages of the
/// same procedure; lives only as long as the procedure.
#[derive(Debug, Clone)]
pub struct ProvisioningRecord {
    pub alias: String,
    pub private_key: String,
    pub collateral_tx: Option<String>,
    pub confirmation: Confirmation,
    pub port: u16,
}

impl ProvisioningRecord {
    pub fn new(alias: impl Into<String>, private_key: impl Into<String>, port: u16) -> Self {
        Self {
            alias: alias.into(),
            private_key: private_key.into(),
            collateral_tx: None,
            confirmation: Confirmation::Pending,
            port,
        }
    }

    /// `masternode.conf` line for the masternode at `address`
    ///
    /// `None` until the collateral transaction is confirmed.
    #[must_use]
    pub fn masternode_conf_line(&self, address: &str) -> Option<String> {
        if self.confirmation != Confirmation::Confirmed {
            return None;
        }
        let tx = self.collateral_tx.as_deref()?;
        Some(format!(
            "{} {address}:{} {} {tx} 1",
            self.alias, self.port, self.private_key
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Vec<String> {
        vec!["daemon=1".to_string(), "server=1".to_string()]
    }

    #[test]
    fn test_staking_config_one_addnode_per_peer_in_order() {
        let conf = NodeConfig::staking(&base(), ["10.0.0.3", "10.0.0.1", "10.0.0.2", "10.0.0.1"]);
        assert_eq!(
            conf.render(),
            "daemon=1\nserver=1\naddnode=10.0.0.3\naddnode=10.0.0.1\naddnode=10.0.0.2\n"
        );
    }

    #[test]
    fn test_masternode_config() {
        let conf = NodeConfig::staking(&base(), ["10.0.0.4"])
            .with_masternode_key("10.0.0.2", "5Kprivkey")
            .promoted();
        let text = conf.render();
        assert!(text.ends_with("addnode=10.0.0.4\nexternalip=10.0.0.2\nmasternodeprivkey=5Kprivkey\nmasternode=1\n"));
    }

    #[test]
    fn test_conf_line_requires_confirmation() {
        let mut record = ProvisioningRecord::new("mn1", "5Kprivkey", 53572);
        record.collateral_tx = Some("abc123".to_string());
        assert_eq!(record.masternode_conf_line("10.0.0.2"), None);

        record.confirmation = Confirmation::Confirmed;
        assert_eq!(
            record.masternode_conf_line("10.0.0.2").as_deref(),
            Some("mn1 10.0.0.2:53572 5Kprivkey abc123 1")
        );
    }
}
