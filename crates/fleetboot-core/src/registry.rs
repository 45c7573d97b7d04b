//! Host registry
//!
//! Resolves the configured host groups into one ordered list of hosts with
//! their effective credentials, and maps command-line tokens onto hosts.

use std::fmt;
use std::path::PathBuf;

use fleetboot_exec::{AuthMethod, ConnectionInfo};
use kameo_macros::Reply;
use serde::Serialize;

use crate::config::{FleetConfig, HostConfig};
use crate::error::{ConfigError, EngineError};

/// Administrative role, fixed at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Main,
    Masternode,
    Staking,
    Wallet,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Main => "main",
            Role::Masternode => "masternode",
            Role::Staking => "staking",
            Role::Wallet => "wallet",
        };
        f.write_str(s)
    }
}

/// A known host with resolved credentials
#[derive(Debug, Clone)]
pub struct Host {
    pub name: String,
    pub address: String,
    pub role: Role,
    pub username: String,
    pub auth: AuthMethod,
    pub port: u16,
}

impl Host {
    /// Connection parameters for the session client
    #[must_use]
    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo::new(&self.name, &self.address, &self.username, self.auth.clone())
            .with_port(self.port)
    }

    fn same_entry(&self, other: &Host) -> bool {
        self.name == other.name && self.address == other.address
    }
}

/// Outcome of resolving command-line tokens
#[derive(Debug, Clone, Default, Reply)]
pub struct Resolution {
    /// Matched hosts, in registry order of first match
    pub hosts: Vec<Host>,
    /// Tokens that matched no host, in input order
    pub free: Vec<String>,
}

/// All known hosts, main first, then masternodes, staking nodes and wallets
#[derive(Debug, Clone)]
pub struct HostRegistry {
    hosts: Vec<Host>,
}

impl HostRegistry {
    /// Build the registry from a validated config
    ///
    /// # Errors
    /// Returns `ConfigError` if the config is invalid or a host has no usable
    /// credentials
    pub fn from_config(config: &FleetConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let groups = std::iter::once((Role::Main, std::slice::from_ref(&config.main)))
            .chain([
                (Role::Masternode, config.masternodes.as_slice()),
                (Role::Staking, config.staking_nodes.as_slice()),
                (Role::Wallet, config.wallets.as_slice()),
            ]);

        let mut hosts = Vec::new();
        for (role, entries) in groups {
            for entry in entries {
                hosts.push(Self::host_from(config, entry, role)?);
            }
        }

        Ok(Self { hosts })
    }

    fn host_from(config: &FleetConfig, entry: &HostConfig, role: Role) -> Result<Host, ConfigError> {
        let non_empty = |s: &Option<String>| s.clone().filter(|v| !v.trim().is_empty());

        // host settings win over shared ones; a key wins over a password at the same level
        let auth = if let Some(key) = non_empty(&entry.public_key_file) {
            AuthMethod::KeyFile(PathBuf::from(key))
        } else if let Some(password) = entry.password.clone() {
            AuthMethod::Password(password)
        } else if let Some(key) = non_empty(&config.public_key_file) {
            AuthMethod::KeyFile(PathBuf::from(key))
        } else if let Some(var) = non_empty(&config.key_env) {
            AuthMethod::EnvKey(var)
        } else if let Some(password) = config.password.clone() {
            AuthMethod::Password(password)
        } else {
            return Err(ConfigError::NoCredentials {
                host: entry.name.clone(),
            });
        };

        Ok(Host {
            name: entry.name.clone(),
            address: entry.address.clone(),
            role,
            username: entry
                .username
                .clone()
                .unwrap_or_else(|| config.username.clone()),
            auth,
            port: entry.port.or(config.port).unwrap_or(22),
        })
    }

    /// Every host entry, in role order
    #[must_use]
    pub fn entries(&self) -> &[Host] {
        &self.hosts
    }

    /// Default host set: every distinct host, in role order
    ///
    /// A host listed under two roles appears once, with its first role.
    #[must_use]
    pub fn all(&self) -> Vec<Host> {
        let mut out: Vec<Host> = Vec::with_capacity(self.hosts.len());
        for host in &self.hosts {
            if !out.iter().any(|h| h.same_entry(host)) {
                out.push(host.clone());
            }
        }
        out
    }

    /// The main node
    #[must_use]
    pub fn main(&self) -> &Host {
        // from_config always registers the main host first
        &self.hosts[0]
    }

    /// Hosts registered under `role`
    pub fn by_role(&self, role: Role) -> impl Iterator<Item = &Host> {
        self.hosts.iter().filter(move |h| h.role == role)
    }

    /// First configured masternode
    #[must_use]
    pub fn first_masternode(&self) -> Option<&Host> {
        self.by_role(Role::Masternode).next()
    }

    /// Host that runs the staking daemon during promotion: first staking node, else main
    #[must_use]
    pub fn staking_host(&self) -> &Host {
        self.by_role(Role::Staking).next().unwrap_or_else(|| self.main())
    }

    /// Host holding the collateral and `masternode.conf`
    #[must_use]
    pub fn control_wallet(&self, config: &FleetConfig) -> &Host {
        config
            .control_wallet
            .as_deref()
            .and_then(|name| self.hosts.iter().find(|h| h.name == name))
            .unwrap_or_else(|| self.main())
    }

    /// Map tokens onto hosts
    ///
    /// An exact match on name or address selects only that host. Otherwise every
    /// host whose name contains the token is selected. Tokens that match nothing
    /// are returned as free-form arguments.
    pub fn resolve<S: AsRef<str>>(&self, tokens: &[S]) -> Resolution {
        let mut resolution = Resolution::default();

        for token in tokens {
            let token = token.as_ref();
            let matched: Vec<&Host> = match self
                .hosts
                .iter()
                .find(|h| h.name == token || h.address == token)
            {
                Some(exact) => vec![exact],
                None => self
                    .hosts
                    .iter()
                    .filter(|h| !token.is_empty() && h.name.contains(token))
                    .collect(),
            };

            if matched.is_empty() {
                resolution.free.push(token.to_string());
                continue;
            }

            for host in matched {
                if !resolution.hosts.iter().any(|h| h.same_entry(host)) {
                    resolution.hosts.push(host.clone());
                }
            }
        }

        resolution
    }

    /// Resolve tokens for a procedure that takes only host selectors
    ///
    /// No tokens selects `default`.
    ///
    /// # Errors
    /// Returns `EngineError::HostNotFound` naming the first token that matched nothing
    pub fn select<S: AsRef<str>>(&self, tokens: &[S], default: Vec<Host>) -> Result<Vec<Host>, EngineError> {
        if tokens.is_empty() {
            return Ok(default);
        }
        let resolution = self.resolve(tokens);
        if let Some(unmatched) = resolution.free.first() {
            return Err(EngineError::HostNotFound(unmatched.clone()));
        }
        Ok(resolution.hosts)
    }

    /// Addresses of every distinct peer except `exclude`, in registry order
    #[must_use]
    pub fn peer_addresses(&self, exclude: Option<&Host>) -> Vec<String> {
        let mut peers: Vec<String> = Vec::new();
        for host in &self.hosts {
            if exclude.is_some_and(|e| e.address == host.address) {
                continue;
            }
            if !peers.contains(&host.address) {
                peers.push(host.address.clone());
            }
        }
        peers
    }
}
