//! Observed host state
//!
//! Advisory cache written by the status sweep. Procedures never gate on it;
//! they always ask the host again.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::report::HostSnapshot;

/// Last observed flags for one host
#[derive(Debug, Clone, Serialize)]
pub struct ObservedState {
    pub reachable: bool,
    pub services_detected: Option<bool>,
    pub last_balance: Option<f64>,
    pub observed_at: DateTime<Utc>,
}

/// Side table keyed by host name
#[derive(Debug, Clone, Default)]
pub struct ObservedStates {
    hosts: HashMap<String, ObservedState>,
}

impl ObservedStates {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the entry for the snapshot's host
    pub fn record(&mut self, snapshot: &HostSnapshot) {
        let services_detected = if snapshot.services.is_empty() {
            None
        } else {
            Some(snapshot.services.iter().all(|s| s.present))
        };

        self.hosts.insert(
            snapshot.host.clone(),
            ObservedState {
                reachable: snapshot.reachable,
                services_detected,
                last_balance: snapshot.balance,
                observed_at: Utc::now(),
            },
        );
    }

    #[must_use]
    pub fn get(&self, host: &str) -> Option<&ObservedState> {
        self.hosts.get(host)
    }

    /// All entries sorted by host name
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, ObservedState)> {
        let mut entries: Vec<_> = self
            .hosts
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Role;
    use crate::report::ServiceCheck;

    fn snapshot(name: &str) -> HostSnapshot {
        HostSnapshot {
            host: name.to_string(),
            address: "10.0.0.1".to_string(),
            role: Role::Main,
            reachable: true,
            uptime: None,
            services: vec![
                ServiceCheck {
                    name: "mongo".to_string(),
                    present: true,
                },
                ServiceCheck {
                    name: "node".to_string(),
                    present: false,
                },
            ],
            daemon_running: Some(true),
            daemon_status: None,
            masternode_status: None,
            balance: Some(3.5),
            ping: None,
            defects: Vec::new(),
            notes: Vec::new(),
        }
    }

    #[test]
    fn test_record_overwrites() {
        let mut states = ObservedStates::new();
        states.record(&snapshot("main"));
        let state = states.get("main").unwrap();
        assert!(state.reachable);
        assert_eq!(state.services_detected, Some(false));
        assert_eq!(state.last_balance, Some(3.5));

        let mut down = snapshot("main");
        down.reachable = false;
        down.services.clear();
        down.balance = None;
        states.record(&down);
        let state = states.get("main").unwrap();
        assert!(!state.reachable);
        assert_eq!(state.services_detected, None);
        assert_eq!(states.snapshot().len(), 1);
    }
}
