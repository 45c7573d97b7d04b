//! Scripted in-memory fleet for driving the engine
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use fleetboot_core::{Engine, FleetConfig, HostConfig, Timing};
use fleetboot_exec::{CommandOutput, ConnectionInfo, Connector, ExecError, RemoteShell};
use tokio_util::sync::CancellationToken;

pub const TX_HASH: &str = "9f2c4e7a1b";
pub const MN_KEY: &str = "5KmnPrivKey42";
pub const FUNDING_ADDRESS: &str = "DfundAddr77";

#[derive(Debug, Clone)]
struct Reply {
    text: String,
    status: i32,
}

struct Rule {
    host: Option<String>,
    pattern: String,
    replies: VecDeque<Reply>,
}

impl Rule {
    fn next(&mut self) -> Reply {
        if self.replies.len() > 1 {
            self.replies.pop_front().unwrap()
        } else {
            self.replies.front().cloned().unwrap()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Call {
    pub host: String,
    pub command: String,
}

#[derive(Debug, Clone)]
pub struct FileWrite {
    pub host: String,
    pub path: String,
    pub contents: String,
}

struct CancelHook {
    pattern: String,
    after: usize,
    token: CancellationToken,
}

#[derive(Default)]
struct State {
    rules: Vec<Rule>,
    calls: Vec<Call>,
    writes: Vec<FileWrite>,
    open: HashMap<String, usize>,
    max_open: HashMap<String, usize>,
    connects: Vec<String>,
    closes: usize,
    unreachable: HashSet<String>,
    refuse_writes: HashSet<String>,
    hooks: Vec<CancelHook>,
    outages: Vec<(String, String)>,
}

impl State {
    fn reply_for(&mut self, host: &str, command: &str) -> Reply {
        // host-specific rules first, later rules override earlier ones
        let specific = self
            .rules
            .iter()
            .rposition(|r| r.host.as_deref() == Some(host) && command.contains(&r.pattern));
        let index = specific.or_else(|| {
            self.rules
                .iter()
                .rposition(|r| r.host.is_none() && command.contains(&r.pattern))
        });
        match index {
            Some(i) => self.rules[i].next(),
            None => Reply {
                text: String::new(),
                status: 0,
            },
        }
    }
}

/// A fleet of scripted hosts
#[derive(Clone, Default)]
pub struct MockFleet {
    state: Arc<Mutex<State>>,
}

impl MockFleet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every host answers like a working node
    pub fn healthy() -> Self {
        let fleet = Self::new();
        fleet
            .reply("uptime", " 10:01:02 up 12 days,  3:04,  1 user,  load average: 0.00")
            .reply("ps -e|grep", "  812 ?        00:03:10 some-long-service-name")
            .reply("status", "{\"version\": 1000000, \"blocks\": 1200}")
            .reply("masternode status", "{\"status\": \"Masternode successfully started\"}")
            .reply("getbalance", "1000000.00000000")
            .reply(" stop", "DAPS server stopping")
            .reply("-daemon", "DAPS server starting")
            .reply("setgenerate", "")
            .reply("masternode genkey", MN_KEY)
            .reply("getaccountaddress", FUNDING_ADDRESS)
            .reply("sendtoaddress", TX_HASH)
            .reply("masternode outputs", &format!("{{\n  \"{TX_HASH}\": \"1\"\n}}"))
            .reply("startmasternode", "Masternode successfully started");
        fleet
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn push_rule(&self, host: Option<&str>, pattern: &str, replies: Vec<Reply>) -> &Self {
        self.lock().rules.push(Rule {
            host: host.map(str::to_string),
            pattern: pattern.to_string(),
            replies: replies.into(),
        });
        self
    }

    /// Every host answers `text` to commands containing `pattern`
    pub fn reply(&self, pattern: &str, text: &str) -> &Self {
        self.push_rule(
            None,
            pattern,
            vec![Reply {
                text: text.to_string(),
                status: 0,
            }],
        )
    }

    /// `host` answers `text` to commands containing `pattern`
    pub fn reply_on(&self, host: &str, pattern: &str, text: &str) -> &Self {
        self.reply_status_on(host, pattern, text, 0)
    }

    pub fn reply_status_on(&self, host: &str, pattern: &str, text: &str, status: i32) -> &Self {
        self.push_rule(
            Some(host),
            pattern,
            vec![Reply {
                text: text.to_string(),
                status,
            }],
        )
    }

    /// Successive answers; the last one repeats
    pub fn reply_sequence(&self, pattern: &str, texts: &[&str]) -> &Self {
        let replies = texts
            .iter()
            .map(|t| Reply {
                text: (*t).to_string(),
                status: 0,
            })
            .collect();
        self.push_rule(None, pattern, replies)
    }

    pub fn unreachable(&self, host: &str) -> &Self {
        self.lock().unreachable.insert(host.to_string());
        self
    }

    pub fn refuse_writes(&self, host: &str) -> &Self {
        self.lock().refuse_writes.insert(host.to_string());
        self
    }

    /// Cancel `token` once `n` commands containing `pattern` have been sent
    pub fn cancel_after(&self, pattern: &str, n: usize, token: CancellationToken) -> &Self {
        self.lock().hooks.push(CancelHook {
            pattern: pattern.to_string(),
            after: n,
            token,
        });
        self
    }

    /// `host` stops accepting connections once a command containing `pattern` is sent
    pub fn unreachable_after(&self, pattern: &str, host: &str) -> &Self {
        self.lock()
            .outages
            .push((pattern.to_string(), host.to_string()));
        self
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(MockConnector {
            state: Arc::clone(&self.state),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn commands_on(&self, host: &str) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.host == host)
            .map(|c| c.command.clone())
            .collect()
    }

    /// Commands sent anywhere that contain `pattern`
    pub fn count(&self, pattern: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.command.contains(pattern))
            .count()
    }

    pub fn writes(&self) -> Vec<FileWrite> {
        self.lock().writes.clone()
    }

    /// Last contents written to a path ending in `suffix` on `host`
    pub fn file(&self, host: &str, suffix: &str) -> Option<String> {
        self.lock()
            .writes
            .iter()
            .rev()
            .find(|w| w.host == host && w.path.ends_with(suffix))
            .map(|w| w.contents.clone())
    }

    pub fn connects_to(&self, host: &str) -> usize {
        self.lock().connects.iter().filter(|h| *h == host).count()
    }

    pub fn total_connects(&self) -> usize {
        self.lock().connects.len()
    }

    pub fn open_sessions(&self) -> usize {
        self.lock().open.values().sum()
    }

    pub fn max_open_per_host(&self) -> usize {
        self.lock().max_open.values().copied().max().unwrap_or(0)
    }

    /// No session leaked and none overlapped on a host
    pub fn assert_sessions_clean(&self) {
        assert_eq!(self.open_sessions(), 0, "sessions left open");
        assert!(self.max_open_per_host() <= 1, "overlapping sessions to one host");
        let state = self.lock();
        let successful = state.connects.len();
        assert_eq!(state.closes, successful, "every opened session is closed");
    }
}

struct MockConnector {
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, info: &ConnectionInfo) -> Result<Box<dyn RemoteShell>, ExecError> {
        let mut state = self.state.lock().unwrap();
        if state.unreachable.contains(&info.name) {
            return Err(ExecError::ConnectionFailed(format!(
                "{}: no route to host",
                info.host
            )));
        }
        state.connects.push(info.name.clone());
        let open = state.open.entry(info.name.clone()).or_insert(0);
        *open += 1;
        let now = *open;
        let max = state.max_open.entry(info.name.clone()).or_insert(0);
        *max = (*max).max(now);

        Ok(Box::new(MockShell {
            host: info.name.clone(),
            state: Arc::clone(&self.state),
        }))
    }

    fn connector_type(&self) -> &'static str {
        "mock"
    }
}

struct MockShell {
    host: String,
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl RemoteShell for MockShell {
    async fn run(&mut self, cmd: &str) -> Result<CommandOutput, ExecError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call {
            host: self.host.clone(),
            command: cmd.to_string(),
        });

        let sent = |pattern: &str, calls: &[Call]| {
            calls.iter().filter(|c| c.command.contains(pattern)).count()
        };
        for hook in &state.hooks {
            if cmd.contains(&hook.pattern) && sent(&hook.pattern, state.calls.as_slice()) == hook.after {
                hook.token.cancel();
            }
        }

        let down: Vec<String> = state
            .outages
            .iter()
            .filter(|(pattern, _)| cmd.contains(pattern.as_str()))
            .map(|(_, host)| host.clone())
            .collect();
        state.unreachable.extend(down);

        let reply = state.reply_for(&self.host, cmd);
        Ok(CommandOutput::from_raw(
            cmd,
            &reply.text,
            Some(reply.status),
            Duration::ZERO,
        ))
    }

    async fn write_file(&mut self, remote_path: &str, contents: &[u8]) -> Result<(), ExecError> {
        let mut state = self.state.lock().unwrap();
        if state.refuse_writes.contains(&self.host) {
            return Err(ExecError::TransferFailed {
                path: remote_path.to_string(),
                reason: "Permission denied".to_string(),
            });
        }
        state.writes.push(FileWrite {
            host: self.host.clone(),
            path: remote_path.to_string(),
            contents: String::from_utf8_lossy(contents).into_owned(),
        });
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), ExecError> {
        let mut state = self.state.lock().unwrap();
        if let Some(open) = state.open.get_mut(&self.host) {
            *open -= 1;
        }
        state.closes += 1;
        Ok(())
    }
}

/// main, two masternodes, one staking node, one watcher wallet
pub fn fleet_config() -> FleetConfig {
    let mut config = FleetConfig::new(HostConfig::new("main", "10.0.0.1"));
    config.password = Some("hunter2".to_string());
    config.masternodes = vec![
        HostConfig::new("mn1", "10.0.0.2"),
        HostConfig::new("mn2", "10.0.0.3"),
    ];
    config.staking_nodes = vec![HostConfig::new("stake1", "10.0.0.4")];
    config.wallets = vec![HostConfig::new("watch", "10.0.0.5")];
    config.timing = Timing::immediate();
    config
}

pub fn engine(config: FleetConfig, fleet: &MockFleet) -> Engine {
    Engine::new(config, fleet.connector()).unwrap()
}
