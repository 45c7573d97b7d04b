mod common;

use std::path::PathBuf;

use fleetboot_core::{ErrorKind, Host};

use common::{FUNDING_ADDRESS, MockFleet, engine, fleet_config};

fn pick(engine: &fleetboot_core::Engine, names: &[&str]) -> Vec<Host> {
    engine.registry().select(names, Vec::new()).unwrap()
}

fn temp_binary(tag: &str, contents: &[u8]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("fleetboot-test-{}-{tag}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("dapscoind");
    std::fs::write(&path, contents).unwrap();
    path
}

// ============================================================================
// Status sweep
// ============================================================================

#[tokio::test]
async fn test_status_sweep_isolates_unreachable_host() {
    let fleet = MockFleet::healthy();
    fleet.unreachable("mn2");
    let engine = engine(fleet_config(), &fleet);

    let hosts = engine.registry().all();
    let report = engine.status_sweep(&hosts).await;

    assert!(report.aborted_at().is_none());
    assert!(!report.succeeded());
    assert_eq!(report.snapshots.len(), 5);

    let mn2 = report.host("mn2").unwrap();
    assert!(!mn2.ok);
    assert!(mn2.host_down);
    assert!(report.host("stake1").unwrap().ok);
    assert!(report.host("watch").unwrap().ok);
    assert!(
        fleet
            .commands_on("watch")
            .iter()
            .any(|c| c.contains("getbalance"))
    );

    let main = report.snapshots.iter().find(|s| s.host == "main").unwrap();
    assert!(main.reachable);
    assert_eq!(main.services.len(), 2);
    assert!(main.services.iter().all(|s| s.present));
    assert_eq!(main.daemon_running, Some(true));
    assert!(main.defects.is_empty());

    let watch = report.snapshots.iter().find(|s| s.host == "watch").unwrap();
    assert_eq!(watch.balance, Some(1_000_000.0));

    fleet.assert_sessions_clean();
}

#[tokio::test]
async fn test_status_sweep_reports_missing_service() {
    let fleet = MockFleet::healthy();
    fleet.reply_on("main", "grep mongo", "");
    let engine = engine(fleet_config(), &fleet);

    let hosts = pick(&engine, &["main"]);
    let report = engine.status_sweep(&hosts).await;

    let main = &report.snapshots[0];
    let mongo = main.services.iter().find(|s| s.name == "mongo").unwrap();
    assert!(!mongo.present);
    assert!(main.defects.iter().any(|d| d.contains("mongo")));
    // a reachable host with defects still answered every check
    assert!(report.host("main").unwrap().ok);
}

#[tokio::test]
async fn test_status_sweep_staking_node_that_is_not_a_masternode() {
    let fleet = MockFleet::healthy();
    let refusal = "error code: -1\nerror message:\nThis is not a masternode";
    fleet.reply_on("stake1", "masternode status", refusal);
    fleet.reply_on("mn1", "masternode status", refusal);
    let engine = engine(fleet_config(), &fleet);

    let hosts = pick(&engine, &["stake1", "mn1"]);
    let report = engine.status_sweep(&hosts).await;

    let stake1 = report.snapshots.iter().find(|s| s.host == "stake1").unwrap();
    assert_eq!(stake1.daemon_running, Some(true));
    assert!(stake1.defects.is_empty(), "{:?}", stake1.defects);
    assert_eq!(stake1.notes, vec!["not an active masternode".to_string()]);
    assert_eq!(stake1.balance, Some(1_000_000.0));
    assert!(stake1.masternode_status.as_deref().unwrap().contains("not a masternode"));

    let mn1 = report.snapshots.iter().find(|s| s.host == "mn1").unwrap();
    assert_eq!(mn1.daemon_running, Some(true));
    assert_eq!(mn1.defects, vec!["not an active masternode".to_string()]);
}

#[tokio::test]
async fn test_status_sweep_flags_stopped_daemon() {
    let fleet = MockFleet::healthy();
    fleet.reply_on("watch", "masternode status", "error: couldn't connect to server");
    let engine = engine(fleet_config(), &fleet);

    let hosts = pick(&engine, &["watch"]);
    let report = engine.status_sweep(&hosts).await;

    let watch = &report.snapshots[0];
    assert_eq!(watch.daemon_running, Some(false));
    assert_eq!(watch.defects, vec!["daemon not running".to_string()]);
}

// ============================================================================
// Wallet start/stop
// ============================================================================

#[tokio::test]
async fn test_stop_tolerates_stopped_daemon_and_isolates_failures() {
    let fleet = MockFleet::healthy();
    fleet
        .reply_on("mn1", " stop", "error: couldn't connect to server")
        .unreachable("stake1");
    let engine = engine(fleet_config(), &fleet);

    let hosts = engine.registry().all();
    let report = engine.stop_wallets(&hosts).await;

    assert!(!report.succeeded());
    assert!(report.host("mn1").unwrap().ok);
    assert!(report.host("stake1").unwrap().host_down);
    assert!(report.host("watch").unwrap().ok);
    assert_eq!(fleet.count(" stop"), 4);
    fleet.assert_sessions_clean();
}

#[tokio::test]
async fn test_start_with_failed_wipe_skips_that_host_only() {
    let fleet = MockFleet::healthy();
    fleet.reply_status_on(
        "mn1",
        "rm -rf",
        "rm: cannot remove '/root/.dapscoin/blocks': Permission denied",
        1,
    );
    let engine = engine(fleet_config(), &fleet);

    let hosts = engine.registry().all();
    let report = engine.start_wallets(&hosts, true).await;

    assert!(!report.succeeded());
    let mn1 = report.host("mn1").unwrap();
    assert!(!mn1.ok);
    assert!(!mn1.host_down);
    assert!(!fleet.commands_on("mn1").iter().any(|c| c.contains("-daemon")));

    for host in ["main", "mn2", "stake1", "watch"] {
        assert!(report.host(host).unwrap().ok, "{host} should have started");
        assert!(fleet.commands_on(host).iter().any(|c| c.contains("-daemon")));
    }
    assert!(
        fleet
            .commands_on("main")
            .iter()
            .any(|c| c.contains("setgenerate true 1"))
    );
    assert!(
        !fleet
            .commands_on("stake1")
            .iter()
            .any(|c| c.contains("setgenerate"))
    );

    // masternode configs hold a key and are never regenerated here
    assert!(fleet.file("mn2", "dapscoin.conf").is_none());
    assert!(fleet.file("stake1", "dapscoin.conf").is_some());
    fleet.assert_sessions_clean();
}

#[tokio::test]
async fn test_restart_stops_everything_before_starting() {
    let fleet = MockFleet::healthy();
    let engine = engine(fleet_config(), &fleet);

    let report = engine.restart_wallets(false).await;
    assert!(report.succeeded(), "{report:?}");

    let calls = fleet.calls();
    let last_stop = calls.iter().rposition(|c| c.command.contains(" stop")).unwrap();
    let first_start = calls.iter().position(|c| c.command.contains("-daemon")).unwrap();
    assert!(last_stop < first_start);
    assert_eq!(calls[first_start].host, "main");
    assert_eq!(fleet.count("rm -rf"), 0);
    fleet.assert_sessions_clean();
}

#[tokio::test]
async fn test_staking_config_lists_each_peer_once() {
    let mut config = fleet_config();
    // mn1 also stakes; it must not show up twice
    config
        .staking_nodes
        .push(fleetboot_core::HostConfig::new("mn1", "10.0.0.2"));
    let fleet = MockFleet::healthy();
    let engine = engine(config, &fleet);

    let hosts = pick(&engine, &["main"]);
    let report = engine.write_staking_configs(&hosts).await;
    assert!(report.succeeded());

    let conf = fleet.file("main", "/dapscoin.conf").unwrap();
    let addnodes: Vec<&str> = conf.lines().filter(|l| l.starts_with("addnode=")).collect();
    assert_eq!(
        addnodes,
        vec![
            "addnode=10.0.0.2",
            "addnode=10.0.0.3",
            "addnode=10.0.0.4",
            "addnode=10.0.0.5",
        ]
    );
    assert!(conf.starts_with("daemon=1\n"));
    assert_eq!(fleet.count("-daemon"), 0);
}

#[tokio::test]
async fn test_reboot_restarts_reachable_hosts() {
    let fleet = MockFleet::healthy();
    fleet.unreachable("stake1");
    let engine = engine(fleet_config(), &fleet);

    let hosts = pick(&engine, &["mn1", "stake1"]);
    let report = engine.reboot(&hosts).await;

    assert!(!report.succeeded());
    assert!(report.host("mn1").unwrap().ok);
    assert!(report.host("stake1").unwrap().host_down);
    assert_eq!(
        fleet.commands_on("mn1"),
        vec![
            "sudo reboot".to_string(),
            "dapscoind -daemon".to_string()
        ]
    );
    fleet.assert_sessions_clean();
}

// ============================================================================
// Promotion
// ============================================================================

#[tokio::test]
async fn test_promote_aborts_when_genkey_fails() {
    let fleet = MockFleet::healthy();
    fleet.reply_on(
        "stake1",
        "masternode genkey",
        "error: Masternode support is not enabled",
    );
    let engine = engine(fleet_config(), &fleet);

    let report = engine.promote_masternodes(None).await;

    assert_eq!(
        report.aborted_at(),
        Some(("genkey", ErrorKind::CommandRejected))
    );
    assert!(fleet.commands_on("mn1").is_empty());
    assert!(fleet.commands_on("mn2").is_empty());
    assert!(fleet.writes().iter().all(|w| w.host == "stake1"));
    fleet.assert_sessions_clean();
}

#[tokio::test]
async fn test_promote_isolates_unreachable_masternode() {
    let fleet = MockFleet::healthy();
    fleet.unreachable("mn2");
    let engine = engine(fleet_config(), &fleet);

    let report = engine.promote_masternodes(None).await;

    assert!(report.aborted_at().is_none());
    assert!(!report.succeeded());
    assert!(report.host("mn1").unwrap().ok);
    assert!(report.host("mn2").unwrap().host_down);

    let staking = fleet.file("stake1", "dapscoin.conf").unwrap();
    assert_eq!(staking.matches("addnode=10.0.0.2\n").count(), 1);
    assert_eq!(staking.matches("addnode=10.0.0.3\n").count(), 1);
    assert!(!staking.contains("masternode=1"));

    let mn1 = fleet.file("mn1", "dapscoin.conf").unwrap();
    assert!(mn1.contains("addnode=10.0.0.4\n"));
    assert!(mn1.contains("externalip=10.0.0.2\n"));
    assert!(mn1.contains(&format!("masternodeprivkey={}\n", common::MN_KEY)));
    assert!(mn1.ends_with("masternode=1\n"));
    fleet.assert_sessions_clean();
}

// ============================================================================
// Binary rollout
// ============================================================================

#[tokio::test]
async fn test_install_isolates_refused_write() {
    let mut config = fleet_config();
    config.binaries = vec![temp_binary("refused", b"\x7fELF-daemon")];
    let fleet = MockFleet::healthy();
    fleet.refuse_writes("mn1");
    let engine = engine(config, &fleet);

    let hosts = pick(&engine, &["main", "mn1", "mn2"]);
    let report = engine.install_binaries(&hosts).await;

    assert!(!report.succeeded());
    let mn1 = report.host("mn1").unwrap();
    assert!(!mn1.ok);
    assert!(!mn1.host_down);
    assert!(report.host("main").unwrap().ok);
    assert!(report.host("mn2").unwrap().ok);

    assert!(!fleet.commands_on("mn1").iter().any(|c| c.contains("mv ")));
    assert_eq!(
        fleet.commands_on("mn2"),
        vec![
            "rm -f /usr/local/bin/dapscoind && mv /usr/local/bin/dapscoind.new /usr/local/bin/dapscoind && chmod 755 /usr/local/bin/dapscoind"
                .to_string()
        ]
    );
    let staged = fleet.file("mn2", "/usr/local/bin/dapscoind.new").unwrap();
    assert_eq!(staged.as_bytes(), b"\x7fELF-daemon");
    fleet.assert_sessions_clean();
}

#[tokio::test]
async fn test_install_reports_refused_rename() {
    let mut config = fleet_config();
    config.binaries = vec![temp_binary("rename", b"bin")];
    let fleet = MockFleet::healthy();
    fleet.reply_status_on("mn2", "mv ", "mv: cannot move: Text file busy", 1);
    let engine = engine(config, &fleet);

    let hosts = pick(&engine, &["mn1", "mn2"]);
    let report = engine.install_binaries(&hosts).await;

    assert!(report.host("mn1").unwrap().ok);
    let mn2 = report.host("mn2").unwrap();
    assert!(!mn2.ok);
    assert!(mn2.error.as_deref().unwrap().contains("file transfer"));
}

#[tokio::test]
async fn test_install_aborts_on_missing_local_binary() {
    let mut config = fleet_config();
    config.binaries = vec![PathBuf::from("/nonexistent/fleetboot/dapscoind")];
    let fleet = MockFleet::healthy();
    let engine = engine(config, &fleet);

    let hosts = engine.registry().all();
    let report = engine.install_binaries(&hosts).await;

    assert_eq!(report.aborted_at(), Some(("read-binaries", ErrorKind::Config)));
    assert_eq!(fleet.total_connects(), 0);
}

// ============================================================================
// Funds
// ============================================================================

#[tokio::test]
async fn test_transfer_uses_one_session_to_main() {
    let fleet = MockFleet::healthy();
    let engine = engine(fleet_config(), &fleet);

    let hosts = pick(&engine, &["mn1"]);
    let report = engine
        .transfer_funds(&hosts, &["DrawAddress9".to_string()], Some(250.0))
        .await;

    assert!(report.succeeded(), "{report:?}");
    assert_eq!(report.transfers.len(), 2);
    assert_eq!(fleet.connects_to("main"), 1);
    let sends: Vec<String> = fleet
        .commands_on("main")
        .into_iter()
        .filter(|c| c.contains("sendtoaddress"))
        .collect();
    assert_eq!(
        sends,
        vec![
            format!("dapscoin-cli sendtoaddress {FUNDING_ADDRESS} 250"),
            "dapscoin-cli sendtoaddress DrawAddress9 250".to_string(),
        ]
    );
    assert!(
        fleet
            .commands_on("mn1")
            .contains(&"dapscoin-cli getaccountaddress \"\"".to_string())
    );
    fleet.assert_sessions_clean();
}

#[tokio::test]
async fn test_transfer_without_destination_is_rejected() {
    let fleet = MockFleet::healthy();
    let engine = engine(fleet_config(), &fleet);

    let report = engine.transfer_funds(&[], &[], None).await;

    assert_eq!(report.aborted_at(), Some(("select", ErrorKind::HostNotFound)));
    assert_eq!(fleet.total_connects(), 0);
}

#[tokio::test]
async fn test_transfer_rejects_bad_amounts_before_connecting() {
    for amount in [f64::NAN, f64::INFINITY, -5.0, 0.0] {
        let fleet = MockFleet::healthy();
        let engine = engine(fleet_config(), &fleet);

        let hosts = pick(&engine, &["stake1"]);
        let report = engine.transfer_funds(&hosts, &[], Some(amount)).await;

        assert_eq!(
            report.aborted_at(),
            Some(("select", ErrorKind::Config)),
            "amount {amount}"
        );
        assert_eq!(fleet.total_connects(), 0);
        assert_eq!(fleet.count("sendtoaddress"), 0);
    }
}

#[tokio::test]
async fn test_await_balance_rejects_negative_amount() {
    let fleet = MockFleet::healthy();
    let engine = engine(fleet_config(), &fleet);

    let hosts = pick(&engine, &["mn1"]);
    let report = engine.await_balance(&hosts, Some(-1.0)).await;

    assert_eq!(report.aborted_at(), Some(("select", ErrorKind::Config)));
    assert_eq!(fleet.total_connects(), 0);
}

#[tokio::test]
async fn test_await_balance_polls_until_funded() {
    let fleet = MockFleet::healthy();
    fleet.reply_sequence("getbalance", &["12.5", "999999.0", "1000000.0"]);
    let engine = engine(fleet_config(), &fleet);

    let hosts = pick(&engine, &["mn1"]);
    let report = engine.await_balance(&hosts, None).await;

    assert!(report.succeeded());
    assert_eq!(fleet.count("getbalance"), 3);
}

#[tokio::test]
async fn test_await_balance_gives_up_at_bound() {
    let mut config = fleet_config();
    config.timing.poll.max_attempts = Some(2);
    let fleet = MockFleet::healthy();
    fleet.reply("getbalance", "1.0");
    let engine = engine(config, &fleet);

    let hosts = pick(&engine, &["mn1"]);
    let report = engine.await_balance(&hosts, None).await;

    assert_eq!(
        report.aborted_at(),
        Some(("await-balance", ErrorKind::Unconfirmed))
    );
    assert_eq!(fleet.count("getbalance"), 2);
}

// ============================================================================
// Operator consoles
// ============================================================================

#[tokio::test]
async fn test_consoles_launch_gcloud_ssh_per_host() {
    let mut config = fleet_config();
    config.project = Some("fleet-prj".to_string());
    config.zone = Some("us-east1-b".to_string());
    config.terminal = vec!["true".to_string()];
    let fleet = MockFleet::healthy();
    let engine = engine(config, &fleet);

    let hosts = pick(&engine, &["main", "mn1"]);
    let report = engine.open_consoles(&hosts);

    assert!(report.succeeded(), "{report:?}");
    let launched: Vec<&str> = report
        .stages
        .iter()
        .filter_map(|s| s.detail.as_deref())
        .collect();
    assert_eq!(
        launched,
        vec![
            "true gcloud compute --project fleet-prj ssh --zone us-east1-b main",
            "true gcloud compute --project fleet-prj ssh --zone us-east1-b mn1",
        ]
    );
    assert_eq!(fleet.total_connects(), 0);
}

#[tokio::test]
async fn test_consoles_need_project_and_zone() {
    let mut config = fleet_config();
    config.project = Some("fleet-prj".to_string());
    let fleet = MockFleet::healthy();
    let engine = engine(config, &fleet);

    let hosts = engine.registry().all();
    let report = engine.open_consoles(&hosts);

    assert_eq!(report.aborted_at(), Some(("select", ErrorKind::Config)));
}

#[tokio::test]
async fn test_consoles_report_missing_terminal_per_host() {
    let mut config = fleet_config();
    config.project = Some("fleet-prj".to_string());
    config.zone = Some("us-east1-b".to_string());
    config.terminal = vec!["fleetboot-no-such-terminal".to_string(), "-e".to_string()];
    let fleet = MockFleet::healthy();
    let engine = engine(config, &fleet);

    let hosts = pick(&engine, &["main", "watch"]);
    let report = engine.open_consoles(&hosts);

    assert!(report.aborted_at().is_none());
    assert!(!report.succeeded());
    assert_eq!(report.hosts.len(), 2);
    assert!(report.hosts.iter().all(|h| !h.ok && !h.host_down));
}
