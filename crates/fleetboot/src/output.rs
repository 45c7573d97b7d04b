//! Report printing

use fleetboot_core::{HostSnapshot, Outcome, ProcedureReport};

/// Print `report` to stdout, as JSON or as a human summary
///
/// # Errors
/// Returns error if JSON serialization fails
pub fn print(report: &ProcedureReport, json: bool) -> eyre::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", summary(report));
    }
    Ok(())
}

/// Human-readable summary
pub fn summary(report: &ProcedureReport) -> String {
    let mut out = String::new();

    let outcome = match &report.outcome {
        Outcome::Running => "running".to_string(),
        Outcome::Completed if report.succeeded() => "completed".to_string(),
        Outcome::Completed => "completed with failures".to_string(),
        Outcome::Aborted { stage, error, .. } => format!("aborted at {stage}: {error}"),
    };
    #[allow(clippy::cast_precision_loss)]
    let elapsed = report
        .finished_at
        .map(|end| (end - report.started_at).num_milliseconds() as f64 / 1000.0)
        .unwrap_or_default();
    out.push_str(&format!(
        "{}: {outcome} ({elapsed:.1}s)\n",
        report.procedure.as_str()
    ));

    if !report.hosts.is_empty() {
        let ok = report.hosts.iter().filter(|h| h.ok).count();
        out.push_str(&format!("hosts: {ok}/{} ok\n", report.hosts.len()));
        for host in &report.hosts {
            let state = if host.ok {
                "ok"
            } else if host.host_down {
                "DOWN"
            } else {
                "FAILED"
            };
            out.push_str(&format!("  {:<12} {:<16} {state}", host.host, host.address));
            if let Some(err) = &host.error {
                out.push_str(&format!("  {err}"));
            }
            out.push('\n');
        }
    }

    for snapshot in &report.snapshots {
        out.push_str(&snapshot_line(snapshot));
        out.push('\n');
    }

    for transfer in &report.transfers {
        out.push_str(&format!(
            "  sent {} to {} ({}): {}\n",
            transfer.amount, transfer.destination, transfer.address, transfer.tx_hash
        ));
    }

    out
}

fn snapshot_line(snapshot: &HostSnapshot) -> String {
    if !snapshot.reachable {
        return format!("  {:<12} unreachable", snapshot.host);
    }

    let mut parts = Vec::new();
    if let Some(uptime) = &snapshot.uptime {
        parts.push(uptime.trim().to_string());
    }
    for service in &snapshot.services {
        let mark = if service.present { "up" } else { "missing" };
        parts.push(format!("{} {mark}", service.name));
    }
    match snapshot.daemon_running {
        Some(true) => parts.push("daemon running".to_string()),
        Some(false) => parts.push("daemon stopped".to_string()),
        None => {}
    }
    if let Some(balance) = snapshot.balance {
        parts.push(format!("balance {balance}"));
    }
    if let Some(ping) = snapshot.ping {
        parts.push(if ping { "ping ok" } else { "no ping" }.to_string());
    }
    parts.extend(snapshot.notes.iter().cloned());
    format!("  {:<12} {}", snapshot.host, parts.join(", "))
}
