use tracing::instrument;

use super::Engine;
use crate::error::{ConfigError, EngineError};
use crate::registry::Host;
use crate::report::{Procedure, ProcedureReport};

impl Engine {
    /// Open an interactive `gcloud compute ssh` window for each host
    ///
    /// Each console runs inside the configured terminal program and is left
    /// for the operator to close. Nothing is sent to the hosts directly.
    #[instrument(skip(self, hosts), fields(hosts = hosts.len()))]
    pub fn open_consoles(&self, hosts: &[Host]) -> ProcedureReport {
        let mut report = ProcedureReport::new(Procedure::OpenConsoles);
        let (Some(project), Some(zone)) = (&self.config.project, &self.config.zone) else {
            let err = ConfigError::Invalid("consoles need both project and zone".to_string());
            return report.abort("select", &err.into());
        };
        let Some((terminal, wrapper)) = self.config.terminal.split_first() else {
            let err = ConfigError::Invalid("terminal command is empty".to_string());
            return report.abort("select", &err.into());
        };

        for host in hosts {
            let args: Vec<&str> = wrapper
                .iter()
                .map(String::as_str)
                .chain(gcloud_ssh_args(project, zone, &host.name))
                .collect();
            match self.launcher.launch(terminal, &args) {
                Ok(command_line) => {
                    report.stage_ok("launch", Some(host), Some(command_line));
                    report.host_result(host, Ok(()));
                }
                Err(e) => {
                    let err = EngineError::from(ConfigError::Invalid(e.to_string()));
                    report.stage_failed("launch", Some(host), &err);
                    report.host_result(host, Err(&err));
                }
            }
        }

        report.finish()
    }
}

fn gcloud_ssh_args<'a>(project: &'a str, zone: &'a str, name: &'a str) -> [&'a str; 8] {
    [
        "gcloud", "compute", "--project", project, "ssh", "--zone", zone, name,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gcloud_ssh_args() {
        assert_eq!(
            gcloud_ssh_args("fleet-prj", "us-east1-b", "mn1").join(" "),
            "gcloud compute --project fleet-prj ssh --zone us-east1-b mn1"
        );
    }
}
