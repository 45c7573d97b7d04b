//! Local command execution using `tokio::process`

use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::error::ExecError;
use crate::result::CommandOutput;

/// Local command runner
///
/// Used for probes that run on the operator's machine, such as pinging a host.
#[derive(Debug, Clone)]
pub struct LocalRunner {
    timeout: Duration,
}

impl LocalRunner {
    /// Create a new local runner
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }

    /// Set the timeout applied to every local command
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run a program with arguments (no shell)
    ///
    /// # Errors
    /// Returns `ExecError::SpawnError` if the program cannot be started and
    /// `ExecError::Timeout` if it outlives the runner's timeout
    #[instrument(skip(self), level = "debug")]
    pub async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, ExecError> {
        let start = Instant::now();
        let command_line = join_command(program, args);

        debug!(command = %command_line, "executing local command");

        let child = Command::new(program)
            .args(args)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecError::SpawnError(e.to_string()))?;

        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| ExecError::IoError(e.to_string()))?,
            Err(_) => {
                return Err(ExecError::Timeout {
                    timeout: self.timeout,
                });
            }
        };

        let mut raw = String::from_utf8_lossy(&output.stdout).to_string();
        raw.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CommandOutput::from_raw(
            command_line,
            &raw,
            output.status.code(),
            start.elapsed(),
        ))
    }

    /// Start a program and leave it running
    ///
    /// Used for interactive windows the operator closes themselves. The child
    /// inherits no stdio and is not waited on.
    ///
    /// # Errors
    /// Returns `ExecError::SpawnError` if the program cannot be started
    #[instrument(skip(self), level = "debug")]
    pub fn launch(&self, program: &str, args: &[&str]) -> Result<String, ExecError> {
        let command_line = join_command(program, args);

        let child = Command::new(program)
            .args(args)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| ExecError::SpawnError(format!("{program}: {e}")))?;

        debug!(command = %command_line, pid = ?child.id(), "launched local command");
        Ok(command_line)
    }

    /// Send one ICMP echo to `address`
    pub async fn ping(&self, address: &str) -> bool {
        match self.run("ping", &["-c", "1", address]).await {
            Ok(output) => output.success(),
            Err(e) => {
                warn!(address = %address, error = %e, "ping could not run");
                false
            }
        }
    }
}

fn join_command(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

impl Default for LocalRunner {
    fn default() -> Self {
        Self::new()
    }
}
