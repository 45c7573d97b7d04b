//! Result types for command execution

use std::time::Duration;

use serde::Serialize;

use crate::keys::AuthMethod;

/// Output of one remote command line
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommandOutput {
    /// The command line that produced this output
    pub command: String,
    /// Output lines, carriage returns removed and the echoed command line stripped
    pub lines: Vec<String>,
    /// Exit status, when the transport reports one
    pub status: Option<i32>,
    /// Time taken for the round trip
    pub duration: Duration,
}

impl CommandOutput {
    /// Build an output from raw terminal text
    ///
    /// Interactive shells echo the command back as the first line; that echo is
    /// dropped so interpreters only ever see what the remote program printed.
    #[must_use]
    pub fn from_raw(
        command: impl Into<String>,
        raw: &str,
        status: Option<i32>,
        duration: Duration,
    ) -> Self {
        let command = command.into();
        let normalized = raw.replace('\r', "");
        let mut lines: Vec<String> = normalized.lines().map(str::to_string).collect();

        if lines.first().is_some_and(|l| l.trim() == command.trim()) {
            lines.remove(0);
        }
        while lines.last().is_some_and(|l| l.trim().is_empty()) {
            lines.pop();
        }

        Self {
            command,
            lines,
            status,
            duration,
        }
    }

    /// Convenience constructor for canned output
    #[must_use]
    pub fn from_text(command: impl Into<String>, text: &str) -> Self {
        Self::from_raw(command, text, None, Duration::ZERO)
    }

    /// First non-blank output line, trimmed
    #[must_use]
    pub fn first_line(&self) -> Option<&str> {
        self.lines
            .iter()
            .map(|l| l.trim())
            .find(|l| !l.is_empty())
    }

    /// All lines joined with newlines
    #[must_use]
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Whether the transport reported a zero exit status
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Whether the output is empty apart from whitespace
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.lines.iter().all(|l| l.trim().is_empty())
    }
}

/// Connection information for one host
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Host name used in logs
    pub name: String,
    /// Network address
    pub host: String,
    /// Port (default 22)
    pub port: u16,
    /// Username
    pub user: String,
    /// How to authenticate
    pub auth: AuthMethod,
}

impl ConnectionInfo {
    /// Create new connection info with password authentication
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        user: impl Into<String>,
        auth: AuthMethod,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port: 22,
            user: user.into(),
            auth,
        }
    }

    /// Set custom port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}
