//! SSH sessions using russh crate

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use russh::keys::ssh_key;
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key};
use russh::{ChannelMsg, Disconnect, client};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument};

use crate::error::ExecError;
use crate::keys::ResolvedAuth;
use crate::result::{CommandOutput, ConnectionInfo};
use crate::traits::{Connector, RemoteShell};

/// Default per-command timeout
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// SSH client handler for russh
#[derive(Debug)]
struct SshClientHandler;

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Accept all server keys (like StrictHostKeyChecking=no)
        Ok(true)
    }
}

/// Opens SSH sessions
#[derive(Debug, Clone)]
pub struct SshConnector {
    command_timeout: Duration,
}

impl Default for SshConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl SshConnector {
    /// Create a connector with the default command timeout
    #[must_use]
    pub fn new() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Set the per-command timeout applied to every session this connector opens
    #[must_use]
    pub fn with_command_timeout(mut self, command_timeout: Duration) -> Self {
        self.command_timeout = command_timeout;
        self
    }

    async fn authenticate(
        session: &mut client::Handle<SshClientHandler>,
        info: &ConnectionInfo,
        auth: &ResolvedAuth,
    ) -> Result<(), ExecError> {
        let success = if let Some(password) = auth.password() {
            session
                .authenticate_password(&info.user, password)
                .await
                .map_err(|e| ExecError::AuthenticationFailed(e.to_string()))?
                .success()
        } else if let Some(key_path) = auth.key_path() {
            let key_pair = load_secret_key(key_path, None)
                .map_err(|e| ExecError::SshKeyError(e.to_string()))?;

            let hash_alg = session
                .best_supported_rsa_hash()
                .await
                .ok()
                .flatten()
                .flatten();
            session
                .authenticate_publickey(
                    &info.user,
                    PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg),
                )
                .await
                .map_err(|e| ExecError::AuthenticationFailed(e.to_string()))?
                .success()
        } else {
            return Err(ExecError::AuthenticationFailed(
                "no authentication method available".to_string(),
            ));
        };

        if success {
            Ok(())
        } else {
            Err(ExecError::AuthenticationFailed(format!(
                "credentials rejected for {}@{}",
                info.user, info.host
            )))
        }
    }
}

#[async_trait]
impl Connector for SshConnector {
    #[instrument(skip(self, info), fields(host = %info.name))]
    async fn connect(&self, info: &ConnectionInfo) -> Result<Box<dyn RemoteShell>, ExecError> {
        info!(
            address = %info.host,
            port = info.port,
            user = %info.user,
            "connecting to SSH"
        );

        let auth = info
            .auth
            .resolve()
            .map_err(|e| ExecError::SshKeyError(e.to_string()))?;

        let config = Arc::new(client::Config::default());

        let mut session = client::connect(config, (&info.host[..], info.port), SshClientHandler)
            .await
            .map_err(|e| ExecError::ConnectionFailed(e.to_string()))?;

        Self::authenticate(&mut session, info, &auth).await?;

        info!(host = %info.name, "SSH connected and authenticated");

        Ok(Box::new(SshShell {
            name: info.name.clone(),
            session,
            command_timeout: self.command_timeout,
        }))
    }

    fn connector_type(&self) -> &'static str {
        "ssh"
    }
}

/// An authenticated SSH session
pub struct SshShell {
    name: String,
    session: client::Handle<SshClientHandler>,
    command_timeout: Duration,
}

impl std::fmt::Debug for SshShell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshShell")
            .field("name", &self.name)
            .field("command_timeout", &self.command_timeout)
            .finish_non_exhaustive()
    }
}

impl SshShell {
    /// Execute one command, optionally feeding `stdin`, and collect its output
    async fn execute(&mut self, cmd: &str, stdin: Option<&[u8]>) -> Result<CommandOutput, ExecError> {
        let start = Instant::now();

        let mut channel = self
            .session
            .channel_open_session()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        channel
            .exec(true, cmd)
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        if let Some(data) = stdin {
            channel
                .data(data)
                .await
                .map_err(|e| ExecError::IoError(e.to_string()))?;
            channel
                .eof()
                .await
                .map_err(|e| ExecError::IoError(e.to_string()))?;
        }

        let mut status = None;
        let mut output = Vec::new();

        loop {
            match channel.wait().await {
                // stdout and stderr are merged, as an interactive prompt would show them
                Some(ChannelMsg::Data { data } | ChannelMsg::ExtendedData { data, .. }) => {
                    output.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    status = Some(exit_status.cast_signed());
                }
                Some(ChannelMsg::Eof) if status.is_some() => break,
                Some(ChannelMsg::Close) | None => break,
                _ => {}
            }
        }

        let duration = start.elapsed();
        let raw = String::from_utf8_lossy(&output);

        debug!(
            command = %cmd,
            status = ?status,
            duration = ?duration,
            "remote command completed"
        );

        Ok(CommandOutput::from_raw(cmd, &raw, status, duration))
    }

    async fn execute_with_timeout(
        &mut self,
        cmd: &str,
        stdin: Option<&[u8]>,
    ) -> Result<CommandOutput, ExecError> {
        let limit = self.command_timeout;
        match timeout(limit, self.execute(cmd, stdin)).await {
            Ok(result) => result,
            Err(_) => {
                error!(host = %self.name, command = %cmd, timeout = ?limit, "command timed out");
                Err(ExecError::Timeout { timeout: limit })
            }
        }
    }
}

#[async_trait]
impl RemoteShell for SshShell {
    #[instrument(skip(self), fields(host = %self.name))]
    async fn run(&mut self, cmd: &str) -> Result<CommandOutput, ExecError> {
        self.execute_with_timeout(cmd, None).await
    }

    #[instrument(skip(self, contents), fields(host = %self.name, bytes = contents.len()))]
    async fn write_file(&mut self, remote_path: &str, contents: &[u8]) -> Result<(), ExecError> {
        let cmd = format!("cat > {}", shell_quote(remote_path));
        let output = self.execute_with_timeout(&cmd, Some(contents)).await?;

        if output.success() {
            Ok(())
        } else {
            Err(ExecError::TransferFailed {
                path: remote_path.to_string(),
                reason: if output.is_blank() {
                    format!("exit status {:?}", output.status)
                } else {
                    output.text()
                },
            })
        }
    }

    async fn close(self: Box<Self>) -> Result<(), ExecError> {
        self.session
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;
        info!(host = %self.name, "SSH disconnected");
        Ok(())
    }
}

/// Quote a path for a POSIX shell, leaving `~/` expandable
fn shell_quote(path: &str) -> String {
    match path.strip_prefix("~/") {
        Some(rest) => format!("~/'{}'", rest.replace('\'', r"'\''")),
        None => format!("'{}'", path.replace('\'', r"'\''")),
    }
}
