//! Scoped session ownership
//!
//! A `Session` owns one open shell. Call sites close it explicitly with
//! [`Session::close`]; if a session is dropped while still open (early return,
//! cancellation, panic) the drop handler closes it on the current runtime.

use tracing::{debug, warn};

use crate::error::ExecError;
use crate::result::CommandOutput;
use crate::traits::RemoteShell;

/// An open session to one named host
pub struct Session {
    host: String,
    shell: Option<Box<dyn RemoteShell>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.host)
            .field("open", &self.shell.is_some())
            .finish()
    }
}

impl Session {
    /// Wrap an already connected shell
    pub fn new(host: impl Into<String>, shell: Box<dyn RemoteShell>) -> Self {
        Self {
            host: host.into(),
            shell: Some(shell),
        }
    }

    /// Host this session is bound to
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Run one command line
    ///
    /// # Errors
    /// Returns `ExecError::NotConnected` after close, or the transport error
    pub async fn run(&mut self, cmd: &str) -> Result<CommandOutput, ExecError> {
        let shell = self.shell.as_mut().ok_or(ExecError::NotConnected)?;
        debug!(host = %self.host, command = %cmd, "sending command");
        shell.run(cmd).await
    }

    /// Write a file on the remote host
    ///
    /// # Errors
    /// Returns `ExecError::TransferFailed` if the remote side refuses the write
    pub async fn write_file(&mut self, remote_path: &str, contents: &[u8]) -> Result<(), ExecError> {
        let shell = self.shell.as_mut().ok_or(ExecError::NotConnected)?;
        debug!(host = %self.host, path = %remote_path, bytes = contents.len(), "writing file");
        shell.write_file(remote_path, contents).await
    }

    /// Close the session; errors are logged, not returned
    pub async fn close(mut self) {
        if let Some(shell) = self.shell.take() {
            debug!(host = %self.host, "disconnecting");
            if let Err(e) = shell.close().await {
                warn!(host = %self.host, error = %e, "error while closing session");
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let Some(shell) = self.shell.take() else {
            return;
        };
        let host = std::mem::take(&mut self.host);
        warn!(host = %host, "session dropped while open, closing in background");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = shell.close().await {
                        warn!(host = %host, error = %e, "error while closing dropped session");
                    }
                });
            }
            Err(_) => warn!(host = %host, "no runtime available to close dropped session"),
        }
    }
}
