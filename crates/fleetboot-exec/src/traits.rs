//! Remote session traits

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::{CommandOutput, ConnectionInfo};

/// An open shell session bound to exactly one host
///
/// One call is one round trip; there is no batching.
#[async_trait]
pub trait RemoteShell: Send {
    /// Send one command line and wait for it to finish
    async fn run(&mut self, cmd: &str) -> Result<CommandOutput, ExecError>;

    /// Write `contents` to `remote_path`, replacing any existing file
    async fn write_file(&mut self, remote_path: &str, contents: &[u8]) -> Result<(), ExecError>;

    /// Close the session
    async fn close(self: Box<Self>) -> Result<(), ExecError>;
}

/// Opens sessions to hosts
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect and authenticate
    ///
    /// Fails with `ExecError::ConnectionFailed` or `ExecError::AuthenticationFailed`.
    async fn connect(&self, info: &ConnectionInfo) -> Result<Box<dyn RemoteShell>, ExecError>;

    fn connector_type(&self) -> &'static str;
}
