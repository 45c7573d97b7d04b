//! fleetboot-exec: Remote session abstraction
//!
//! Opens authenticated shell sessions to fleet hosts, runs one command line per
//! round trip and writes files, plus a small local runner for reachability probes.

pub mod error;
pub mod keys;
pub mod local;
pub mod result;
pub mod session;
pub mod ssh;
pub mod traits;

pub use error::ExecError;
pub use keys::{AuthMethod, KeyError, ResolvedAuth};
pub use local::LocalRunner;
pub use result::{CommandOutput, ConnectionInfo};
pub use session::Session;
pub use ssh::{SshConnector, SshShell};
pub use traits::{Connector, RemoteShell};
