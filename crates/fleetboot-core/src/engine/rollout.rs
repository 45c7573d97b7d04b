use fleetboot_exec::Session;
use tracing::{info, instrument};

use super::Engine;
use crate::error::{ConfigError, EngineError};
use crate::interpret::CommandKind;
use crate::registry::Host;
use crate::report::{Procedure, ProcedureReport};

/// A local binary read into memory, ready to push
#[derive(Debug, Clone)]
struct Binary {
    name: String,
    contents: Vec<u8>,
}

impl Engine {
    /// Push the configured binaries to each host
    ///
    /// Each binary is first copied next to its destination under a `.new`
    /// name; only once every copy on the host has landed are they swapped in.
    /// A host that refuses a write or a rename fails alone.
    #[instrument(skip(self, hosts), fields(hosts = hosts.len()))]
    pub async fn install_binaries(&self, hosts: &[Host]) -> ProcedureReport {
        let mut report = ProcedureReport::new(Procedure::InstallBinaries);

        let binaries = match self.read_binaries().await {
            Ok(b) => b,
            Err(e) => return report.abort("read-binaries", &e),
        };

        for host in hosts {
            let result = match self.open(host).await {
                Ok(mut session) => {
                    let r = self.install_on(&mut session, host, &binaries).await;
                    session.close().await;
                    r
                }
                Err(e) => Err(e),
            };
            match &result {
                Ok(()) => report.stage_ok(
                    "install",
                    Some(host),
                    Some(format!("{} binaries", binaries.len())),
                ),
                Err(e) => report.stage_failed("install", Some(host), e),
            }
            report.host_result(host, result.as_ref().map(|_| ()));
        }

        report.finish()
    }

    async fn read_binaries(&self) -> Result<Vec<Binary>, EngineError> {
        let mut binaries = Vec::with_capacity(self.config.binaries.len());
        for path in &self.config.binaries {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    ConfigError::Invalid(format!("binary path {} has no file name", path.display()))
                })?
                .to_string();
            let contents = tokio::fs::read(path).await.map_err(|e| {
                ConfigError::Invalid(format!("cannot read {}: {e}", path.display()))
            })?;
            info!(binary = %name, bytes = contents.len(), "binary loaded");
            binaries.push(Binary { name, contents });
        }
        Ok(binaries)
    }

    async fn install_on(
        &self,
        session: &mut Session,
        host: &Host,
        binaries: &[Binary],
    ) -> Result<(), EngineError> {
        let dir = self.config.install_dir.trim_end_matches('/');

        for binary in binaries {
            let staged = format!("{dir}/{}.new", binary.name);
            self.write_file(session, host, &staged, &binary.contents)
                .await?;
        }

        for binary in binaries {
            let live = format!("{dir}/{}", binary.name);
            let swap = format!("rm -f {live} && mv {live}.new {live} && chmod 755 {live}");
            self.run_expect(session, host, &swap, &CommandKind::FileOperation)
                .await
                .map_err(|e| match e {
                    EngineError::CommandRejected { reason, .. } => EngineError::TransferFailure {
                        host: host.name.clone(),
                        reason,
                    },
                    other => other,
                })?;
            info!(host = %host.name, binary = %binary.name, "binary installed");
        }
        Ok(())
    }
}
