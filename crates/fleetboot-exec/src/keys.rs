//! Credential resolution for remote sessions

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, warn};

static TEMP_KEY_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// How a session authenticates
#[derive(Clone)]
pub enum AuthMethod {
    /// Username/password login
    Password(String),
    /// Explicit path to a private key file
    KeyFile(PathBuf),
    /// Base64-encoded private key held in an environment variable
    EnvKey(String),
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::Password(_) => f.write_str("Password(****)"),
            AuthMethod::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
            AuthMethod::EnvKey(var) => f.debug_tuple("EnvKey").field(var).finish(),
        }
    }
}

impl AuthMethod {
    /// Resolve to something the SSH library can use
    ///
    /// For `EnvKey`, decodes base64 and writes to a private temp file that is
    /// removed when the `ResolvedAuth` is dropped.
    ///
    /// # Errors
    /// Returns `KeyError` if the key file is missing, too open, or the
    /// environment variable is unset or not valid base64
    pub fn resolve(&self) -> Result<ResolvedAuth, KeyError> {
        match self {
            AuthMethod::Password(password) => Ok(ResolvedAuth::Password(password.clone())),
            AuthMethod::KeyFile(path) => {
                validate_key_permissions(path)?;
                Ok(ResolvedAuth::Key(path.clone()))
            }
            AuthMethod::EnvKey(var_name) => {
                let base64_key =
                    env::var(var_name).map_err(|_| KeyError::EnvNotSet(var_name.clone()))?;
                let key_data = base64_decode(&base64_key).map_err(|_| KeyError::InvalidBase64)?;
                let temp_path = write_temp_key(&key_data)?;
                Ok(ResolvedAuth::TempKey(temp_path))
            }
        }
    }
}

/// Resolved credentials
pub enum ResolvedAuth {
    /// Password login
    Password(String),
    /// Path to key file
    Key(PathBuf),
    /// Temporary key file (deleted on drop)
    TempKey(PathBuf),
}

impl fmt::Debug for ResolvedAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedAuth::Password(_) => f.write_str("Password(****)"),
            ResolvedAuth::Key(p) => f.debug_tuple("Key").field(p).finish(),
            ResolvedAuth::TempKey(p) => f.debug_tuple("TempKey").field(p).finish(),
        }
    }
}

impl ResolvedAuth {
    /// Key file path, if this is key-based auth
    #[must_use]
    pub fn key_path(&self) -> Option<&Path> {
        match self {
            ResolvedAuth::Key(p) | ResolvedAuth::TempKey(p) => Some(p),
            ResolvedAuth::Password(_) => None,
        }
    }

    /// Password, if this is password auth
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        match self {
            ResolvedAuth::Password(p) => Some(p),
            _ => None,
        }
    }
}

/// Key resolution errors
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("environment variable {0} not set")]
    EnvNotSet(String),

    #[error("invalid base64 encoding")]
    InvalidBase64,

    #[error("key file permissions too open: {0} (should be 600)")]
    BadPermissions(String),

    #[error("key file not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn base64_decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(input.trim())
}

fn validate_key_permissions(path: &Path) -> Result<(), KeyError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => KeyError::NotFound(path.display().to_string()),
        _ => KeyError::Io(e),
    })?;

    // group and other bits must be clear
    if metadata.permissions().mode() & 0o77 != 0 {
        return Err(KeyError::BadPermissions(path.display().to_string()));
    }

    Ok(())
}

fn write_temp_key(key_data: &[u8]) -> Result<PathBuf, KeyError> {
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let seq = TEMP_KEY_COUNTER.fetch_add(1, Ordering::Relaxed);
    let temp_path =
        env::temp_dir().join(format!("fleetboot_ssh_key_{}_{seq}", std::process::id()));

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(&temp_path)?;
    file.write_all(key_data)?;

    debug!(path = %temp_path.display(), "wrote temporary SSH key");

    Ok(temp_path)
}

impl Drop for ResolvedAuth {
    fn drop(&mut self) {
        if let ResolvedAuth::TempKey(path) = self
            && let Err(e) = std::fs::remove_file(&*path)
        {
            warn!(path = %path.display(), error = %e, "failed to remove temp key");
        }
    }
}
