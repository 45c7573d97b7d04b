//! Configuration discovery and loading

use std::path::{Path, PathBuf};

use eyre::{WrapErr, eyre};
use fleetboot_core::FleetConfig;

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "FLEETBOOT_CONFIG";

/// File format, picked from the extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Json,
}

impl Format {
    fn of(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Toml,
        }
    }
}

/// Parse and validate config text
///
/// # Errors
/// Returns error if the text does not parse or fails validation
pub fn parse(content: &str, format: Format) -> eyre::Result<FleetConfig> {
    let config: FleetConfig = match format {
        Format::Toml => toml::from_str(content)?,
        Format::Json => serde_json::from_str(content)?,
    };
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// # Errors
/// Returns error if the file cannot be read or parsed
pub fn load(path: &Path) -> eyre::Result<FleetConfig> {
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading {}", path.display()))?;
    parse(&content, Format::of(path)).wrap_err_with(|| format!("loading {}", path.display()))
}

/// Candidate paths, in the order they are tried
fn candidates() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("fleetboot.toml"),
        PathBuf::from("fleetboot.json"),
        PathBuf::from("/etc/fleetboot/fleetboot.toml"),
    ];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("fleetboot/fleetboot.toml"));
    }
    paths
}

/// Load from the explicit path, the environment, or the default locations
///
/// A fleet has no sensible default, so finding nothing is an error.
///
/// # Errors
/// Returns error if no file is found or the chosen one fails to load
pub fn discover(explicit: Option<&Path>) -> eyre::Result<(FleetConfig, PathBuf)> {
    if let Some(path) = explicit {
        return Ok((load(path)?, path.to_path_buf()));
    }

    if let Ok(path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(path);
        return Ok((load(&path)?, path));
    }

    let paths = candidates();
    for path in &paths {
        if path.exists() {
            return Ok((load(path)?, path.clone()));
        }
    }

    let tried: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    Err(eyre!(
        "no configuration file found (tried {}); pass --config or set {CONFIG_ENV}",
        tried.join(", ")
    ))
}
