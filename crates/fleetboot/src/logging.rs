//! Tracing setup

use eyre::eyre;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const CRATES: [&str; 3] = ["fleetboot", "fleetboot_core", "fleetboot_exec"];

/// Install the global subscriber
///
/// `RUST_LOG` wins over `level`; `verbose` forces debug for fleetboot crates
/// on top of either.
///
/// # Errors
/// Returns error if `level` or `RUST_LOG` is not a valid filter
pub fn init(level: &str, verbose: bool, json: bool) -> eyre::Result<()> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(level, verbose, env.as_deref())?;

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .init();
    }
    Ok(())
}

fn build_filter(level: &str, verbose: bool, env: Option<&str>) -> eyre::Result<EnvFilter> {
    let directives = match env {
        Some(env) if !env.trim().is_empty() => env.to_string(),
        _ => std::iter::once("warn".to_string())
            .chain(CRATES.iter().map(|c| format!("{c}={level}")))
            .collect::<Vec<_>>()
            .join(","),
    };
    let mut filter =
        EnvFilter::try_new(&directives).map_err(|e| eyre!("invalid log filter: {e}"))?;

    if verbose {
        for name in CRATES {
            let directive: Directive = format!("{name}=debug")
                .parse()
                .map_err(|e| eyre!("invalid log directive: {e}"))?;
            filter = filter.add_directive(directive);
        }
    }
    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_level_applies_without_env() {
        let filter = build_filter("info", false, None).unwrap().to_string();
        assert!(filter.contains("fleetboot_core=info"), "{filter}");
    }

    #[test]
    fn test_env_replaces_config_level() {
        let filter = build_filter("info", false, Some("fleetboot_exec=trace"))
            .unwrap()
            .to_string();
        assert!(filter.contains("fleetboot_exec=trace"), "{filter}");
        assert!(!filter.contains("fleetboot_core=info"), "{filter}");
    }

    #[test]
    fn test_verbose_wins_over_env() {
        let filter = build_filter("info", true, Some("warn"))
            .unwrap()
            .to_string();
        for name in CRATES {
            assert!(filter.contains(&format!("{name}=debug")), "{filter}");
        }
    }

    #[test]
    fn test_bad_level_rejected() {
        assert!(build_filter("not a level!", false, None).is_err());
    }
}
