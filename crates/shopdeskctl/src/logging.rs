//! Logging setup for shopdeskctl
//!
//! Logs go to stderr so stdout stays parseable. RUST_LOG wins over
//! `--verbose`, which wins over the config level.

use tracing_subscriber::EnvFilter;

/// Pick the filter directive when RUST_LOG is unset
pub fn default_level(config_level: &str, verbose: bool) -> String {
    if verbose {
        "debug".to_string()
    } else {
        config_level.to_string()
    }
}

/// Install the global subscriber; later calls are ignored
pub fn init(config_level: &str, verbose: bool) {
    let level = default_level(config_level, verbose);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_forces_debug() {
        assert_eq!(default_level("warn", true), "debug");
        assert_eq!(default_level("warn", false), "warn");
    }
}
