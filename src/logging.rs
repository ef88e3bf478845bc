//! Tracing subscriber setup.
//!
//! Diagnostics go to stderr so that command output on stdout stays clean
//! enough to pipe into other tools.

use tracing_subscriber::filter::Directive;
use tracing_subscriber::{EnvFilter, prelude::*};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

/// Resolve the effective filter directive from the configured level and the
/// number of `-v` flags. Each flag raises verbosity by one step.
pub fn level_for(config: &LoggingConfig, verbosity: u8) -> String {
    match verbosity {
        0 => config.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

fn build_filter(level: &str) -> Result<EnvFilter> {
    let base = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::new(level),
    };

    let mut filter = base;
    for noisy in ["hyper=warn", "reqwest=warn", "h2=warn", "rustls=warn"] {
        let directive: Directive = noisy
            .parse()
            .map_err(|e| Error::config(format!("invalid log directive {noisy}: {e}")))?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

/// Install the global subscriber. Call once, early in `main`.
pub fn init(config: &LoggingConfig, verbosity: u8) -> Result<()> {
    let filter = build_filter(&level_for(config, verbosity))?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format.as_str() {
        "json" => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        "full" => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_thread_names(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        "compact" => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        other => {
            return Err(Error::config(format!(
                "unknown log format '{other}', expected compact, full or json"
            )));
        }
    };

    installed.map_err(|e| Error::config(format!("failed to initialize logging: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_raises_level() {
        let config = LoggingConfig::default();
        assert_eq!(level_for(&config, 0), "info");
        assert_eq!(level_for(&config, 1), "debug");
        assert_eq!(level_for(&config, 3), "trace");
    }

    #[test]
    fn test_unknown_format_rejected() {
        let config = LoggingConfig {
            level: "info".into(),
            format: "xml".into(),
        };
        assert!(init(&config, 0).is_err());
    }
}
