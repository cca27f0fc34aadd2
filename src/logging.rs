//! Logging setup for test binaries and the CLI

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::{Result, VcrError};

/// Level used when neither `RUST_LOG` nor an explicit level is given
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Install a `fmt` subscriber writing through the test harness
///
/// `RUST_LOG` takes precedence over `level`. Calling this more than once
/// (e.g. from every test) is harmless: later calls leave the first subscriber
/// in place.
///
/// # Errors
///
/// Returns error if `level` is not a valid level name
pub fn init(level: Option<&str>) -> Result<()> {
    let level = parse_level(level.unwrap_or(DEFAULT_LOG_LEVEL))?;

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    // Err only means a subscriber is already installed
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_test_writer()
        .try_init();

    Ok(())
}

fn parse_level(raw: &str) -> Result<LevelFilter> {
    raw.trim().to_ascii_lowercase().parse().map_err(|_| {
        VcrError::ConfigError(format!(
            "invalid log level `{raw}`; expected one of trace, debug, info, warn, error, off"
        ))
    })
}
