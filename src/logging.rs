// src/logging.rs

//! Tracing subscriber setup.
//!
//! The log level is resolved from, in order: the `--log-level` flag, the
//! `AUTOPROJ_BRIDGE_LOG` environment variable, `info`.

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

const LOG_ENV_VAR: &str = "AUTOPROJ_BRIDGE_LOG";

/// Install the global subscriber. Must be called at most once.
pub fn init_logging(cli_level: Option<LogLevel>) {
    let env_level = std::env::var(LOG_ENV_VAR).ok();
    fmt()
        .with_max_level(resolve_level(cli_level, env_level.as_deref()))
        .with_target(true)
        .init();
}

fn resolve_level(cli: Option<LogLevel>, env: Option<&str>) -> Level {
    if let Some(level) = cli {
        return level.into();
    }
    env.and_then(|raw| Level::from_str(raw.trim()).ok())
        .unwrap_or(Level::INFO)
}
