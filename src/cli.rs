// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `autoproj-bridge`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "autoproj-bridge",
    version,
    about = "Supervise the Autoproj watch process and serve compile-commands configurations.",
    long_about = None
)]
pub struct CliArgs {
    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `AUTOPROJ_BRIDGE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Supervise `autoproj watch` for the workspace containing DIR.
    ///
    /// Runs until interrupted; restarts the watch process on unexpected
    /// exits, up to a bounded retry budget.
    Watch {
        /// Directory inside the workspace. Default: current directory.
        #[arg(value_name = "DIR", default_value = ".")]
        dir: PathBuf,
    },

    /// Print IntelliSense configurations for source files as JSON.
    ///
    /// Files without a compile-commands entry are omitted from the output.
    Config {
        /// Source files to resolve.
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// Host API version to emulate when normalizing flags.
        #[arg(long, value_name = "N", default_value_t = 6)]
        api_version: u32,
    },

    /// Print workspace packages and compile-commands availability.
    Check {
        /// Directory inside the workspace. Default: current directory.
        #[arg(value_name = "DIR", default_value = ".")]
        dir: PathBuf,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
