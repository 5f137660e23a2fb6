// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid PID file: {0}")]
    InvalidPidFile(PathBuf),

    #[error("could not start watch process for workspace '{0}'")]
    CouldNotStart(String),

    #[error("malformed compilation database {path}: {source}")]
    MalformedDatabase {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("not an Autoproj workspace (no .autoproj directory above {0})")]
    NotAWorkspace(PathBuf),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BridgeError>;
