// src/watch/pid_lock.rs

//! The PID file as an advisory cross-process lock.
//!
//! `autoproj watch` writes its PID to `<root>/.autoproj/watch`. The file is
//! the only coordination point between watcher instances started from
//! different processes: presence of a live PID means the slot is taken,
//! a dead PID means the file is stale, absence means the slot is free.
//!
//! There is no atomic create-if-absent step in this protocol; two
//! processes racing after both observing an empty slot is a narrow but
//! real race, inherited from the tool's own design.

use std::path::{Path, PathBuf};

use anyhow::Context;
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::debug;

use crate::errors::{BridgeError, Result};

/// Advisory lock over a PID file: read, release-if-stale, wait-for-release.
#[derive(Debug, Clone)]
pub struct PidLock {
    path: PathBuf,
}

impl PidLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the PID recorded in the file.
    ///
    /// `None` when the file does not exist; an error when its content is
    /// not a decimal integer.
    pub async fn read(&self) -> Result<Option<u32>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        contents
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| BridgeError::InvalidPidFile(self.path.clone()))
    }

    /// Delete the file. Already-absent is not an error.
    pub async fn remove(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Block until the file is deleted by its owner.
    ///
    /// Watches the parent directory (the file itself may disappear and
    /// reappear) and re-checks existence after arming the watcher, so a
    /// deletion between the caller's check and ours is not missed.
    pub async fn wait_released(&self) -> Result<()> {
        let parent = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        // Channel from the blocking notify callback into the async world.
        let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel::<notify::Event>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    let _ = event_tx.send(event);
                }
                Err(err) => {
                    eprintln!("autoproj-bridge: pid file watch error: {err}");
                }
            },
            Config::default(),
        )
        .context("creating PID file watcher")?;

        watcher
            .watch(&parent, RecursiveMode::NonRecursive)
            .with_context(|| format!("watching {} for PID file release", parent.display()))?;

        if !self.path.exists() {
            return Ok(());
        }
        debug!(path = %self.path.display(), "waiting for PID file to be released");

        while let Some(event) = event_rx.recv().await {
            if event.paths.iter().any(|p| p == &self.path) && !self.path.exists() {
                debug!(path = %self.path.display(), "PID file released");
                return Ok(());
            }
        }

        // The watcher never drops while we hold it; a closed channel means
        // the backend shut down underneath us.
        Err(anyhow::anyhow!("PID file watcher stopped unexpectedly").into())
    }
}

/// Whether a process with the given PID currently exists.
#[cfg(unix)]
pub fn pid_alive(pid: u32) -> bool {
    // Signal 0 performs error checking only. EPERM still means the process
    // exists, just owned by someone else.
    let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// The supervised tool only runs on unix; elsewhere every recorded PID is
/// treated as gone.
#[cfg(not(unix))]
pub fn pid_alive(_pid: u32) -> bool {
    false
}
