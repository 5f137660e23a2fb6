// src/db/database.rs

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::db::entry::{normalize_path, CompileCommand, RawCompileCommand};
use crate::errors::{BridgeError, Result};

/// How often a database checks its backing file for changes.
///
/// Polling instead of native filesystem events is deliberate: build systems
/// commonly replace `compile_commands.json` by rename-over-existing, which
/// native watch APIs do not reliably report for a specific tracked path.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Cached, hot-reloading view of one `compile_commands.json` file.
///
/// Created unloaded; `load()` fills the lookup map. A background poll task
/// stats the file every interval and, on any mtime or existence transition,
/// clears the map, resets `loaded`, and sends the database path on the
/// change channel exactly once per transition.
///
/// Dropping the database (or calling `dispose()`) stops the poll task.
pub struct CompilationDatabase {
    path: PathBuf,
    state: Arc<Mutex<DbState>>,
    poll: Option<tokio::task::JoinHandle<()>>,
}

#[derive(Default)]
struct DbState {
    commands: HashMap<PathBuf, CompileCommand>,
    loaded: bool,
    last_mtime: Option<SystemTime>,
}

impl CompilationDatabase {
    /// Create an unloaded database for `path` (which may not exist yet) and
    /// start its change poll.
    pub fn new(
        path: impl Into<PathBuf>,
        poll_interval: Duration,
        change_tx: mpsc::Sender<PathBuf>,
    ) -> Self {
        let path = path.into();
        let state = Arc::new(Mutex::new(DbState {
            last_mtime: stat_mtime(&path),
            ..DbState::default()
        }));

        let poll = tokio::spawn(poll_loop(
            path.clone(),
            Arc::clone(&state),
            poll_interval,
            change_tx,
        ));

        Self {
            path,
            state,
            poll: Some(poll),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the backing file currently exists on disk.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn loaded(&self) -> bool {
        self.state.lock().unwrap().loaded
    }

    /// Read and parse the backing file, replacing the lookup map.
    ///
    /// Read or parse failures are reported through the log and leave the
    /// database in its prior state; they never propagate to the caller.
    pub fn load(&self) {
        match self.try_load() {
            Ok(count) => {
                debug!(path = %self.path.display(), entries = count, "compilation database loaded");
            }
            Err(err) => {
                error!(
                    path = %self.path.display(),
                    error = %err,
                    "failed to load compilation database"
                );
            }
        }
    }

    fn try_load(&self) -> Result<usize> {
        let mtime = stat_mtime(&self.path);
        let contents = fs::read_to_string(&self.path)?;
        let raw: Vec<RawCompileCommand> =
            serde_json::from_str(&contents).map_err(|source| BridgeError::MalformedDatabase {
                path: self.path.clone(),
                source,
            })?;

        let commands: HashMap<PathBuf, CompileCommand> = raw
            .into_iter()
            .filter_map(RawCompileCommand::into_command)
            .map(|cmd| (normalize_path(&cmd.file), cmd))
            .collect();

        let count = commands.len();
        let mut st = self.state.lock().unwrap();
        st.commands = commands;
        st.loaded = true;
        // Record the mtime of what was just read so the poll does not
        // immediately report the load itself as a change.
        st.last_mtime = mtime;
        Ok(count)
    }

    /// Look up the compile command recorded for a source file.
    ///
    /// An absent entry is not an error; it simply means the build system
    /// recorded nothing for that file.
    pub fn get(&self, file: &Path) -> Option<CompileCommand> {
        let key = normalize_path(file);
        self.state.lock().unwrap().commands.get(&key).cloned()
    }

    /// Stop the change poll. Safe to call multiple times.
    pub fn dispose(&mut self) {
        if let Some(handle) = self.poll.take() {
            handle.abort();
        }
    }
}

impl Drop for CompilationDatabase {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for CompilationDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilationDatabase")
            .field("path", &self.path)
            .field("loaded", &self.loaded())
            .finish()
    }
}

async fn poll_loop(
    path: PathBuf,
    state: Arc<Mutex<DbState>>,
    poll_interval: Duration,
    change_tx: mpsc::Sender<PathBuf>,
) {
    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        let observed = stat_mtime(&path);
        let changed = {
            let mut st = state.lock().unwrap();
            if st.last_mtime != observed {
                st.last_mtime = observed;
                st.commands.clear();
                st.loaded = false;
                true
            } else {
                false
            }
        };

        if changed {
            debug!(path = %path.display(), "compilation database changed on disk");
            if change_tx.send(path.clone()).await.is_err() {
                // Nobody is listening anymore; stop polling.
                return;
            }
        }
    }
}

/// Mtime of `path`, with "file does not exist" as a distinct `None` state.
fn stat_mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
