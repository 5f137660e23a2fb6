// src/watch/manager.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::watch::process::{AutoprojSpawner, ProcessSpawner, SupervisorOptions, WatchProcess};
use crate::workspace::Workspace;

/// Registry of watch supervisors, one per tracked workspace root.
///
/// Lifecycle facade for folder-add/remove events: `start` is idempotent,
/// `stop` removes the entry, `dispose` tears everything down.
pub struct WatchManager {
    spawner: Arc<dyn ProcessSpawner>,
    options: SupervisorOptions,
    processes: HashMap<PathBuf, WatchProcess>,
}

impl WatchManager {
    pub fn new() -> Self {
        Self::with_spawner(Arc::new(AutoprojSpawner), SupervisorOptions::default())
    }

    /// Inject the spawner and tunables; the seam tests use to avoid real
    /// processes.
    pub fn with_spawner(spawner: Arc<dyn ProcessSpawner>, options: SupervisorOptions) -> Self {
        Self {
            spawner,
            options,
            processes: HashMap::new(),
        }
    }

    fn create_process(&self, workspace: Workspace) -> WatchProcess {
        WatchProcess::with_options(workspace, Arc::clone(&self.spawner), self.options.clone())
    }

    pub fn is_tracked(&self, root: &Path) -> bool {
        self.processes.contains_key(root)
    }

    /// Fetch-or-create the supervisor for the workspace and start it.
    pub fn start(&mut self, workspace: Workspace) {
        let root = workspace.root().to_path_buf();
        if !self.processes.contains_key(&root) {
            info!(workspace = %workspace.name(), "supervising workspace");
            let process = self.create_process(workspace);
            self.processes.insert(root.clone(), process);
        }
        if let Some(process) = self.processes.get_mut(&root) {
            process.start();
        }
    }

    /// Stop and drop the supervisor for `root`; no-op when untracked.
    pub async fn stop(&mut self, root: &Path) {
        if let Some(mut process) = self.processes.remove(root) {
            debug!(workspace = %process.workspace().name(), "stopping workspace supervisor");
            process.stop().await;
        }
    }

    /// Stop every tracked supervisor and clear the registry.
    pub async fn dispose(&mut self) {
        let roots: Vec<PathBuf> = self.processes.keys().cloned().collect();
        for root in roots {
            self.stop(&root).await;
        }
    }
}

impl Default for WatchManager {
    fn default() -> Self {
        Self::new()
    }
}
