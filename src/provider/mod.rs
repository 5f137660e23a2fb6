// src/provider/mod.rs

//! C/C++ configuration provider.
//!
//! Bridges requested source files to IntelliSense-ready compiler
//! configurations:
//! - resolve the file's owning package (workspace registry),
//! - locate `<builddir>/compile_commands.json`,
//! - look up the compile command in a cached [`CompilationDatabase`],
//! - normalize flags into a [`SourceFileConfiguration`] (`flags.rs`),
//!   version-gated on the negotiated host capabilities (`host.rs`).

pub mod flags;
pub mod host;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::db::{CompilationDatabase, DEFAULT_POLL_INTERVAL};
use crate::workspace::{Workspace, Workspaces};

pub use flags::{IntelliSenseMode, LanguageStandard, TargetArch};
pub use host::{ApiVersion, HostCapabilities, IntellisenseHost, MIN_API_VERSION};

/// IntelliSense configuration for one source file.
#[derive(Debug, Clone, Serialize)]
pub struct SourceFileConfiguration {
    pub compiler_path: PathBuf,
    pub compiler_args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard: Option<LanguageStandard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intellisense_mode: Option<IntelliSenseMode>,
    pub defines: Vec<String>,
    /// Definitions collected from `-D`/`/D` flags. These are surfaced here
    /// but not merged into `defines`; the host already sees them in
    /// `compiler_args`, and merging would change what it deduplicates.
    pub extra_definitions: Vec<String>,
}

/// Per-session configuration provider with a cache of compilation
/// databases keyed by database path.
pub struct CppConfigurationProvider {
    workspaces: Workspaces,
    dbs: HashMap<PathBuf, CompilationDatabase>,
    host: Option<Box<dyn IntellisenseHost>>,
    caps: HostCapabilities,
    poll_interval: Duration,
    change_tx: mpsc::Sender<PathBuf>,
    change_rx: mpsc::Receiver<PathBuf>,
}

impl CppConfigurationProvider {
    pub fn new() -> Self {
        Self::with_poll_interval(DEFAULT_POLL_INTERVAL)
    }

    /// Override the database poll interval (tests use a short one).
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        let (change_tx, change_rx) = mpsc::channel(16);
        Self {
            workspaces: Workspaces::new(),
            dbs: HashMap::new(),
            host: None,
            caps: HostCapabilities::latest(),
            poll_interval,
            change_tx,
            change_rx,
        }
    }

    pub fn workspaces(&self) -> &Workspaces {
        &self.workspaces
    }

    pub fn add_workspace(&mut self, workspace: Workspace) -> crate::errors::Result<()> {
        self.workspaces.add(workspace)
    }

    pub fn remove_workspace(&mut self, root: &Path) {
        self.workspaces.remove(root);
    }

    /// Negotiate with the host at its advertised API version.
    ///
    /// Returns `false` (without side effects) when the host is older than
    /// the minimum supported version. On success, capabilities are resolved
    /// once and the host is told the provider is ready, either through
    /// `notify_ready` or, for versions predating it, through an explicit
    /// configuration-changed push.
    pub fn register(&mut self, host: Box<dyn IntellisenseHost>) -> bool {
        let version = host.version();
        if version < MIN_API_VERSION {
            warn!(version, "IntelliSense host API too old, not registering");
            return false;
        }

        self.caps = HostCapabilities::from_version(version);
        let mut host = host;
        if self.caps.supports_notify_ready {
            host.notify_ready();
        } else {
            host.did_change_custom_configuration();
        }
        self.host = Some(host);
        info!(version, "registered with IntelliSense host");
        true
    }

    /// Capabilities used for flag normalization. Defaults to the latest
    /// known API version until a host is registered.
    pub fn capabilities(&self) -> &HostCapabilities {
        &self.caps
    }

    /// Emulate a given host API version without registering a host.
    /// Used by the CLI's `config` command.
    pub fn set_api_version(&mut self, version: ApiVersion) {
        self.caps = HostCapabilities::from_version(version);
    }

    pub fn can_provide_configuration(&self, _file: &Path) -> bool {
        true
    }

    /// This provider never supplies browse (include-path) data, only
    /// per-file compiler configurations.
    pub fn can_provide_browse_configuration(&self) -> bool {
        false
    }

    pub fn can_provide_browse_configurations_per_folder(&self) -> bool {
        false
    }

    /// Fetch-or-create the cached database for `path`.
    ///
    /// The database is loaded only on first access, and only when the
    /// backing file exists. A later on-disk change invalidates the whole
    /// cache entry (see [`handle_db_change`](Self::handle_db_change))
    /// rather than reloading it in place.
    pub fn get_compilation_db(&mut self, path: &Path) -> &CompilationDatabase {
        let db = self.dbs.entry(path.to_path_buf()).or_insert_with(|| {
            debug!(path = %path.display(), "opening compilation database");
            CompilationDatabase::new(path, self.poll_interval, self.change_tx.clone())
        });
        if db.exists() && !db.loaded() {
            db.load();
        }
        db
    }

    /// Resolve configurations for the requested files.
    ///
    /// Files that cannot be resolved (unknown package, missing database,
    /// no entry) are silently omitted; a partial result is never an error.
    pub fn provide_configurations(
        &mut self,
        files: &[PathBuf],
    ) -> Vec<(PathBuf, SourceFileConfiguration)> {
        let mut items = Vec::new();
        for file in files {
            match self.configuration_for(file) {
                Some(config) => items.push((file.clone(), config)),
                None => debug!(file = %file.display(), "no configuration for file"),
            }
        }
        items
    }

    fn configuration_for(&mut self, file: &Path) -> Option<SourceFileConfiguration> {
        let (workspace, package) = self.workspaces.find_package(file)?;
        let builddir = package.builddir.clone()?;
        debug!(
            file = %file.display(),
            workspace = %workspace.name(),
            package = %package.name,
            "resolved owning package"
        );

        let db_path = builddir.join("compile_commands.json");
        let caps = self.caps;
        let command = self.get_compilation_db(&db_path).get(file)?;

        let mut arguments = command.arguments.iter();
        let compiler_path = PathBuf::from(arguments.next()?);
        let raw_flags: Vec<String> = arguments.cloned().collect();
        let compiler_args = flags::retokenize(&raw_flags);

        let standard = flags::parse_standard(&compiler_args, &caps);
        let arch = flags::parse_target_arch(&compiler_args);
        let intellisense_mode = flags::infer_intellisense_mode(&compiler_path, arch, &caps);
        let extra_definitions = flags::collect_defines(&compiler_args);

        Some(SourceFileConfiguration {
            compiler_path,
            compiler_args,
            standard,
            intellisense_mode,
            defines: Vec::new(),
            extra_definitions,
        })
    }

    /// React to an on-disk database change: the cache entry is dropped
    /// (replaced on next lookup, not reloaded in place) and the host is
    /// told to re-request configurations.
    pub fn handle_db_change(&mut self, path: &Path) {
        if self.dbs.remove(path).is_some() {
            debug!(path = %path.display(), "invalidating changed compilation database");
            self.notify_changes();
        }
    }

    /// Drain pending database-change notifications without blocking.
    /// Returns how many were handled.
    pub fn drain_db_changes(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(path) = self.change_rx.try_recv() {
            self.handle_db_change(&path);
            handled += 1;
        }
        handled
    }

    /// Await the next database-change notification and handle it.
    pub async fn handle_next_db_change(&mut self) -> Option<PathBuf> {
        let path = self.change_rx.recv().await?;
        self.handle_db_change(&path);
        Some(path)
    }

    /// Push both change notifications to the host; no-op when unregistered.
    pub fn notify_changes(&mut self) {
        if let Some(host) = self.host.as_mut() {
            host.did_change_custom_browse_configuration();
            host.did_change_custom_configuration();
        }
    }

    /// Drop every cached database (stopping their polls) while keeping the
    /// host registration. Used to force a reload without re-registering.
    pub fn clear_dbs(&mut self) {
        self.dbs.clear();
    }

    /// Release the database cache and the host handle.
    pub fn dispose(&mut self) {
        self.clear_dbs();
        self.host = None;
    }
}

impl Default for CppConfigurationProvider {
    fn default() -> Self {
        Self::new()
    }
}
