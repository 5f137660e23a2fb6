// src/workspace/mod.rs

//! Autoproj workspace model.
//!
//! Responsibilities:
//! - Locate a workspace root from any directory inside it (`.autoproj`
//!   marker directory).
//! - Load package metadata from the installation manifest (`manifest.rs`).
//! - Map source files to their owning package across all tracked
//!   workspaces (`Workspaces`).
//!
//! It does **not** talk to the `autoproj` CLI; it only reads the metadata
//! that Autoproj leaves on disk.

pub mod manifest;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::{BridgeError, Result};

pub use manifest::{load_manifest, PackageInfo};

/// One Autoproj workspace, identified by its root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Walk up from `dir` until a directory containing `.autoproj` is found.
    pub fn find_root(dir: &Path) -> Result<Self> {
        let mut current = Some(dir);
        while let Some(candidate) = current {
            if candidate.join(".autoproj").is_dir() {
                return Ok(Self::new(candidate));
            }
            current = candidate.parent();
        }
        Err(BridgeError::NotAWorkspace(dir.to_path_buf()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Workspace display name: the root directory's basename.
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string())
    }

    /// Path of the workspace's own `autoproj` executable.
    pub fn autoproj_exe(&self) -> PathBuf {
        self.root.join(".autoproj").join("bin").join("autoproj")
    }

    /// PID file written by `autoproj watch`.
    pub fn pid_file_path(&self) -> PathBuf {
        self.root.join(".autoproj").join("watch")
    }

    /// Ruby startup shim loaded into the watch process via `RUBYOPT`.
    pub fn startup_shim(&self) -> PathBuf {
        self.root
            .join(".autoproj")
            .join("vscode-autoproj")
            .join("startup.rb")
    }

    /// Load the package list from the installation manifest.
    ///
    /// A missing manifest yields an empty package list: the workspace may
    /// simply never have been bootstrapped.
    pub fn packages(&self) -> Result<Vec<PackageInfo>> {
        load_manifest(&self.root.join(".autoproj").join("installation-manifest"))
    }
}

/// Registry of tracked workspaces, with package lookup across all of them.
#[derive(Debug, Default)]
pub struct Workspaces {
    entries: BTreeMap<PathBuf, WorkspaceEntry>,
}

#[derive(Debug)]
struct WorkspaceEntry {
    workspace: Workspace,
    packages: Vec<PackageInfo>,
}

impl Workspaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a workspace, loading its package list. Re-adding an already
    /// tracked root reloads the packages.
    pub fn add(&mut self, workspace: Workspace) -> Result<()> {
        let packages = workspace.packages()?;
        debug!(
            workspace = %workspace.name(),
            packages = packages.len(),
            "tracking workspace"
        );
        self.entries.insert(
            workspace.root().to_path_buf(),
            WorkspaceEntry { workspace, packages },
        );
        Ok(())
    }

    pub fn remove(&mut self, root: &Path) {
        self.entries.remove(root);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Workspace> {
        self.entries.values().map(|e| &e.workspace)
    }

    /// Find the package owning `file`: the longest `srcdir` prefix match
    /// across every tracked workspace.
    pub fn find_package(&self, file: &Path) -> Option<(&Workspace, &PackageInfo)> {
        let mut best: Option<(&Workspace, &PackageInfo)> = None;
        for entry in self.entries.values() {
            for pkg in &entry.packages {
                if file.starts_with(&pkg.srcdir) {
                    let longer = match best {
                        Some((_, prev)) => {
                            pkg.srcdir.as_os_str().len() > prev.srcdir.as_os_str().len()
                        }
                        None => true,
                    };
                    if longer {
                        best = Some((&entry.workspace, pkg));
                    }
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_root_walks_up_to_the_marker_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("ws");
        let nested = root.join("drivers").join("imu");
        std::fs::create_dir_all(root.join(".autoproj")).unwrap();
        std::fs::create_dir_all(&nested).unwrap();

        let ws = Workspace::find_root(&nested).unwrap();
        assert_eq!(ws.root(), root.as_path());
        assert_eq!(ws.name(), "ws");
    }

    #[test]
    fn find_root_fails_outside_any_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let err = Workspace::find_root(dir.path()).unwrap_err();
        assert!(matches!(err, BridgeError::NotAWorkspace(_)));
    }

    #[test]
    fn find_package_prefers_the_longest_srcdir_prefix() {
        let ws = Workspace::new("/ws");
        let mut registry = Workspaces::new();
        registry.entries.insert(
            ws.root().to_path_buf(),
            WorkspaceEntry {
                workspace: ws,
                packages: vec![
                    PackageInfo {
                        name: "drivers".into(),
                        srcdir: PathBuf::from("/ws/drivers"),
                        builddir: Some(PathBuf::from("/ws/drivers/build")),
                        prefix: None,
                    },
                    PackageInfo {
                        name: "drivers/imu".into(),
                        srcdir: PathBuf::from("/ws/drivers/imu"),
                        builddir: Some(PathBuf::from("/ws/drivers/imu/build")),
                        prefix: None,
                    },
                ],
            },
        );

        let (_, pkg) = registry
            .find_package(Path::new("/ws/drivers/imu/src/driver.cpp"))
            .unwrap();
        assert_eq!(pkg.name, "drivers/imu");

        assert!(registry.find_package(Path::new("/elsewhere/a.cpp")).is_none());
    }
}
