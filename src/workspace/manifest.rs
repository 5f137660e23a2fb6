// src/workspace/manifest.rs

//! Installation manifest parsing.
//!
//! Autoproj records the layout of a bootstrapped workspace in
//! `.autoproj/installation-manifest`, a YAML sequence mixing package
//! entries (with `name`, `srcdir`, `builddir`, ...) and package-set
//! entries (with `package_set`). Only package entries matter here.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use tracing::debug;

use crate::errors::Result;

/// A buildable package within a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub name: String,
    pub srcdir: PathBuf,
    /// Absent for package types that have no build step (e.g. Ruby packages).
    pub builddir: Option<PathBuf>,
    pub prefix: Option<PathBuf>,
}

/// Raw manifest entry: every field optional so that package sets and
/// future entry kinds deserialize without error.
#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    package_set: Option<String>,
    #[serde(default)]
    srcdir: Option<PathBuf>,
    #[serde(default)]
    builddir: Option<PathBuf>,
    #[serde(default)]
    prefix: Option<PathBuf>,
}

/// Load package entries from an installation manifest.
///
/// A missing file yields an empty list; a malformed file is an error.
pub fn load_manifest(path: &Path) -> Result<Vec<PackageInfo>> {
    if !path.is_file() {
        debug!(path = %path.display(), "no installation manifest");
        return Ok(Vec::new());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading installation manifest at {}", path.display()))?;

    let entries: Vec<RawEntry> = serde_yml::from_str(&contents)
        .with_context(|| format!("parsing installation manifest at {}", path.display()))?;

    let packages = entries
        .into_iter()
        .filter_map(|entry| {
            if entry.package_set.is_some() {
                return None;
            }
            match (entry.name, entry.srcdir) {
                (Some(name), Some(srcdir)) => Some(PackageInfo {
                    name,
                    srcdir,
                    builddir: entry.builddir,
                    prefix: entry.prefix,
                }),
                _ => None,
            }
        })
        .collect();

    Ok(packages)
}
