// src/db/entry.rs

use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

/// One entry of a JSON compilation database, with `arguments` always
/// populated.
///
/// The on-disk format (<https://clang.llvm.org/docs/JSONCompilationDatabase.html>)
/// carries only `command`; `arguments` is derived by shell-tokenizing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileCommand {
    pub directory: PathBuf,
    pub file: PathBuf,
    pub output: Option<PathBuf>,
    pub command: String,
    pub arguments: Vec<String>,
}

/// On-disk shape of a database entry.
#[derive(Debug, Deserialize)]
pub struct RawCompileCommand {
    pub directory: PathBuf,
    pub file: PathBuf,
    #[serde(default)]
    pub output: Option<PathBuf>,
    pub command: String,
}

impl RawCompileCommand {
    /// Resolve the relative `file` form and tokenize `command`.
    ///
    /// Returns `None` when the command cannot be tokenized (unbalanced
    /// quoting); the entry is then skipped rather than failing the whole
    /// database.
    pub fn into_command(self) -> Option<CompileCommand> {
        let arguments = match shell_words::split(&self.command) {
            Ok(args) => args,
            Err(err) => {
                warn!(
                    file = %self.file.display(),
                    error = %err,
                    "skipping database entry with untokenizable command"
                );
                return None;
            }
        };

        let file = if self.file.is_absolute() {
            self.file
        } else {
            self.directory.join(&self.file)
        };

        Some(CompileCommand {
            directory: self.directory,
            file,
            output: self.output,
            command: self.command,
            arguments,
        })
    }
}

/// Normalize a path for use as a database key.
///
/// Collapses duplicate and trailing separators and `.` components, and
/// canonicalizes the separator form, all without touching the filesystem.
/// Case folding is applied only on platforms with case-insensitive paths.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }

    #[cfg(windows)]
    {
        out = PathBuf::from(out.to_string_lossy().to_lowercase());
    }

    out
}
