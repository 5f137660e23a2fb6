// src/db/mod.rs

//! Compilation database handling.
//!
//! This module is responsible for:
//! - Parsing `compile_commands.json` files into per-source-file compiler
//!   invocations (`entry.rs`).
//! - Caching one parsed database per build directory and detecting on-disk
//!   changes by mtime polling (`database.rs`).
//!
//! It does **not** interpret compiler flags; that happens in the provider
//! layer on top of the raw `CompileCommand`s returned here.

pub mod database;
pub mod entry;

pub use database::{CompilationDatabase, DEFAULT_POLL_INTERVAL};
pub use entry::{normalize_path, CompileCommand};
