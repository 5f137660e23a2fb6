// src/watch/mod.rs

//! Watch-process supervision.
//!
//! This module keeps exactly one `autoproj watch` subprocess alive per
//! workspace:
//! - [`pid_lock`] treats the tool's PID file as an advisory cross-process
//!   lock, so watchers started from other editor windows or directly from
//!   a shell are respected.
//! - [`process`] owns the supervision loop: readiness protocol, spawn,
//!   bounded restart retries with a stability window, graceful stop.
//! - [`manager`] is the per-workspace registry driven by folder add/remove
//!   events.

pub mod manager;
pub mod pid_lock;
pub mod process;

pub use manager::WatchManager;
pub use pid_lock::{pid_alive, PidLock};
pub use process::{
    AutoprojSpawner, ProcessSpawner, SupervisorOptions, WatchChild, WatchProcess,
};
