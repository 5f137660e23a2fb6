// src/watch/process.rs

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::errors::{BridgeError, Result};
use crate::watch::pid_lock::{pid_alive, PidLock};
use crate::workspace::Workspace;

/// Tunables of the supervision loop. Production uses the defaults; tests
/// shrink the windows.
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// Restarts allowed between two stable runs before giving up.
    pub restart_retries: u32,
    /// Pause between an unexpected death and the next spawn attempt.
    pub restart_delay: Duration,
    /// Grace period before a PID file naming a dead process is considered
    /// stale, ruling out races with an owner about to rewrite it.
    pub stale_pid_grace: Duration,
    /// A run surviving at least this long resets the retry counter.
    pub stability_window: Duration,
    /// Readiness rounds before the loop fails with "could not start".
    pub ready_rounds: u32,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            restart_retries: 2,
            restart_delay: Duration::from_secs(5),
            stale_pid_grace: Duration::from_secs(5),
            stability_window: Duration::from_secs(15),
            ready_rounds: 5,
        }
    }
}

/// Handle to a spawned watch subprocess.
pub trait WatchChild: Send {
    /// Await process exit; resolves to the exit code.
    fn wait(&mut self) -> Pin<Box<dyn Future<Output = anyhow::Result<i32>> + Send + '_>>;

    /// Send the termination signal without awaiting exit.
    fn start_kill(&mut self) -> anyhow::Result<()>;

    fn id(&self) -> Option<u32>;
}

/// Trait abstracting how the watch subprocess is spawned.
///
/// Production code uses [`AutoprojSpawner`]; tests provide an
/// implementation that hands out scripted children and counts spawns.
pub trait ProcessSpawner: Send + Sync {
    fn spawn(&self, workspace: &Workspace) -> anyhow::Result<Box<dyn WatchChild>>;
}

/// Spawns the real `autoproj watch --show-events` subprocess, with
/// `RUBYOPT` pointing the interpreter at the workspace's startup shim and
/// both output streams drained into debug logs.
#[derive(Debug, Default)]
pub struct AutoprojSpawner;

impl ProcessSpawner for AutoprojSpawner {
    fn spawn(&self, workspace: &Workspace) -> anyhow::Result<Box<dyn WatchChild>> {
        let exe = workspace.autoproj_exe();
        let name = workspace.name();

        let mut rubyopt = std::env::var("RUBYOPT").unwrap_or_default();
        if !rubyopt.is_empty() {
            rubyopt.push(' ');
        }
        rubyopt.push_str("-r");
        rubyopt.push_str(&workspace.startup_shim().to_string_lossy());

        let mut cmd = Command::new(&exe);
        cmd.args(["watch", "--show-events"])
            .env("RUBYOPT", rubyopt)
            .current_dir(workspace.root())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning {} watch --show-events", exe.display()))?;

        // Always consume both streams so OS buffers don't fill.
        if let Some(stdout) = child.stdout.take() {
            let name = name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(workspace = %name, "watch stdout: {}", line);
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(workspace = %name, "watch stderr: {}", line);
                }
            });
        }

        Ok(Box::new(TokioWatchChild { child }))
    }
}

struct TokioWatchChild {
    child: tokio::process::Child,
}

impl WatchChild for TokioWatchChild {
    fn wait(&mut self) -> Pin<Box<dyn Future<Output = anyhow::Result<i32>> + Send + '_>> {
        Box::pin(async move {
            let status = self.child.wait().await.context("waiting for watch process")?;
            Ok(status.code().unwrap_or(-1))
        })
    }

    fn start_kill(&mut self) -> anyhow::Result<()> {
        self.child.start_kill().context("killing watch process")
    }

    fn id(&self) -> Option<u32> {
        self.child.id()
    }
}

/// Supervisor of exactly one watch subprocess for one workspace.
///
/// `start()` launches the supervision loop as a detached task and returns
/// immediately; `stop()` signals the child and awaits the loop. Unexpected
/// exits are retried with a bounded budget that a stable run resets.
pub struct WatchProcess {
    workspace: Workspace,
    options: SupervisorOptions,
    spawner: Arc<dyn ProcessSpawner>,
    running: Arc<AtomicBool>,
    kill_tx: watch::Sender<bool>,
    task: Option<tokio::task::JoinHandle<Option<i32>>>,
}

impl WatchProcess {
    pub fn new(workspace: Workspace, spawner: Arc<dyn ProcessSpawner>) -> Self {
        Self::with_options(workspace, spawner, SupervisorOptions::default())
    }

    pub fn with_options(
        workspace: Workspace,
        spawner: Arc<dyn ProcessSpawner>,
        options: SupervisorOptions,
    ) -> Self {
        let (kill_tx, _) = watch::channel(false);
        Self {
            workspace,
            options,
            spawner,
            running: Arc::new(AtomicBool::new(false)),
            kill_tx,
            task: None,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Launch the supervision loop; no-op when already running.
    ///
    /// The checked-and-set happens before any suspension point, so
    /// concurrent starts collapse to exactly one loop.
    pub fn start(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!(workspace = %self.workspace.name(), "watch process already running");
            return;
        }

        self.kill_tx.send_replace(false);

        let workspace = self.workspace.clone();
        let options = self.options.clone();
        let spawner = Arc::clone(&self.spawner);
        let running = Arc::clone(&self.running);
        let kill_rx = self.kill_tx.subscribe();

        self.task = Some(tokio::spawn(async move {
            let name = workspace.name();
            let result = run_loop(&workspace, &options, spawner.as_ref(), kill_rx).await;
            running.store(false, Ordering::SeqCst);
            match result {
                Ok(code) => code,
                Err(err) => {
                    error!(workspace = %name, error = %err, "watch supervision failed");
                    None
                }
            }
        }));
    }

    /// Signal the current child to terminate and await the loop's result.
    pub async fn stop(&mut self) -> Option<i32> {
        let _ = self.kill_tx.send(true);
        self.finish().await
    }

    /// Await (without initiating) the supervision loop's completion.
    /// Resolves to `None` when never started.
    pub async fn finish(&mut self) -> Option<i32> {
        match self.task.take() {
            Some(handle) => handle.await.unwrap_or(None),
            None => None,
        }
    }
}

/// Resolve once the kill flag flips to true; pends forever if the sender
/// is gone without ever requesting a kill.
async fn killed(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn run_loop(
    workspace: &Workspace,
    options: &SupervisorOptions,
    spawner: &dyn ProcessSpawner,
    mut kill_rx: watch::Receiver<bool>,
) -> Result<Option<i32>> {
    let name = workspace.name();
    let lock = PidLock::new(workspace.pid_file_path());
    let mut retries: u32 = 0;
    let mut last_code: Option<i32> = None;

    loop {
        tokio::select! {
            res = wait_ready(&lock, options, &name) => res?,
            _ = killed(&mut kill_rx) => return Ok(last_code),
        }

        let started = Instant::now();
        let mut child = match spawner.spawn(workspace) {
            Ok(child) => child,
            Err(err) => {
                error!(workspace = %name, error = %err, "failed to spawn watch process");
                if retries >= options.restart_retries {
                    error!(workspace = %name, "giving up on the watch process");
                    return Ok(last_code);
                }
                retries += 1;
                tokio::select! {
                    _ = sleep(options.restart_delay) => continue,
                    _ = killed(&mut kill_rx) => return Ok(last_code),
                }
            }
        };

        info!(workspace = %name, pid = ?child.id(), "watch process started");

        let deliberate;
        tokio::select! {
            res = child.wait() => {
                last_code = match res {
                    Ok(code) => Some(code),
                    Err(err) => {
                        warn!(workspace = %name, error = %err, "lost track of watch process");
                        None
                    }
                };
                deliberate = false;
            }
            _ = killed(&mut kill_rx) => {
                let _ = child.start_kill();
                last_code = child.wait().await.ok();
                deliberate = true;
            }
        }

        if started.elapsed() >= options.stability_window {
            retries = 0;
        }

        if deliberate {
            info!(workspace = %name, code = ?last_code, "watch process stopped");
            return Ok(last_code);
        }

        if retries >= options.restart_retries {
            error!(
                workspace = %name,
                code = ?last_code,
                "watch process keeps dying, giving up until started again"
            );
            return Ok(last_code);
        }

        warn!(
            workspace = %name,
            code = ?last_code,
            retries,
            "watch process died unexpectedly, restarting"
        );
        retries += 1;
        tokio::select! {
            _ = sleep(options.restart_delay) => {}
            _ = killed(&mut kill_rx) => return Ok(last_code),
        }
    }
}

/// Coordinate with a possibly externally-owned watch slot before spawning.
///
/// Each round either clears the slot (ready to spawn) or narrows down the
/// PID file's state; after `ready_rounds` rounds without resolution the
/// supervisor fails.
async fn wait_ready(lock: &PidLock, options: &SupervisorOptions, name: &str) -> Result<()> {
    // PID read from the file in a previous round, suspected stale.
    let mut candidate: Option<u32> = None;

    for _ in 0..options.ready_rounds {
        if let Some(pid) = candidate {
            if pid_alive(pid) {
                // It came back to life (or we own it); clear to proceed.
                return Ok(());
            }
            // Give a restarting owner a chance to rewrite the file before
            // treating it as stale.
            debug!(workspace = %name, pid, "PID file names a dead process, waiting out the grace period");
            sleep(options.stale_pid_grace).await;
        }

        match lock.read().await? {
            None => return Ok(()),
            Some(pid) if pid_alive(pid) => {
                info!(
                    workspace = %name,
                    pid,
                    "another watch process owns this workspace, waiting for it to exit"
                );
                candidate = None;
                lock.wait_released().await?;
            }
            Some(pid) => {
                if candidate == Some(pid) {
                    // Still the same dead owner after the grace period:
                    // the file is stale.
                    info!(workspace = %name, pid, "removing stale PID file");
                    lock.remove().await?;
                    return Ok(());
                }
                candidate = Some(pid);
            }
        }
    }

    Err(BridgeError::CouldNotStart(name.to_string()))
}
