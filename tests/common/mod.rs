// tests/common/mod.rs

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use autoproj_bridge::watch::{ProcessSpawner, WatchChild};
use autoproj_bridge::workspace::Workspace;

/// Scripted behavior of one fake child process.
#[derive(Debug, Clone, Copy)]
pub struct ChildPlan {
    pub lifetime: Duration,
    pub exit_code: i32,
}

impl ChildPlan {
    pub fn dies_immediately(exit_code: i32) -> Self {
        Self {
            lifetime: Duration::ZERO,
            exit_code,
        }
    }

    pub fn lives_for(lifetime: Duration) -> Self {
        Self { lifetime, exit_code: 0 }
    }
}

/// A fake spawner that hands out scripted children and counts spawns.
///
/// Children follow `plan` in order; once exhausted, `default_plan` applies.
pub struct FakeSpawner {
    spawned: Arc<Mutex<u32>>,
    plan: Mutex<VecDeque<ChildPlan>>,
    default_plan: ChildPlan,
}

impl FakeSpawner {
    pub fn new(plan: Vec<ChildPlan>, default_plan: ChildPlan) -> Arc<Self> {
        Arc::new(Self {
            spawned: Arc::new(Mutex::new(0)),
            plan: Mutex::new(plan.into()),
            default_plan,
        })
    }

    pub fn spawn_count(&self) -> u32 {
        *self.spawned.lock().unwrap()
    }
}

impl ProcessSpawner for FakeSpawner {
    fn spawn(&self, _workspace: &Workspace) -> anyhow::Result<Box<dyn WatchChild>> {
        *self.spawned.lock().unwrap() += 1;
        let plan = self
            .plan
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.default_plan);
        Ok(Box::new(FakeChild {
            plan,
            killed: Arc::new(AtomicBool::new(false)),
            kill_signal: Arc::new(tokio::sync::Notify::new()),
        }))
    }
}

struct FakeChild {
    plan: ChildPlan,
    killed: Arc<AtomicBool>,
    kill_signal: Arc<tokio::sync::Notify>,
}

impl WatchChild for FakeChild {
    fn wait(&mut self) -> Pin<Box<dyn Future<Output = anyhow::Result<i32>> + Send + '_>> {
        let plan = self.plan;
        let killed = Arc::clone(&self.killed);
        let kill_signal = Arc::clone(&self.kill_signal);
        Box::pin(async move {
            if killed.load(Ordering::SeqCst) {
                return Ok(-15);
            }
            tokio::select! {
                _ = tokio::time::sleep(plan.lifetime) => Ok(plan.exit_code),
                _ = kill_signal.notified() => Ok(-15),
            }
        })
    }

    fn start_kill(&mut self) -> anyhow::Result<()> {
        self.killed.store(true, Ordering::SeqCst);
        self.kill_signal.notify_one();
        Ok(())
    }

    fn id(&self) -> Option<u32> {
        Some(1)
    }
}

/// A workspace skeleton in a temp directory: just the `.autoproj` marker.
pub fn fake_workspace() -> (tempfile::TempDir, Workspace) {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join(".autoproj")).expect("mkdir .autoproj");
    let workspace = Workspace::new(dir.path());
    (dir, workspace)
}

/// Poll `predicate` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, predicate: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    predicate()
}
