// tests/watch_supervision.rs

mod common;

use std::time::Duration;

use autoproj_bridge::watch::{SupervisorOptions, WatchManager, WatchProcess};
use common::{fake_workspace, wait_until, ChildPlan, FakeSpawner};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn fast_options() -> SupervisorOptions {
    SupervisorOptions {
        restart_retries: 2,
        restart_delay: ms(10),
        stale_pid_grace: ms(50),
        stability_window: ms(100),
        ready_rounds: 5,
    }
}

#[tokio::test]
async fn start_is_idempotent_while_running() {
    let (_dir, workspace) = fake_workspace();
    let spawner = FakeSpawner::new(vec![], ChildPlan::lives_for(Duration::from_secs(60)));
    let mut process = WatchProcess::with_options(workspace, spawner.clone(), fast_options());

    process.start();
    process.start();
    process.start();

    assert!(wait_until(ms(500), || spawner.spawn_count() == 1).await);
    assert!(process.is_running());

    tokio::time::sleep(ms(50)).await;
    assert_eq!(spawner.spawn_count(), 1);

    process.stop().await;
    assert!(!process.is_running());
    assert_eq!(spawner.spawn_count(), 1);
}

#[tokio::test]
async fn dying_child_is_respawned_up_to_the_retry_budget() {
    let (_dir, workspace) = fake_workspace();
    let spawner = FakeSpawner::new(vec![], ChildPlan::dies_immediately(1));
    let options = fast_options();
    let retries = options.restart_retries;
    let mut process = WatchProcess::with_options(workspace, spawner.clone(), options);

    process.start();
    let code = process.finish().await;

    assert_eq!(code, Some(1));
    assert_eq!(spawner.spawn_count(), retries + 1);
    assert!(!process.is_running());
}

#[tokio::test]
async fn a_stable_run_resets_the_retry_budget() {
    let (_dir, workspace) = fake_workspace();
    // One immediate death, then a run that outlives the stability window,
    // then immediate deaths again.
    let spawner = FakeSpawner::new(
        vec![
            ChildPlan::dies_immediately(1),
            ChildPlan {
                lifetime: ms(300),
                exit_code: 1,
            },
        ],
        ChildPlan::dies_immediately(1),
    );
    let mut options = fast_options();
    options.restart_retries = 1;
    let mut process = WatchProcess::with_options(workspace, spawner.clone(), options);

    process.start();
    process.finish().await;

    // Without the reset the budget would be exhausted after the second
    // spawn; the stable second run buys one more attempt.
    assert_eq!(spawner.spawn_count(), 3);
}

#[tokio::test]
async fn stale_pid_file_is_removed_before_spawning() {
    let (_dir, workspace) = fake_workspace();
    let pid_file = workspace.pid_file_path();
    // Beyond any realistic pid_max, so certainly not a live process.
    std::fs::write(&pid_file, "2000000000").unwrap();

    let spawner = FakeSpawner::new(vec![], ChildPlan::lives_for(Duration::from_secs(60)));
    let mut process = WatchProcess::with_options(workspace, spawner.clone(), fast_options());

    process.start();
    assert!(wait_until(Duration::from_secs(2), || spawner.spawn_count() == 1).await);
    assert!(!pid_file.exists());

    process.stop().await;
    assert_eq!(spawner.spawn_count(), 1);
}

#[tokio::test]
async fn waits_for_a_live_external_watcher_to_exit() {
    let (_dir, workspace) = fake_workspace();
    let pid_file = workspace.pid_file_path();
    // Our own PID: definitely alive.
    std::fs::write(&pid_file, std::process::id().to_string()).unwrap();

    let spawner = FakeSpawner::new(vec![], ChildPlan::lives_for(Duration::from_secs(60)));
    let mut process = WatchProcess::with_options(workspace, spawner.clone(), fast_options());

    process.start();
    tokio::time::sleep(ms(300)).await;
    assert_eq!(spawner.spawn_count(), 0, "must not spawn while the slot is taken");
    assert!(process.is_running());

    // The external owner exits and releases the slot.
    std::fs::remove_file(&pid_file).unwrap();
    assert!(wait_until(Duration::from_secs(2), || spawner.spawn_count() == 1).await);

    process.stop().await;
}

#[tokio::test]
async fn finish_without_start_resolves_to_none() {
    let (_dir, workspace) = fake_workspace();
    let spawner = FakeSpawner::new(vec![], ChildPlan::dies_immediately(0));
    let mut process = WatchProcess::with_options(workspace, spawner, fast_options());
    assert_eq!(process.finish().await, None);
}

#[tokio::test]
async fn manager_stop_is_a_noop_for_untracked_roots() {
    let spawner = FakeSpawner::new(vec![], ChildPlan::lives_for(Duration::from_secs(60)));
    let mut manager = WatchManager::with_spawner(spawner.clone(), fast_options());

    let (_dir, workspace) = fake_workspace();
    let root = workspace.root().to_path_buf();

    manager.stop(std::path::Path::new("/nowhere")).await;

    manager.start(workspace.clone());
    manager.start(workspace);
    assert!(manager.is_tracked(&root));
    assert!(wait_until(ms(500), || spawner.spawn_count() == 1).await);

    manager.dispose().await;
    assert!(!manager.is_tracked(&root));
    assert_eq!(spawner.spawn_count(), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn real_spawner_starts_and_stops_the_workspace_tool() {
    use autoproj_bridge::watch::AutoprojSpawner;
    use std::os::unix::fs::PermissionsExt;
    use std::sync::Arc;

    let (dir, workspace) = fake_workspace();
    let bin = dir.path().join(".autoproj").join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    let exe = bin.join("autoproj");
    // Leaves a marker so the test can tell the child actually started.
    std::fs::write(&exe, "#!/bin/sh\ntouch started\nexec sleep 60\n").unwrap();
    std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

    let mut process =
        WatchProcess::with_options(workspace, Arc::new(AutoprojSpawner), fast_options());
    process.start();

    let marker = dir.path().join("started");
    assert!(wait_until(Duration::from_secs(5), || marker.exists()).await);
    assert!(process.is_running());
    // Killed, so no regular exit code.
    assert_eq!(process.stop().await, Some(-1));
    assert!(!process.is_running());
}
