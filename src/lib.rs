// src/lib.rs

pub mod cli;
pub mod db;
pub mod errors;
pub mod logging;
pub mod provider;
pub mod watch;
pub mod workspace;

use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

use crate::cli::{CliArgs, Command};
use crate::provider::CppConfigurationProvider;
use crate::watch::WatchManager;
use crate::workspace::Workspace;

/// High-level entry point used by `main.rs`.
pub async fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Command::Watch { dir } => run_watch(dir).await,
        Command::Config { files, api_version } => run_config(files, api_version).await,
        Command::Check { dir } => run_check(dir),
    }
}

/// Supervise `autoproj watch` for one workspace until interrupted.
async fn run_watch(dir: PathBuf) -> Result<()> {
    let workspace = Workspace::find_root(&dir)?;
    info!(workspace = %workspace.name(), root = %workspace.root().display(), "starting watch supervision");

    let mut manager = WatchManager::new();
    manager.start(workspace);

    tokio::signal::ctrl_c().await?;
    info!("interrupted, shutting down");
    manager.dispose().await;
    Ok(())
}

/// Resolve IntelliSense configurations for the given files and print them
/// as a JSON array. Unresolvable files are omitted.
async fn run_config(files: Vec<PathBuf>, api_version: u32) -> Result<()> {
    let mut provider = CppConfigurationProvider::new();
    provider.set_api_version(api_version);

    for file in &files {
        let dir = file.parent().unwrap_or(file.as_path());
        if let Ok(workspace) = Workspace::find_root(dir) {
            let root = workspace.root().to_path_buf();
            if !provider.workspaces().iter().any(|w| w.root() == root) {
                provider.add_workspace(workspace)?;
            }
        }
    }

    let items: Vec<serde_json::Value> = provider
        .provide_configurations(&files)
        .into_iter()
        .map(|(file, config)| {
            serde_json::json!({
                "file": file,
                "configuration": config,
            })
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&items)?);
    provider.dispose();
    Ok(())
}

/// Print workspace layout and compile-commands availability.
fn run_check(dir: PathBuf) -> Result<()> {
    let workspace = Workspace::find_root(&dir)?;
    let packages = workspace.packages()?;

    println!("workspace: {} ({})", workspace.name(), workspace.root().display());
    println!("packages ({}):", packages.len());
    for pkg in &packages {
        println!("  - {}", pkg.name);
        println!("      srcdir: {}", pkg.srcdir.display());
        match &pkg.builddir {
            Some(builddir) => {
                let db = builddir.join("compile_commands.json");
                println!("      builddir: {}", builddir.display());
                println!(
                    "      compile_commands.json: {}",
                    if db.is_file() { "present" } else { "missing" }
                );
            }
            None => println!("      builddir: (none)"),
        }
    }
    Ok(())
}
