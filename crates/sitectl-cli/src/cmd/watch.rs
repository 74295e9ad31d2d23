use super::load_config;
use crate::output::print_json;
use anyhow::Context;
use sitectl_core::config::Secrets;
use sitectl_core::deploy::ThemeDeployer;
use sitectl_core::transport::SshConnector;
use sitectl_core::watch::{run_watch, WatchWorker};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub fn run(
    root: &Path,
    dir: Option<PathBuf>,
    duration: Option<u64>,
    json: bool,
) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let secrets = Secrets::from_env();

    let dir = dir.unwrap_or_else(|| config.theme_dir(root));
    // Watcher events carry canonical paths.
    let dir = dir
        .canonicalize()
        .with_context(|| format!("theme directory {} not found", dir.display()))?;

    let deployer = ThemeDeployer::new(
        &dir,
        config.sftp.remote_path.clone(),
        SshConnector::new(config.sftp.clone(), secrets.clone()),
    );
    let mut worker = WatchWorker::new(deployer, config.watch.fixes.clone()).with_secrets(secrets);

    let deadline = duration.map(|s| Instant::now() + Duration::from_secs(s));
    if !json {
        println!(
            "Watching {} -> {} (Ctrl-C to stop)",
            dir.display(),
            config.sftp.remote_path
        );
    }

    let stats = run_watch(&dir, &config.watch, &mut worker, || {
        deadline.is_some_and(|d| Instant::now() >= d)
    })?;

    if json {
        print_json(&stats)?;
    } else {
        println!(
            "Deployed {}, unchanged {}, failed {}",
            stats.deployed, stats.unchanged, stats.failed
        );
    }
    Ok(())
}
