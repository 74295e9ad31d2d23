use super::load_config;
use crate::output::{print_json, print_table};
use anyhow::Context;
use sitectl_core::config::{Config, Secrets};
use sitectl_core::deploy::{collect_theme_files, FileDeployer, ThemeDeployer};
use sitectl_core::paths::remote_join;
use sitectl_core::release::{Release, ReleaseOptions, ReleaseStatus, Upload, DEFAULT_BACKUP_PREFIX};
use sitectl_core::transport::{SshConnector, SshTransport};
use std::path::Path;

pub fn run(
    root: &Path,
    files: Vec<String>,
    all: bool,
    release: bool,
    json: bool,
) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let secrets = Secrets::from_env();
    let theme_dir = config.theme_dir(root);

    let files = if all {
        collect_theme_files(&theme_dir, &config.watch.ignore)
            .context("failed to list theme files")?
    } else if files.is_empty() {
        config.theme.deploy_files.clone()
    } else {
        files
    };
    if files.is_empty() {
        anyhow::bail!("nothing to deploy");
    }

    if release {
        run_release(root, &config, &secrets, &files, json)
    } else {
        run_plain(&config, &secrets, &theme_dir, &files, json)
    }
}

fn run_plain(
    config: &Config,
    secrets: &Secrets,
    theme_dir: &Path,
    files: &[String],
    json: bool,
) -> anyhow::Result<()> {
    let mut deployer = ThemeDeployer::new(
        theme_dir,
        config.sftp.remote_path.clone(),
        SshConnector::new(config.sftp.clone(), secrets.clone()),
    );
    let mut report = deployer.deploy_files(files);
    report.redact(secrets);

    if json {
        print_json(&report)?;
    } else {
        let mut rows: Vec<Vec<String>> = report
            .deployed
            .iter()
            .map(|f| vec![f.clone(), "deployed".to_string(), String::new()])
            .collect();
        rows.extend(
            report
                .failed
                .iter()
                .map(|f| vec![f.file.clone(), "failed".to_string(), f.error.clone()]),
        );
        print_table(&["FILE", "STATUS", "ERROR"], rows);
    }

    if !report.is_success() {
        anyhow::bail!("{} of {} files failed", report.failed.len(), files.len());
    }
    Ok(())
}

fn run_release(
    root: &Path,
    config: &Config,
    secrets: &Secrets,
    files: &[String],
    json: bool,
) -> anyhow::Result<()> {
    let theme_dir = config.theme_dir(root);
    let remote_theme = config.sftp.release_theme_path();
    let uploads: Vec<Upload> = files
        .iter()
        .map(|f| Upload {
            local: theme_dir.join(f),
            remote: remote_join(&remote_theme, Path::new(f)),
        })
        .collect();

    let mut transport =
        SshTransport::connect(&config.sftp, secrets).context("failed to connect to server")?;
    let mut report = Release::new(
        &mut transport,
        ReleaseOptions {
            deployment_path: config.sftp.deployment_path.clone(),
            backup_prefix: DEFAULT_BACKUP_PREFIX.to_string(),
            critical_files: config.theme.critical_files.clone(),
            retention_days: config.sftp.backup_retention_days,
        },
    )
    .run(&uploads);
    report.redact(secrets);
    let saved = report.save(root).context("failed to save release report")?;

    if json {
        print_json(&report)?;
    } else {
        println!("Release {:?} in {:.1}s", report.status, report.duration_secs);
        if let Some(name) = &report.backup.name {
            println!("  backup:   {name}");
        }
        println!("  uploaded: {}", report.uploaded.len());
        for f in &report.failed {
            println!("  failed:   {f}");
        }
        for line in &report.validation {
            println!("  {line}");
        }
        for w in &report.warnings {
            println!("  warning:  {w}");
        }
        println!("  report:   {}", saved.display());
    }

    match report.status {
        ReleaseStatus::Success => Ok(()),
        ReleaseStatus::RolledBack => anyhow::bail!("release rolled back"),
        ReleaseStatus::Failed => anyhow::bail!("release failed"),
    }
}
