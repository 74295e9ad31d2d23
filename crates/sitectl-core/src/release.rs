//! Guarded production release: back up the document root, upload, tighten
//! permissions, check critical files and restore the backup if anything
//! essential failed.

use crate::config::Secrets;
use crate::error::Result;
use crate::paths;
use crate::transport::{shell_quote, shell_quote_path, Transport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

pub const BACKUP_DIR: &str = "~/backups";
pub const DEFAULT_BACKUP_PREFIX: &str = "sitectl_backup";

/// Files locked down to owner read/write after upload.
const PRIVATE_FILES: &[&str] = &["wp-config.php", ".htaccess"];

#[derive(Debug, Clone)]
pub struct ReleaseOptions {
    /// Remote document root that gets backed up and restored.
    /// Uploads must land inside it for a rollback to undo them.
    pub deployment_path: String,
    pub backup_prefix: String,
    pub critical_files: Vec<String>,
    pub retention_days: u32,
}

/// One file to push: local source and absolute remote destination.
#[derive(Debug, Clone)]
pub struct Upload {
    pub local: PathBuf,
    pub remote: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStatus {
    Success,
    RolledBack,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupInfo {
    pub created: bool,
    pub name: Option<String>,
    pub retention_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseReport {
    pub timestamp: DateTime<Utc>,
    pub duration_secs: f64,
    pub status: ReleaseStatus,
    pub backup: BackupInfo,
    pub uploaded: Vec<String>,
    pub failed: Vec<String>,
    pub validation: Vec<String>,
    pub warnings: Vec<String>,
    pub rolled_back: bool,
}

impl ReleaseReport {
    pub fn redact(&mut self, secrets: &Secrets) {
        for line in self.validation.iter_mut().chain(self.warnings.iter_mut()) {
            *line = secrets.redact(line);
        }
    }

    pub fn save(&self, root: &Path) -> Result<PathBuf> {
        let path = paths::report_path(root, "release", &self.timestamp);
        let data = serde_json::to_string_pretty(self)?;
        crate::io::atomic_write(&path, data.as_bytes())?;
        Ok(path)
    }
}

pub struct Release<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
    opts: ReleaseOptions,
}

impl<'a, T: Transport + ?Sized> Release<'a, T> {
    pub fn new(transport: &'a mut T, opts: ReleaseOptions) -> Self {
        Self { transport, opts }
    }

    fn backup_name(&self, at: &DateTime<Utc>) -> String {
        format!("{}_{}", self.opts.backup_prefix, at.format("%Y%m%d_%H%M%S"))
    }

    fn create_backup(&mut self, name: &str) -> Result<()> {
        let src = shell_quote_path(&self.opts.deployment_path);
        let dir = format!("{BACKUP_DIR}/{}", shell_quote(name));
        let cmd = format!(
            "mkdir -p {dir} && cp -a {src}/. {dir}/ && cd {BACKUP_DIR} && tar -czf {name}.tar.gz {name} && rm -rf {name}",
            name = shell_quote(name),
        );
        info!(backup = %name, "creating backup");
        self.transport.exec_checked(&cmd)?;
        Ok(())
    }

    fn rollback(&mut self, name: &str) -> Result<()> {
        let dest = shell_quote_path(&self.opts.deployment_path);
        let cmd = format!(
            "cd {BACKUP_DIR} && tar -xzf {name}.tar.gz && cp -a {name}/. {dest}/ && rm -rf {name}",
            name = shell_quote(name),
        );
        warn!(backup = %name, "rolling back");
        self.transport.exec_checked(&cmd)?;
        Ok(())
    }

    fn harden(&mut self) -> Vec<String> {
        let root = shell_quote_path(&self.opts.deployment_path);
        let mut cmds = vec![
            format!("find {root} -type d -exec chmod 755 {{}} +"),
            format!("find {root} -type f -exec chmod 644 {{}} +"),
        ];
        for file in PRIVATE_FILES {
            cmds.push(format!("if [ -f {root}/{file} ]; then chmod 600 {root}/{file}; fi"));
        }
        let mut warnings = Vec::new();
        for cmd in cmds {
            if let Err(e) = self.transport.exec_checked(&cmd) {
                warn!("permission hardening step failed: {e}");
                warnings.push(e.to_string());
            }
        }
        warnings
    }

    /// Returns the missing critical files.
    fn validate(&mut self, report: &mut ReleaseReport) -> Result<Vec<String>> {
        let root = shell_quote_path(&self.opts.deployment_path);
        let mut missing = Vec::new();
        for file in &self.opts.critical_files {
            let out = self
                .transport
                .exec(&format!("test -f {root}/{}", shell_quote(file)))?;
            if out.success() {
                report.validation.push(format!("verified: {file}"));
            } else {
                report.validation.push(format!("missing: {file}"));
                missing.push(file.clone());
            }
        }
        Ok(missing)
    }

    fn prune(&mut self) -> Result<()> {
        let cmd = format!(
            "find {BACKUP_DIR} -maxdepth 1 -name {} -mtime +{} -delete",
            shell_quote(&format!("{}_*.tar.gz", self.opts.backup_prefix)),
            self.opts.retention_days
        );
        self.transport.exec_checked(&cmd)?;
        Ok(())
    }

    pub fn run(mut self, uploads: &[Upload]) -> ReleaseReport {
        let started = Instant::now();
        let timestamp = Utc::now();
        let mut report = ReleaseReport {
            timestamp,
            duration_secs: 0.0,
            status: ReleaseStatus::Success,
            backup: BackupInfo {
                created: false,
                name: None,
                retention_days: self.opts.retention_days,
            },
            uploaded: Vec::new(),
            failed: Vec::new(),
            validation: Vec::new(),
            warnings: Vec::new(),
            rolled_back: false,
        };

        let name = self.backup_name(&timestamp);
        if let Err(e) = self.create_backup(&name) {
            // Without a backup nothing is touched.
            error!("backup failed, aborting release: {e}");
            report.status = ReleaseStatus::Failed;
            report.warnings.push(format!("backup failed: {e}"));
            report.duration_secs = started.elapsed().as_secs_f64();
            return report;
        }
        report.backup.created = true;
        report.backup.name = Some(format!("{name}.tar.gz"));

        for upload in uploads {
            let result = match paths::remote_parent(&upload.remote) {
                Some(parent) => self.transport.ensure_dir(parent),
                None => Ok(()),
            }
            .and_then(|_| self.transport.upload(&upload.local, &upload.remote));
            match result {
                Ok(()) => {
                    info!(remote = %upload.remote, "uploaded");
                    report.uploaded.push(upload.remote.clone());
                }
                Err(e) => {
                    error!(remote = %upload.remote, "upload failed: {e}");
                    report.failed.push(upload.remote.clone());
                }
            }
        }

        let hardening = self.harden();
        report.warnings.extend(hardening);

        let missing = match self.validate(&mut report) {
            Ok(missing) => missing,
            Err(e) => {
                report.validation.push(format!("validation error: {e}"));
                self.opts.critical_files.clone()
            }
        };

        if !report.failed.is_empty() || !missing.is_empty() {
            report.status = ReleaseStatus::Failed;
            match self.rollback(&name) {
                Ok(()) => {
                    report.rolled_back = true;
                    report.status = ReleaseStatus::RolledBack;
                }
                Err(e) => {
                    error!("rollback failed: {e}");
                    report.warnings.push(format!("rollback failed: {e}"));
                }
            }
        }

        if let Err(e) = self.prune() {
            warn!("backup cleanup failed: {e}");
            report.warnings.push(format!("backup cleanup failed: {e}"));
        }

        report.duration_secs = started.elapsed().as_secs_f64();
        info!(status = ?report.status, uploaded = report.uploaded.len(), "release finished");
        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
