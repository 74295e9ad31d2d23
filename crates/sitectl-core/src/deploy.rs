use crate::config::Secrets;
use crate::error::{Result, SiteError};
use crate::paths::{remote_join, remote_parent};
use crate::transport::{Connect, Transport};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

// ---------------------------------------------------------------------------
// FixRule
// ---------------------------------------------------------------------------

/// Literal `find -> replace` rewrite applied to a file before upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixRule {
    /// Restrict the rule to files with this extension (without the dot).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    pub find: String,
    pub replace: String,
}

impl FixRule {
    pub fn applies_to(&self, path: &Path) -> bool {
        match &self.extension {
            None => true,
            Some(ext) => path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(ext.trim_start_matches('.'))),
        }
    }
}

/// Apply every matching rule. `None` when nothing changed.
pub fn apply_fixes(path: &Path, content: &str, rules: &[FixRule]) -> Option<String> {
    let mut out: Option<String> = None;
    for rule in rules {
        if rule.find.is_empty() || !rule.applies_to(path) {
            continue;
        }
        let current = out.as_deref().unwrap_or(content);
        if current.contains(&rule.find) {
            out = Some(current.replace(&rule.find, &rule.replace));
        }
    }
    out
}

// ---------------------------------------------------------------------------
// DeployReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeployFailure {
    pub file: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeployReport {
    pub deployed: Vec<String>,
    pub failed: Vec<DeployFailure>,
}

impl DeployReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_files(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.file.as_str()).collect()
    }

    pub fn redact(&mut self, secrets: &Secrets) {
        for f in &mut self.failed {
            f.error = secrets.redact(&f.error);
        }
    }
}

// ---------------------------------------------------------------------------
// FileDeployer
// ---------------------------------------------------------------------------

/// Pushes theme-relative files to the server.
pub trait FileDeployer {
    /// Upload one file; returns the remote path.
    fn deploy_file(&mut self, rel: &str) -> Result<String>;

    /// Upload each file, collecting failures instead of stopping.
    fn deploy_files(&mut self, files: &[String]) -> DeployReport {
        let mut report = DeployReport::default();
        for file in files {
            match self.deploy_file(file) {
                Ok(_) => report.deployed.push(file.clone()),
                Err(e) => {
                    warn!(%file, "deploy failed: {e}");
                    report.failed.push(DeployFailure {
                        file: file.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        report
    }
}

fn check_relative(rel: &str) -> Result<&Path> {
    let path = Path::new(rel);
    let ok = !rel.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !ok {
        return Err(SiteError::InvalidParameter {
            action: "deploy".to_string(),
            reason: format!("'{rel}' must be a path inside the theme directory"),
        });
    }
    Ok(path)
}

// ---------------------------------------------------------------------------
// ThemeDeployer
// ---------------------------------------------------------------------------

/// Mirrors files from the local theme directory to the remote theme root
/// over one lazily-opened connection.
pub struct ThemeDeployer<C: Connect> {
    theme_dir: PathBuf,
    remote_root: String,
    connector: C,
    transport: Option<C::Transport>,
    known_dirs: HashSet<String>,
}

impl<C: Connect> ThemeDeployer<C> {
    pub fn new(theme_dir: impl Into<PathBuf>, remote_root: impl Into<String>, connector: C) -> Self {
        Self {
            theme_dir: theme_dir.into(),
            remote_root: remote_root.into(),
            connector,
            transport: None,
            known_dirs: HashSet::new(),
        }
    }

    pub fn theme_dir(&self) -> &Path {
        &self.theme_dir
    }

    pub fn remote_path(&self, rel: &Path) -> String {
        remote_join(&self.remote_root, rel)
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Run `f` on the open transport, connecting first if needed. The
    /// connection is dropped when `f` fails so the next call starts fresh.
    pub fn with_transport<T>(
        &mut self,
        f: impl FnOnce(&mut C::Transport) -> Result<T>,
    ) -> Result<T> {
        let mut transport = match self.transport.take() {
            Some(t) => t,
            None => self.connector.connect()?,
        };
        let result = f(&mut transport);
        if result.is_ok() {
            self.transport = Some(transport);
        } else {
            self.known_dirs.clear();
        }
        result
    }

    /// Upload `data` as theme-relative `rel`. Returns the remote path.
    pub fn upload_content(&mut self, rel: &str, data: &[u8]) -> Result<String> {
        let rel_path = check_relative(rel)?;
        let remote = self.remote_path(rel_path);
        let parent = remote_parent(&remote)
            .filter(|p| !self.known_dirs.contains(*p))
            .map(str::to_string);

        self.with_transport(|t| {
            if let Some(dir) = &parent {
                t.ensure_dir(dir)?;
            }
            t.upload_bytes(data, &remote)
        })?;

        if let Some(dir) = parent {
            self.known_dirs.insert(dir);
        }
        info!(file = %rel, %remote, "deployed");
        Ok(remote)
    }
}

impl<C: Connect> FileDeployer for ThemeDeployer<C> {
    fn deploy_file(&mut self, rel: &str) -> Result<String> {
        let local = self.theme_dir.join(check_relative(rel)?);
        if !local.is_file() {
            return Err(SiteError::ThemeFileNotFound(local.display().to_string()));
        }
        let data = std::fs::read(&local)?;
        self.upload_content(rel, &data)
    }
}

// ---------------------------------------------------------------------------
// collect_theme_files
// ---------------------------------------------------------------------------

/// Every file under `dir` as a forward-slash relative path, sorted,
/// skipping paths matched by `ignore`.
pub fn collect_theme_files(dir: &Path, ignore: &[String]) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Err(SiteError::ThemeFileNotFound(dir.display().to_string()));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.map_err(|e| {
            SiteError::Io(std::io::Error::other(format!("walking {}: {e}", dir.display())))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(dir) else {
            continue;
        };
        if crate::watch::is_ignored(rel, ignore) {
            continue;
        }
        let parts: Vec<String> = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(p) => Some(p.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        files.push(parts.join("/"));
    }
    files.sort();
    Ok(files)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
