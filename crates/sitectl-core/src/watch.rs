//! Auto-deploy on save.
//!
//! notify delivers filesystem events on its own thread. They cross a
//! bounded channel to the single deploy loop, which debounces per path,
//! applies the configured fixes, skips content identical to the last upload
//! and pushes the rest through one reused connection.

use crate::config::{Secrets, WatchConfig};
use crate::deploy::{apply_fixes, FixRule, ThemeDeployer};
use crate::error::Result;
use crate::transport::Connect;
use notify::{EventKind, RecursiveMode, Watcher};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const CHANNEL_CAPACITY: usize = 256;
const IDLE_POLL: Duration = Duration::from_millis(500);

/// Case-insensitive substring match against any pattern.
pub fn is_ignored(path: &Path, patterns: &[String]) -> bool {
    let text = path.to_string_lossy().to_lowercase();
    patterns
        .iter()
        .filter(|p| !p.is_empty())
        .any(|p| text.contains(&p.to_lowercase()))
}

pub fn content_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

// ---------------------------------------------------------------------------
// Debouncer
// ---------------------------------------------------------------------------

/// Trailing-edge debounce: a path is due once it has been quiet for
/// `quiet`. Every new event for the path restarts its timer.
#[derive(Debug)]
pub struct Debouncer {
    quiet: Duration,
    pending: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: HashMap::new(),
        }
    }

    pub fn record(&mut self, path: PathBuf, now: Instant) {
        self.pending.insert(path, now + self.quiet);
    }

    /// Remove and return every path whose deadline has passed, sorted.
    pub fn due(&mut self, now: Instant) -> Vec<PathBuf> {
        let mut ready: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &ready {
            self.pending.remove(path);
        }
        ready.sort();
        ready
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

// ---------------------------------------------------------------------------
// WatchWorker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WatchOutcome {
    Deployed {
        file: String,
        remote: String,
        fixed: bool,
    },
    Unchanged {
        file: String,
    },
    Skipped {
        path: String,
    },
    Failed {
        file: String,
        error: String,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WatchStats {
    pub deployed: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl WatchStats {
    fn count(&mut self, outcome: &WatchOutcome) {
        match outcome {
            WatchOutcome::Deployed { .. } => self.deployed += 1,
            WatchOutcome::Unchanged { .. } => self.unchanged += 1,
            WatchOutcome::Failed { .. } => self.failed += 1,
            WatchOutcome::Skipped { .. } => {}
        }
    }
}

/// Turns a settled path into at most one upload.
pub struct WatchWorker<C: Connect> {
    deployer: ThemeDeployer<C>,
    fixes: Vec<FixRule>,
    last_upload: HashMap<String, String>,
    secrets: Secrets,
}

impl<C: Connect> WatchWorker<C> {
    pub fn new(deployer: ThemeDeployer<C>, fixes: Vec<FixRule>) -> Self {
        Self {
            deployer,
            fixes,
            last_upload: HashMap::new(),
            secrets: Secrets::default(),
        }
    }

    /// Scrub these secrets from failure messages before they are logged.
    pub fn with_secrets(mut self, secrets: Secrets) -> Self {
        self.secrets = secrets;
        self
    }

    fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(self.deployer.theme_dir()).ok()?;
        let parts: Vec<String> = rel
            .components()
            .filter_map(|c| match c {
                std::path::Component::Normal(p) => Some(p.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        (!parts.is_empty()).then(|| parts.join("/"))
    }

    pub fn process(&mut self, path: &Path) -> WatchOutcome {
        let skipped = || WatchOutcome::Skipped {
            path: path.display().to_string(),
        };
        let Some(rel) = self.relative(path) else {
            return skipped();
        };
        if !path.is_file() {
            // Deleted or renamed away; removals are not mirrored.
            return skipped();
        }
        match self.deploy(path, &rel) {
            Ok(outcome) => outcome,
            Err(e) => WatchOutcome::Failed {
                file: rel,
                error: self.secrets.redact(&e.to_string()),
            },
        }
    }

    fn deploy(&mut self, path: &Path, rel: &str) -> Result<WatchOutcome> {
        let mut data = std::fs::read(path)?;
        let mut fixed = false;
        if let Ok(text) = std::str::from_utf8(&data) {
            if let Some(rewritten) = apply_fixes(path, text, &self.fixes) {
                // Keep the local copy in step with what the server gets.
                crate::io::atomic_write(path, rewritten.as_bytes())?;
                data = rewritten.into_bytes();
                fixed = true;
            }
        }

        let hash = content_hash(&data);
        if self.last_upload.get(rel) == Some(&hash) {
            return Ok(WatchOutcome::Unchanged {
                file: rel.to_string(),
            });
        }

        let remote = self.deployer.upload_content(rel, &data)?;
        self.last_upload.insert(rel.to_string(), hash);
        Ok(WatchOutcome::Deployed {
            file: rel.to_string(),
            remote,
            fixed,
        })
    }
}

// ---------------------------------------------------------------------------
// run_watch
// ---------------------------------------------------------------------------

fn log_outcome(outcome: &WatchOutcome) {
    match outcome {
        WatchOutcome::Deployed {
            file,
            remote,
            fixed,
        } => info!(%file, %remote, fixed, "deployed"),
        WatchOutcome::Unchanged { file } => debug!(%file, "unchanged since last upload"),
        WatchOutcome::Skipped { path } => debug!(%path, "skipped"),
        WatchOutcome::Failed { file, error } => warn!(%file, "deploy failed: {error}"),
    }
}

/// Watch `dir` until `should_stop` returns true or the watcher goes away.
pub fn run_watch<C: Connect>(
    dir: &Path,
    config: &WatchConfig,
    worker: &mut WatchWorker<C>,
    should_stop: impl Fn() -> bool,
) -> Result<WatchStats> {
    let (tx, rx) = mpsc::sync_channel::<PathBuf>(CHANNEL_CAPACITY);
    let ignore = config.ignore.clone();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) => {
                if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    return;
                }
                for path in event.paths {
                    if is_ignored(&path, &ignore) {
                        continue;
                    }
                    // Blocks when the worker falls behind; errors once it has exited.
                    if tx.send(path).is_err() {
                        return;
                    }
                }
            }
            Err(e) => warn!("watch error: {e}"),
        }
    })?;
    watcher.watch(dir, RecursiveMode::Recursive)?;
    info!(dir = %dir.display(), debounce_ms = config.debounce_ms, "watching for changes");

    let mut debouncer = Debouncer::new(config.debounce());
    let mut stats = WatchStats::default();

    while !should_stop() {
        let wait = debouncer
            .next_deadline()
            .map(|d| d.saturating_duration_since(Instant::now()))
            .unwrap_or(IDLE_POLL)
            .min(IDLE_POLL);

        match rx.recv_timeout(wait) {
            Ok(path) => {
                debouncer.record(path, Instant::now());
                // Drain the burst without waiting.
                while let Ok(path) = rx.try_recv() {
                    debouncer.record(path, Instant::now());
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }

        for path in debouncer.due(Instant::now()) {
            let outcome = worker.process(&path);
            log_outcome(&outcome);
            stats.count(&outcome);
        }
    }

    info!(
        deployed = stats.deployed,
        unchanged = stats.unchanged,
        failed = stats.failed,
        "watch stopped"
    );
    Ok(stats)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::{FakeConnector, FakeTransport};
    use tempfile::TempDir;

    fn patterns() -> Vec<String> {
        WatchConfig::default().ignore
    }

    #[test]
    fn ignores_temp_and_vcs_files() {
        assert!(is_ignored(Path::new("theme/.git/index"), &patterns()));
        assert!(is_ignored(Path::new("theme/header.php.swp"), &patterns()));
        assert!(is_ignored(Path::new("theme/style.TMP"), &patterns()));
        assert!(is_ignored(Path::new("a/__pycache__/x.pyc"), &patterns()));
        assert!(!is_ignored(Path::new("theme/header.php"), &patterns()));
        assert!(!is_ignored(Path::new("theme/header.php"), &[String::new()]));
    }

    #[test]
    fn debouncer_waits_for_quiet() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(Duration::from_secs(2));
        d.record(PathBuf::from("a.php"), t0);
        assert!(d.due(t0 + Duration::from_millis(1999)).is_empty());
        assert_eq!(d.due(t0 + Duration::from_secs(2)), vec![PathBuf::from("a.php")]);
        assert!(d.is_empty());
    }

    #[test]
    fn repeated_events_push_deadline_out() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(Duration::from_secs(2));
        d.record(PathBuf::from("a.php"), t0);
        d.record(PathBuf::from("a.php"), t0 + Duration::from_millis(1500));
        assert_eq!(d.len(), 1);
        assert!(d.due(t0 + Duration::from_millis(2500)).is_empty());
        assert_eq!(d.next_deadline(), Some(t0 + Duration::from_millis(3500)));
        assert_eq!(d.due(t0 + Duration::from_millis(3500)).len(), 1);
    }

    #[test]
    fn debouncer_releases_paths_independently() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(Duration::from_secs(1));
        d.record(PathBuf::from("b.css"), t0);
        d.record(PathBuf::from("a.php"), t0 + Duration::from_millis(800));
        assert_eq!(d.due(t0 + Duration::from_secs(1)), vec![PathBuf::from("b.css")]);
        assert_eq!(d.next_deadline(), Some(t0 + Duration::from_millis(1800)));
    }

    fn worker(dir: &Path, transport: FakeTransport) -> WatchWorker<FakeConnector> {
        let connector = FakeConnector {
            transport,
            refuse: false,
        };
        WatchWorker::new(
            ThemeDeployer::new(dir, "/wp-content/themes/youtuneai", connector),
            WatchConfig::default().fixes,
        )
    }

    #[test]
    fn worker_fixes_uploads_and_skips_unchanged() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("header.php");
        std::fs::write(&file, r#"<a href="<?php echo home_url("/admin-dashboard/"); ?>">Admin</a>"#).unwrap();

        let transport = FakeTransport::default();
        let mut w = worker(dir.path(), transport.clone());

        match w.process(&file) {
            WatchOutcome::Deployed { file, remote, fixed } => {
                assert_eq!(file, "header.php");
                assert_eq!(remote, "/wp-content/themes/youtuneai/header.php");
                assert!(fixed);
            }
            other => panic!("unexpected {other:?}"),
        }
        let uploaded = transport
            .uploaded("/wp-content/themes/youtuneai/header.php")
            .unwrap();
        assert!(uploaded.contains(r#"home_url("/admin-dashboard")"#));
        assert_eq!(std::fs::read_to_string(&file).unwrap(), uploaded);

        // The write-back fires another event; same bytes, no second upload.
        assert_eq!(
            w.process(&file),
            WatchOutcome::Unchanged {
                file: "header.php".into()
            }
        );
        assert_eq!(transport.log.borrow().upload_order.len(), 1);
    }

    #[test]
    fn worker_skips_outside_and_deleted() {
        let dir = TempDir::new().unwrap();
        let mut w = worker(dir.path(), FakeTransport::default());
        assert!(matches!(
            w.process(Path::new("/elsewhere/file.php")),
            WatchOutcome::Skipped { .. }
        ));
        assert!(matches!(
            w.process(&dir.path().join("gone.php")),
            WatchOutcome::Skipped { .. }
        ));
    }

    #[test]
    fn worker_reports_failures() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("style.css"), "body{}").unwrap();
        let transport = FakeTransport {
            fail_uploads: vec!["style.css".into()],
            ..Default::default()
        };
        let mut w = worker(dir.path(), transport);
        assert!(matches!(
            w.process(&dir.path().join("style.css")),
            WatchOutcome::Failed { .. }
        ));
    }

    #[test]
    fn worker_failures_hide_secrets() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("style.css"), "body{}").unwrap();
        let transport = FakeTransport {
            fail_uploads: vec!["style.css".into()],
            ..Default::default()
        };
        let secrets = Secrets {
            sftp_password: Some(secrecy::SecretString::new("youtuneai".to_string())),
            ..Default::default()
        };
        let mut w = worker(dir.path(), transport).with_secrets(secrets);
        match w.process(&dir.path().join("style.css")) {
            WatchOutcome::Failed { error, .. } => {
                assert!(error.contains("permission denied"));
                assert!(!error.contains("youtuneai"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn run_watch_returns_when_stopped() {
        let dir = TempDir::new().unwrap();
        let mut w = worker(dir.path(), FakeTransport::default());
        let stats = run_watch(dir.path(), &WatchConfig::default(), &mut w, || true).unwrap();
        assert_eq!(stats.deployed, 0);
    }

    #[test]
    fn hash_is_hex_sha256() {
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
