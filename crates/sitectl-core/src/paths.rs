use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const SITECTL_DIR: &str = ".sitectl";
pub const REPORTS_DIR: &str = ".sitectl/reports";
pub const PLUGINS_CACHE_DIR: &str = ".sitectl/plugins";

pub const CONFIG_FILE: &str = ".sitectl/config.yaml";
pub const HISTORY_FILE: &str = ".sitectl/history.jsonl";

/// Env files loaded at startup, in order. Earlier files win.
pub const ENV_FILES: &[&str] = &["secrets.env", ".env"];

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn history_path(root: &Path) -> PathBuf {
    root.join(HISTORY_FILE)
}

pub fn reports_dir(root: &Path) -> PathBuf {
    root.join(REPORTS_DIR)
}

pub fn plugins_cache_dir(root: &Path) -> PathBuf {
    root.join(PLUGINS_CACHE_DIR)
}

/// `reports/<kind>-<YYYYmmdd_HHMMSS>.json`
pub fn report_path(root: &Path, kind: &str, stamp: &chrono::DateTime<chrono::Utc>) -> PathBuf {
    reports_dir(root).join(format!("{kind}-{}.json", stamp.format("%Y%m%d_%H%M%S")))
}

/// Join a theme-relative path onto a remote root using forward slashes,
/// whatever the local separator is.
pub fn remote_join(remote_root: &str, rel: &Path) -> String {
    let mut out = remote_root.trim_end_matches('/').to_string();
    for part in rel.components() {
        if let std::path::Component::Normal(p) = part {
            out.push('/');
            out.push_str(&p.to_string_lossy());
        }
    }
    out
}

/// Parent directory of a remote path, or `None` at the root.
pub fn remote_parent(remote: &str) -> Option<&str> {
    let trimmed = remote.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => None,
        Some(i) => Some(&trimmed[..i]),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
