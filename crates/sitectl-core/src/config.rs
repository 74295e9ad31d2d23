use crate::audit::AuditConfig;
use crate::deploy::FixRule;
use crate::error::{Result, SiteError};
use crate::paths;
use crate::plugins::{default_plugins, PluginSpec};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// SiteConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    pub url: String,
}

// ---------------------------------------------------------------------------
// WordPressConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordPressConfig {
    /// User the Application Password belongs to.
    pub user: String,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
    /// Extra attempts for idempotent requests that fail transiently.
    #[serde(default = "default_retries")]
    pub retries: u32,
}

fn default_http_timeout() -> u64 {
    15
}

fn default_retries() -> u32 {
    2
}

impl Default for WordPressConfig {
    fn default() -> Self {
        Self {
            user: "admin".to_string(),
            timeout_secs: default_http_timeout(),
            retries: default_retries(),
        }
    }
}

impl WordPressConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// SftpConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SftpConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    /// Private key used instead of `SITECTL_SFTP_PASSWORD` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_path: Option<String>,
    /// Hex SHA-256 of the server host key. Unset means trust on first use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_fingerprint: Option<String>,
    /// Remote theme directory that `theme.local_dir` mirrors.
    #[serde(default = "default_remote_path")]
    pub remote_path: String,
    /// Remote document root backed up before a release.
    #[serde(default = "default_deployment_path")]
    pub deployment_path: String,
    #[serde(default = "default_plugins_path")]
    pub plugins_path: String,
    #[serde(default = "default_backup_retention")]
    pub backup_retention_days: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_remote_path() -> String {
    "/wp-content/themes/youtuneai".to_string()
}

fn default_deployment_path() -> String {
    "~/public_html".to_string()
}

fn default_plugins_path() -> String {
    "/wp-content/plugins".to_string()
}

fn default_backup_retention() -> u32 {
    30
}

fn default_connect_timeout() -> u64 {
    30
}

impl Default for SftpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_ssh_port(),
            user: String::new(),
            key_path: None,
            host_fingerprint: None,
            remote_path: default_remote_path(),
            deployment_path: default_deployment_path(),
            plugins_path: default_plugins_path(),
            backup_retention_days: default_backup_retention(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl SftpConfig {
    /// Theme directory inside the document root, where a release uploads so
    /// the backup and rollback of `deployment_path` cover it. `remote_path`
    /// is read relative to `deployment_path` unless it already lives there.
    pub fn release_theme_path(&self) -> String {
        let root = self.deployment_path.trim_end_matches('/');
        match self.remote_path.strip_prefix(root) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => {
                self.remote_path.trim_end_matches('/').to_string()
            }
            _ => {
                let rel = self.remote_path.trim_start_matches('~').trim_matches('/');
                if rel.is_empty() {
                    root.to_string()
                } else {
                    format!("{root}/{rel}")
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ThemeConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeConfig {
    /// Local theme checkout, relative to the project root.
    #[serde(default = "default_theme_dir")]
    pub local_dir: String,
    /// Files uploaded by a bare `deploy`.
    #[serde(default = "default_deploy_files")]
    pub deploy_files: Vec<String>,
    /// Files that must exist under `sftp.deployment_path` after a release.
    #[serde(default = "default_critical_files")]
    pub critical_files: Vec<String>,
}

fn default_theme_dir() -> String {
    "wp-theme-youtuneai".to_string()
}

fn default_deploy_files() -> Vec<String> {
    [
        "style.css",
        "functions.php",
        "header.php",
        "footer.php",
        "index.php",
        "page-home.php",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_critical_files() -> Vec<String> {
    vec!["index.php".to_string(), "wp-config.php".to_string()]
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            local_dir: default_theme_dir(),
            deploy_files: default_deploy_files(),
            critical_files: default_critical_files(),
        }
    }
}

// ---------------------------------------------------------------------------
// AiConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_ai_base_url")]
    pub base_url: String,
    #[serde(default = "default_ai_model")]
    pub model: String,
    #[serde(default = "default_ai_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_ai_temperature")]
    pub temperature: f32,
}

fn default_ai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_ai_model() -> String {
    "gpt-4".to_string()
}

fn default_ai_max_tokens() -> u32 {
    500
}

fn default_ai_temperature() -> f32 {
    0.3
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: default_ai_base_url(),
            model: default_ai_model(),
            max_tokens: default_ai_max_tokens(),
            temperature: default_ai_temperature(),
        }
    }
}

// ---------------------------------------------------------------------------
// WatchConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Case-insensitive substrings; matching paths are never deployed.
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
    /// Text rewrites applied to a file before it is uploaded.
    #[serde(default = "default_fixes")]
    pub fixes: Vec<FixRule>,
}

fn default_debounce_ms() -> u64 {
    2000
}

fn default_ignore() -> Vec<String> {
    [".tmp", ".swp", ".git", "__pycache__"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_fixes() -> Vec<FixRule> {
    vec![FixRule {
        extension: Some("php".to_string()),
        find: r#"<?php echo home_url("/admin-dashboard/"); ?>"#.to_string(),
        replace: r#"<?php echo home_url("/admin-dashboard"); ?>"#.to_string(),
    }]
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            ignore: default_ignore(),
            fixes: default_fixes(),
        }
    }
}

impl WatchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub site: SiteConfig,
    #[serde(default)]
    pub wordpress: WordPressConfig,
    #[serde(default)]
    pub sftp: SftpConfig,
    #[serde(default)]
    pub theme: ThemeConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default = "default_plugins")]
    pub plugins: BTreeMap<String, PluginSpec>,
    #[serde(default)]
    pub audit: AuditConfig,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            version: 1,
            site: SiteConfig {
                name: name.into(),
                url: url.into(),
            },
            wordpress: WordPressConfig::default(),
            sftp: SftpConfig::default(),
            theme: ThemeConfig::default(),
            ai: AiConfig::default(),
            watch: WatchConfig::default(),
            plugins: default_plugins(),
            audit: AuditConfig::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(SiteError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    /// Site URL without a trailing slash.
    pub fn site_url(&self) -> &str {
        self.site.url.trim_end_matches('/')
    }

    pub fn theme_dir(&self, root: &Path) -> std::path::PathBuf {
        root.join(&self.theme.local_dir)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut warn = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message })
        };

        if !(self.site.url.starts_with("https://") || self.site.url.starts_with("http://")) {
            warn(
                WarnLevel::Error,
                format!("site.url '{}' must start with http:// or https://", self.site.url),
            );
        } else if self.site.url.starts_with("http://") {
            warn(
                WarnLevel::Warning,
                "site.url uses plain http; Application Passwords travel in the clear".to_string(),
            );
        }

        if self.sftp.host.trim().is_empty() {
            warn(
                WarnLevel::Warning,
                "sftp.host is empty; deploy and watch will fail".to_string(),
            );
        }
        if self.sftp.user.trim().is_empty() {
            warn(
                WarnLevel::Warning,
                "sftp.user is empty; deploy and watch will fail".to_string(),
            );
        }

        if self.sftp.remote_path.split('/').any(|p| p == "..") {
            warn(
                WarnLevel::Error,
                format!(
                    "sftp.remote_path '{}' must stay inside sftp.deployment_path",
                    self.sftp.remote_path
                ),
            );
        } else if self.sftp.remote_path.starts_with('~')
            && !self.sftp.remote_path.starts_with(self.sftp.deployment_path.trim_end_matches('/'))
        {
            warn(
                WarnLevel::Error,
                format!(
                    "sftp.remote_path '{}' is outside sftp.deployment_path '{}'",
                    self.sftp.remote_path, self.sftp.deployment_path
                ),
            );
        }

        if let Some(fp) = &self.sftp.host_fingerprint {
            if crate::transport::parse_fingerprint(fp).is_none() {
                warn(
                    WarnLevel::Error,
                    format!(
                        "sftp.host_fingerprint '{fp}' is neither 64 hex digits nor SHA256:<base64>"
                    ),
                );
            }
        }

        for file in &self.theme.deploy_files {
            if Path::new(file).is_absolute() || file.split(['/', '\\']).any(|p| p == "..") {
                warn(
                    WarnLevel::Error,
                    format!("theme.deploy_files entry '{file}' must be relative to the theme directory"),
                );
            }
        }

        if self.watch.debounce_ms < 100 {
            warn(
                WarnLevel::Warning,
                format!(
                    "watch.debounce_ms={} is very low; editors emit several events per save",
                    self.watch.debounce_ms
                ),
            );
        }

        for (i, fix) in self.watch.fixes.iter().enumerate() {
            if fix.find.is_empty() {
                warn(
                    WarnLevel::Error,
                    format!("watch.fixes[{i}] has an empty 'find' string"),
                );
            }
        }

        for (slug, plugin) in &self.plugins {
            if !plugin.download_url.starts_with("https://") {
                warn(
                    WarnLevel::Warning,
                    format!("plugin '{slug}' download_url is not https"),
                );
            }
        }

        if !(0.0..=2.0).contains(&self.ai.temperature) {
            warn(
                WarnLevel::Error,
                format!("ai.temperature={} is outside 0.0..=2.0", self.ai.temperature),
            );
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

pub const ENV_WP_APP_PASSWORD: &str = "SITECTL_WP_APP_PASSWORD";
pub const ENV_SFTP_PASSWORD: &str = "SITECTL_SFTP_PASSWORD";
pub const ENV_WEBHOOK_SECRET: &str = "SITECTL_WEBHOOK_SECRET";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

const REDACTED: &str = "***REDACTED***";

/// Credentials read from the environment. Never serialized.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub wp_app_password: Option<SecretString>,
    pub sftp_password: Option<SecretString>,
    pub webhook_secret: Option<SecretString>,
    pub openai_api_key: Option<SecretString>,
}

impl Secrets {
    pub fn from_env() -> Self {
        fn var(name: &str) -> Option<SecretString> {
            std::env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::new)
        }
        Self {
            wp_app_password: var(ENV_WP_APP_PASSWORD),
            sftp_password: var(ENV_SFTP_PASSWORD),
            webhook_secret: var(ENV_WEBHOOK_SECRET),
            openai_api_key: var(ENV_OPENAI_API_KEY),
        }
    }

    pub fn require_sftp_password(&self) -> Result<&SecretString> {
        self.sftp_password
            .as_ref()
            .ok_or_else(|| SiteError::MissingSetting(format!("{ENV_SFTP_PASSWORD} is not set")))
    }

    pub fn require_openai_api_key(&self) -> Result<&SecretString> {
        self.openai_api_key
            .as_ref()
            .ok_or_else(|| SiteError::MissingSetting(format!("{ENV_OPENAI_API_KEY} is not set")))
    }

    /// Replace every configured secret value in `text`.
    pub fn redact(&self, text: &str) -> String {
        let mut out = text.to_string();
        for secret in [
            &self.wp_app_password,
            &self.sftp_password,
            &self.webhook_secret,
            &self.openai_api_key,
        ]
        .into_iter()
        .flatten()
        {
            let value = secret.expose_secret();
            if !value.is_empty() {
                out = out.replace(value.as_str(), REDACTED);
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::new("youtuneai", "https://youtuneai.com");
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.site.name, "youtuneai");
        assert_eq!(parsed.version, 1);
        assert_eq!(parsed.theme.deploy_files.len(), 6);
        assert_eq!(parsed.plugins.len(), 7);
    }

    #[test]
    fn minimal_yaml_fills_defaults() {
        let yaml = "site:\n  name: demo\n  url: https://example.com/\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.site_url(), "https://example.com");
        assert_eq!(cfg.sftp.port, 22);
        assert_eq!(cfg.sftp.remote_path, "/wp-content/themes/youtuneai");
        assert_eq!(cfg.watch.debounce_ms, 2000);
        assert_eq!(cfg.ai.model, "gpt-4");
        assert_eq!(cfg.wordpress.retries, 2);
        assert!(cfg.plugins.contains_key("woocommerce"));
    }

    #[test]
    fn load_without_init_errors() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(SiteError::NotInitialized)
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::new("demo", "https://example.com");
        cfg.sftp.host = "sftp.example.com".to_string();
        cfg.save(dir.path()).unwrap();
        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.sftp.host, "sftp.example.com");
    }

    #[test]
    fn validate_flags_bad_values() {
        let mut cfg = Config::new("demo", "ftp://example.com");
        cfg.theme.deploy_files.push("../wp-config.php".to_string());
        cfg.watch.debounce_ms = 10;
        cfg.ai.temperature = 3.0;
        let warnings = cfg.validate();
        let errors: Vec<_> = warnings
            .iter()
            .filter(|w| w.level == WarnLevel::Error)
            .map(|w| w.message.as_str())
            .collect();
        assert!(errors.iter().any(|m| m.contains("site.url")));
        assert!(errors.iter().any(|m| m.contains("../wp-config.php")));
        assert!(errors.iter().any(|m| m.contains("ai.temperature")));
        assert!(warnings.iter().any(|w| w.message.contains("debounce_ms")));
    }

    #[test]
    fn validate_complete_config_has_no_errors() {
        let mut cfg = Config::new("demo", "https://example.com");
        cfg.sftp.host = "sftp.example.com".to_string();
        cfg.sftp.user = "deploy".to_string();
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn release_theme_path_lands_under_deployment_root() {
        let mut sftp = SftpConfig::default();
        assert_eq!(sftp.release_theme_path(), "~/public_html/wp-content/themes/youtuneai");

        sftp.remote_path = "~/public_html/wp-content/themes/demo/".to_string();
        assert_eq!(sftp.release_theme_path(), "~/public_html/wp-content/themes/demo");

        sftp.deployment_path = "/var/www/html/".to_string();
        sftp.remote_path = "wp-content/themes/demo".to_string();
        assert_eq!(sftp.release_theme_path(), "/var/www/html/wp-content/themes/demo");
    }

    #[test]
    fn validate_rejects_theme_outside_deployment_root() {
        let mut cfg = Config::new("demo", "https://example.com");
        cfg.sftp.remote_path = "/wp-content/../../etc".to_string();
        assert!(cfg
            .validate()
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("sftp.remote_path")));

        cfg.sftp.remote_path = "~/other_site/wp-content/themes/demo".to_string();
        assert!(cfg
            .validate()
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("outside")));
    }

    #[test]
    fn validate_checks_fingerprint_format() {
        let mut cfg = Config::new("demo", "https://example.com");
        cfg.sftp.host_fingerprint = Some("SHA256:short".to_string());
        assert!(cfg
            .validate()
            .iter()
            .any(|w| w.message.contains("sftp.host_fingerprint")));

        cfg.sftp.host_fingerprint = Some("ab".repeat(32));
        assert!(!cfg
            .validate()
            .iter()
            .any(|w| w.message.contains("sftp.host_fingerprint")));
    }

    #[test]
    fn redact_scrubs_every_secret() {
        let secrets = Secrets {
            wp_app_password: Some(SecretString::new("abcd efgh".to_string())),
            sftp_password: Some(SecretString::new("hunter2".to_string())),
            ..Default::default()
        };
        let msg = "auth failed for deploy:hunter2 with key abcd efgh";
        let out = secrets.redact(msg);
        assert!(!out.contains("hunter2"));
        assert!(!out.contains("abcd efgh"));
        assert_eq!(out.matches(REDACTED).count(), 2);
    }

    #[test]
    fn missing_secret_names_variable() {
        let err = Secrets::default().require_sftp_password().unwrap_err();
        assert!(err.to_string().contains(ENV_SFTP_PASSWORD));
    }
}
