use crate::error::Result;
use crate::paths;
use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// AuditConfig
// ---------------------------------------------------------------------------

/// Which pages to fetch and which notice groups each must mention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_pages")]
    pub pages: Vec<String>,
    #[serde(default = "default_notices")]
    pub notices: BTreeMap<String, Vec<String>>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            pages: default_pages(),
            notices: default_notices(),
        }
    }
}

fn default_pages() -> Vec<String> {
    ["/", "/terms-of-service", "/privacy-policy", "/legal-notice"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_notices() -> BTreeMap<String, Vec<String>> {
    let group = |name: &str, patterns: &[&str]| {
        (
            name.to_string(),
            patterns.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
        )
    };
    [
        group("copyright", &["3000Studios", "YouTuneAI", "©", "Copyright"]),
        group(
            "patent_notices",
            &["Patent Pending", "US Patent", "Patent Application", "Intellectual Property"],
        ),
        group("trademark", &["™", "®", "YouTuneAI™", "3000Studios®"]),
        group(
            "legal_disclaimers",
            &["Terms of Service", "Privacy Policy", "Legal Notice", "Disclaimer"],
        ),
        group("attribution", &["3000Studios", "Licensed under", "All rights reserved"]),
    ]
    .into_iter()
    .collect()
}

// ---------------------------------------------------------------------------
// Notice checks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoticeCheck {
    pub group: String,
    pub found: Vec<String>,
    pub missing: Vec<String>,
    /// At least one pattern of the group is present.
    pub compliant: bool,
    /// Fraction of the group's patterns present, 0.0..=1.0.
    pub coverage: f64,
}

/// Case-insensitive presence check of each pattern in `content`.
pub fn check_notices(content: &str, group: &str, patterns: &[String]) -> NoticeCheck {
    let haystack = content.to_lowercase();
    let (found, missing): (Vec<String>, Vec<String>) = patterns
        .iter()
        .cloned()
        .partition(|p| haystack.contains(&p.to_lowercase()));
    let coverage = if patterns.is_empty() {
        0.0
    } else {
        found.len() as f64 / patterns.len() as f64
    };
    NoticeCheck {
        group: group.to_string(),
        compliant: !found.is_empty(),
        found,
        missing,
        coverage,
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageAudit {
    pub path: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub checks: Vec<NoticeCheck>,
    pub compliant: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSummary {
    pub total: usize,
    pub passed: usize,
    pub compliance_percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub site_url: String,
    pub timestamp: DateTime<Utc>,
    pub pages: Vec<PageAudit>,
    pub overall_compliance: bool,
    pub recommendations: Vec<String>,
    pub summary: AuditSummary,
}

impl AuditReport {
    pub fn save(&self, root: &Path) -> Result<PathBuf> {
        let path = paths::report_path(root, "audit", &self.timestamp);
        let data = serde_json::to_string_pretty(self)?;
        crate::io::atomic_write(&path, data.as_bytes())?;
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Auditor
// ---------------------------------------------------------------------------

pub struct Auditor {
    http: Client,
    site_url: String,
}

impl Auditor {
    pub fn new(site_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sitectl/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            site_url: site_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn fetch(&self, url: &str) -> std::result::Result<(u16, String), (Option<u16>, String)> {
        let resp = self.http.get(url).send().map_err(|e| (None, e.to_string()))?;
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            return Err((Some(status), format!("HTTP {status}")));
        }
        let body = resp.text().map_err(|e| (Some(status), e.to_string()))?;
        Ok((status, body))
    }

    fn audit_page(&self, path: &str, config: &AuditConfig) -> PageAudit {
        let url = format!("{}{}", self.site_url, path);
        match self.fetch(&url) {
            Ok((status, body)) => {
                let checks: Vec<NoticeCheck> = config
                    .notices
                    .iter()
                    .map(|(group, patterns)| check_notices(&body, group, patterns))
                    .collect();
                let compliant = checks.iter().all(|c| c.compliant);
                info!(%path, compliant, "page audited");
                PageAudit {
                    path: path.to_string(),
                    url,
                    status: Some(status),
                    error: None,
                    checks,
                    compliant,
                }
            }
            Err((status, error)) => {
                warn!(%path, "page could not be fetched: {error}");
                PageAudit {
                    path: path.to_string(),
                    url,
                    status,
                    error: Some(error),
                    checks: Vec::new(),
                    compliant: false,
                }
            }
        }
    }

    /// Fetch every configured page and check it against every notice group.
    pub fn run(&self, config: &AuditConfig) -> AuditReport {
        let pages: Vec<PageAudit> = config
            .pages
            .iter()
            .map(|p| self.audit_page(p, config))
            .collect();

        let mut recommendations = Vec::new();
        for page in &pages {
            if let Some(error) = &page.error {
                recommendations.push(format!("Publish {} ({error})", page.path));
                continue;
            }
            for check in page.checks.iter().filter(|c| !c.compliant) {
                recommendations.push(format!(
                    "Add {} notices to {} (any of: {})",
                    check.group,
                    page.path,
                    check.missing.join(", ")
                ));
            }
        }

        let total = pages.len();
        let passed = pages.iter().filter(|p| p.compliant).count();
        let compliance_percentage = if total == 0 {
            0.0
        } else {
            passed as f64 / total as f64 * 100.0
        };
        AuditReport {
            site_url: self.site_url.clone(),
            timestamp: Utc::now(),
            overall_compliance: total > 0 && passed == total,
            pages,
            recommendations,
            summary: AuditSummary {
                total,
                passed,
                compliance_percentage,
            },
        }
    }
}
