use anyhow::Context;
use sitectl_core::{config::Config, io, paths};
use std::path::Path;

/// Entries kept out of version control.
const GITIGNORE_ENTRIES: &[&str] = &[
    paths::HISTORY_FILE,
    paths::REPORTS_DIR,
    paths::PLUGINS_CACHE_DIR,
    "secrets.env",
    ".env",
];

pub fn run(root: &Path, site_url: &str, force: bool) -> anyhow::Result<()> {
    let site_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "site".to_string());

    println!("Initializing sitectl in: {}", root.display());

    for dir in [paths::SITECTL_DIR, paths::REPORTS_DIR] {
        let p = root.join(dir);
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    let config_path = paths::config_path(root);
    if config_path.exists() && !force {
        println!("  exists:  {}", paths::CONFIG_FILE);
    } else {
        let cfg = Config::new(&site_name, site_url);
        cfg.save(root).context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
    }

    for entry in GITIGNORE_ENTRIES {
        io::ensure_gitignore_entry(root, entry).context("failed to update .gitignore")?;
    }

    println!("\nNext steps:");
    println!("  1. Fill in sftp.host / sftp.user in {}", paths::CONFIG_FILE);
    println!("  2. Put SITECTL_WP_APP_PASSWORD and SITECTL_SFTP_PASSWORD in secrets.env");
    println!("  3. Run `sitectl config validate`");
    Ok(())
}
