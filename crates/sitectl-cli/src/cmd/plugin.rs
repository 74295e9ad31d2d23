use super::load_config;
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use sitectl_core::config::Secrets;
use sitectl_core::transport::SshTransport;
use sitectl_core::{io, paths, plugins, SiteError};
use std::path::Path;

#[derive(Subcommand)]
pub enum PluginSubcommand {
    /// List the plugins in the registry
    List,

    /// Download, verify and install plugins on the server
    Install {
        /// Plugin slugs from the registry
        slugs: Vec<String>,

        /// Install every plugin marked as required
        #[arg(long)]
        required: bool,
    },
}

pub fn run(root: &Path, subcmd: PluginSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        PluginSubcommand::List => list(root, json),
        PluginSubcommand::Install { slugs, required } => install(root, slugs, required, json),
    }
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = load_config(root)?;
    if json {
        print_json(&config.plugins)?;
        return Ok(());
    }
    let rows = config
        .plugins
        .iter()
        .map(|(slug, spec)| {
            vec![
                slug.clone(),
                if spec.required { "yes" } else { "no" }.to_string(),
                spec.purpose.clone(),
            ]
        })
        .collect();
    print_table(&["SLUG", "REQUIRED", "PURPOSE"], rows);
    Ok(())
}

fn install(root: &Path, slugs: Vec<String>, required: bool, json: bool) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let mut selected = slugs;
    if required {
        for (slug, spec) in &config.plugins {
            if spec.required && !selected.contains(slug) {
                selected.push(slug.clone());
            }
        }
    }
    if selected.is_empty() {
        anyhow::bail!("name at least one plugin slug, or pass --required");
    }
    for slug in &selected {
        if !config.plugins.contains_key(slug) {
            return Err(SiteError::UnknownPlugin(slug.clone()).into());
        }
    }

    let cache = paths::plugins_cache_dir(root);
    io::ensure_dir(&cache)?;
    let http = reqwest::blocking::Client::builder()
        .timeout(config.wordpress.timeout())
        .build()?;

    let secrets = Secrets::from_env();
    let mut transport =
        SshTransport::connect(&config.sftp, &secrets).context("failed to connect to server")?;

    let mut results = Vec::new();
    for slug in &selected {
        let spec = &config.plugins[slug];
        let outcome = plugins::download(&http, slug, spec, &cache)
            .and_then(|zip| {
                let entries = plugins::verify_archive(&zip)?;
                plugins::install(&mut transport, &zip, slug, &config.sftp.plugins_path)?;
                Ok(entries)
            });
        match outcome {
            Ok(entries) => {
                if !json {
                    println!("  installed: {slug} ({entries} files)");
                }
                results.push(serde_json::json!({ "slug": slug, "installed": true, "files": entries }));
            }
            Err(e) => {
                if !json {
                    println!("  failed:    {slug}: {e}");
                }
                results.push(serde_json::json!({ "slug": slug, "installed": false, "error": e.to_string() }));
            }
        }
    }

    if json {
        print_json(&results)?;
    }
    let failed = results.iter().filter(|r| r["installed"] == false).count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} plugins failed to install", selected.len());
    }
    Ok(())
}
