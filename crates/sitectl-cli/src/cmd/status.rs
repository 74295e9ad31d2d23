use super::load_config;
use crate::output::{print_json, print_table};
use anyhow::Context;
use sitectl_core::config::Secrets;
use sitectl_core::transport::{check_remote, SshConnector};
use sitectl_core::wp::WpClient;
use std::path::Path;

fn client(root: &Path) -> anyhow::Result<WpClient> {
    let config = load_config(root)?;
    let secrets = Secrets::from_env();
    WpClient::from_config(&config, &secrets).context("failed to build REST client")
}

pub fn run(root: &Path, sftp: bool, json: bool) -> anyhow::Result<()> {
    let wp = client(root)?;
    let mut status = wp.site_status();

    if sftp {
        let config = load_config(root)?;
        let secrets = Secrets::from_env();
        let connector = SshConnector::new(config.sftp.clone(), secrets.clone());
        let check = check_remote(&connector, &config.sftp.remote_path);
        let outcome = match (&check.error, check.entries) {
            (None, Some(n)) => Ok(format!("available ({n} entries in {})", check.remote_path)),
            (Some(e), _) => Err(secrets.redact(e)),
            (None, None) => Err("no listing".to_string()),
        };
        status.record("sftp", outcome);
    }

    if json {
        print_json(&status)?;
        return Ok(());
    }

    println!("Site: {}", wp.site_url());
    let rows = status
        .details
        .iter()
        .map(|(name, detail)| vec![name.clone(), detail.clone()])
        .collect();
    print_table(&["ENDPOINT", "STATUS"], rows);
    println!(
        "\n{}/{} endpoints available ({:.1}%)",
        status.available, status.tested, status.success_rate
    );
    Ok(())
}

pub fn whoami(root: &Path, json: bool) -> anyhow::Result<()> {
    let wp = client(root)?;
    let user = wp
        .current_user()
        .context("authentication check failed")?;
    if json {
        print_json(&user)?;
    } else {
        println!("Authenticated as {} (id {}, {})", user.name, user.id, user.slug);
    }
    Ok(())
}
