use crate::error::{Result, SiteError};
use crate::transport::{shell_quote_path, Transport};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

/// Where a plugin comes from and whether the site depends on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginSpec {
    pub download_url: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub purpose: String,
}

fn wordpress_org(slug: &str, required: bool, purpose: &str) -> (String, PluginSpec) {
    (
        slug.to_string(),
        PluginSpec {
            download_url: format!("https://downloads.wordpress.org/plugin/{slug}.latest-stable.zip"),
            required,
            purpose: purpose.to_string(),
        },
    )
}

/// The plugins the dispatcher's REST calls rely on.
pub fn default_plugins() -> BTreeMap<String, PluginSpec> {
    [
        wordpress_org("wp-rest-api-controller", true, "Expose custom post types to REST API"),
        wordpress_org("wp-webhooks", true, "Trigger deployments and WordPress actions"),
        wordpress_org("advanced-custom-fields", true, "Dynamic content creation and meta fields"),
        wordpress_org("woocommerce", true, "E-commerce functionality for add_product"),
        wordpress_org("custom-post-type-ui", true, "Custom content types for bot commands"),
        wordpress_org("code-snippets", true, "Dynamic hooks and PHP logic"),
        wordpress_org("wp-security-audit-log", false, "Monitor AI changes and security"),
    ]
    .into_iter()
    .collect()
}

/// Fetch the plugin archive to `dest_dir/<slug>.zip`.
pub fn download(client: &Client, slug: &str, spec: &PluginSpec, dest_dir: &Path) -> Result<PathBuf> {
    info!(%slug, url = %spec.download_url, "downloading plugin");
    let resp = client.get(&spec.download_url).send()?;
    let status = resp.status().as_u16();
    if status != 200 {
        return Err(SiteError::Http {
            status,
            body: format!("downloading {slug} from {}", spec.download_url),
        });
    }
    let bytes = resp.bytes()?;
    let dest = dest_dir.join(format!("{slug}.zip"));
    crate::io::atomic_write(&dest, &bytes)?;
    Ok(dest)
}

/// Open the archive and count its entries. Empty or unreadable archives fail.
pub fn verify_archive(path: &Path) -> Result<usize> {
    let invalid = |reason: String| SiteError::InvalidArchive {
        path: path.display().to_string(),
        reason,
    };
    let file = File::open(path)?;
    let archive = zip::ZipArchive::new(file).map_err(|e| invalid(e.to_string()))?;
    if archive.is_empty() {
        return Err(invalid("archive has no entries".to_string()));
    }
    Ok(archive.len())
}

/// Upload the archive into `plugins_dir` and unpack it there.
pub fn install<T: Transport + ?Sized>(
    transport: &mut T,
    zip: &Path,
    slug: &str,
    plugins_dir: &str,
) -> Result<()> {
    let dir = plugins_dir.trim_end_matches('/');
    let archive = format!("{slug}.zip");
    transport.ensure_dir(dir)?;
    transport.upload(zip, &format!("{dir}/{archive}"))?;
    let quoted = shell_quote_path(&archive);
    transport.exec_checked(&format!(
        "cd {} && unzip -o {quoted} && rm -f {quoted}",
        shell_quote_path(dir)
    ))?;
    info!(%slug, %dir, "plugin installed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::FakeTransport;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn plugin_zip(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            let opts = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
            for (name, body) in entries {
                writer.start_file(*name, opts).unwrap();
                writer.write_all(body.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn defaults_cover_seven_plugins() {
        let plugins = default_plugins();
        assert_eq!(plugins.len(), 7);
        assert_eq!(plugins.values().filter(|p| p.required).count(), 6);
        assert!(!plugins["wp-security-audit-log"].required);
        assert_eq!(
            plugins["woocommerce"].download_url,
            "https://downloads.wordpress.org/plugin/woocommerce.latest-stable.zip"
        );
    }

    #[test]
    fn download_saves_slug_zip() {
        let mut server = mockito::Server::new();
        let body = plugin_zip(&[("woocommerce/woocommerce.php", "<?php")]);
        let mock = server
            .mock("GET", "/woocommerce.zip")
            .with_status(200)
            .with_body(body.clone())
            .create();
        let spec = PluginSpec {
            download_url: format!("{}/woocommerce.zip", server.url()),
            required: true,
            purpose: String::new(),
        };
        let dir = TempDir::new().unwrap();

        let path = download(&Client::new(), "woocommerce", &spec, dir.path()).unwrap();
        mock.assert();
        assert_eq!(path, dir.path().join("woocommerce.zip"));
        assert_eq!(std::fs::read(&path).unwrap(), body);
        assert_eq!(verify_archive(&path).unwrap(), 1);
    }

    #[test]
    fn download_reports_http_status() {
        let mut server = mockito::Server::new();
        server.mock("GET", "/gone.zip").with_status(404).create();
        let spec = PluginSpec {
            download_url: format!("{}/gone.zip", server.url()),
            required: false,
            purpose: String::new(),
        };
        let dir = TempDir::new().unwrap();
        let err = download(&Client::new(), "gone", &spec, dir.path()).unwrap_err();
        assert!(matches!(err, SiteError::Http { status: 404, .. }));
    }

    #[test]
    fn verify_rejects_garbage_and_empty() {
        let dir = TempDir::new().unwrap();
        let garbage = dir.path().join("bad.zip");
        std::fs::write(&garbage, "<html>not found</html>").unwrap();
        assert!(matches!(verify_archive(&garbage), Err(SiteError::InvalidArchive { .. })));

        let empty = dir.path().join("empty.zip");
        std::fs::write(&empty, plugin_zip(&[])).unwrap();
        let err = verify_archive(&empty).unwrap_err();
        assert!(err.to_string().contains("no entries"));
    }

    #[test]
    fn install_uploads_then_unpacks() {
        let dir = TempDir::new().unwrap();
        let zip = dir.path().join("code-snippets.zip");
        std::fs::write(&zip, plugin_zip(&[("code-snippets/index.php", "<?php")])).unwrap();
        let mut transport = FakeTransport::default();

        install(&mut transport, &zip, "code-snippets", "/wp-content/plugins/").unwrap();

        assert!(transport.uploaded("/wp-content/plugins/code-snippets.zip").is_some());
        assert_eq!(
            transport.commands(),
            vec!["cd /wp-content/plugins && unzip -o code-snippets.zip && rm -f code-snippets.zip"]
        );
    }

    #[test]
    fn failed_unzip_is_an_error() {
        let dir = TempDir::new().unwrap();
        let zip = dir.path().join("woocommerce.zip");
        std::fs::write(&zip, plugin_zip(&[("woocommerce/a.php", "")])).unwrap();
        let mut transport = FakeTransport {
            exit_codes: vec![("unzip".into(), 9)],
            ..Default::default()
        };
        let err = install(&mut transport, &zip, "woocommerce", "/wp-content/plugins").unwrap_err();
        assert!(matches!(err, SiteError::RemoteCommand { status: 9, .. }));
    }
}
