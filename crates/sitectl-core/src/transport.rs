use crate::config::{Secrets, SftpConfig};
use crate::error::{Result, SiteError};
use base64::prelude::*;
use secrecy::ExposeSecret;
use serde::Serialize;
use ssh2::{HashType, Session, Sftp};
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// File upload and command execution on the web host.
pub trait Transport {
    fn upload_bytes(&mut self, data: &[u8], remote: &str) -> Result<()>;

    fn exec(&mut self, command: &str) -> Result<ExecOutput>;

    /// Create `remote` and any missing parents.
    fn ensure_dir(&mut self, remote: &str) -> Result<()>;

    /// Names of the entries directly inside `remote`.
    fn list_dir(&mut self, remote: &str) -> Result<Vec<String>>;

    fn upload(&mut self, local: &Path, remote: &str) -> Result<()> {
        let data = std::fs::read(local)?;
        self.upload_bytes(&data, remote)
    }

    /// Like [`Transport::exec`] but a non-zero exit is an error.
    fn exec_checked(&mut self, command: &str) -> Result<ExecOutput> {
        let out = self.exec(command)?;
        if !out.success() {
            return Err(SiteError::RemoteCommand {
                command: command.to_string(),
                status: out.status,
                stderr: out.stderr.trim().to_string(),
            });
        }
        Ok(out)
    }
}

/// Opens transports on demand.
pub trait Connect {
    type Transport: Transport;

    fn connect(&self) -> Result<Self::Transport>;
}

// ---------------------------------------------------------------------------
// Shell quoting
// ---------------------------------------------------------------------------

/// Single-quote `s` for a POSIX shell.
pub fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | '+' | ':' | '@' | '='))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Quote a remote path, leaving a leading `~/` outside the quotes so the
/// shell still expands it.
pub fn shell_quote_path(path: &str) -> String {
    match path.strip_prefix("~/") {
        Some(rest) if !rest.is_empty() => format!("~/{}", shell_quote(rest)),
        Some(_) => "~".to_string(),
        None if path == "~" => "~".to_string(),
        None => shell_quote(path),
    }
}

// ---------------------------------------------------------------------------
// SshTransport
// ---------------------------------------------------------------------------

pub struct SshTransport {
    session: Session,
    sftp: Sftp,
}

/// Decode a pinned host key fingerprint into the raw SHA-256 digest.
/// Accepts hex (colons optional) or OpenSSH's `SHA256:<base64>` as printed
/// by `ssh-keygen -lf`.
pub fn parse_fingerprint(fp: &str) -> Option<Vec<u8>> {
    let fp = fp.trim();
    let rest = fp.strip_prefix("SHA256:").unwrap_or(fp);
    let hex_form: String = rest.chars().filter(|c| *c != ':').collect();
    let bytes = if hex_form.len() == 64 && hex_form.chars().all(|c| c.is_ascii_hexdigit()) {
        hex::decode(&hex_form).ok()?
    } else if fp.starts_with("SHA256:") {
        BASE64_STANDARD_NO_PAD
            .decode(rest.trim_end_matches('='))
            .ok()?
    } else {
        return None;
    };
    (bytes.len() == 32).then_some(bytes)
}

impl SshTransport {
    pub fn connect(cfg: &SftpConfig, secrets: &Secrets) -> Result<Self> {
        if cfg.host.trim().is_empty() {
            return Err(SiteError::MissingSetting("sftp.host".to_string()));
        }
        if cfg.user.trim().is_empty() {
            return Err(SiteError::MissingSetting("sftp.user".to_string()));
        }

        let timeout = Duration::from_secs(cfg.connect_timeout_secs);
        let addr = (cfg.host.as_str(), cfg.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| SiteError::InvalidConfig(format!("sftp.host '{}' did not resolve", cfg.host)))?;
        debug!(host = %cfg.host, port = cfg.port, "connecting");
        let tcp = TcpStream::connect_timeout(&addr, timeout)?;

        let mut session = Session::new()?;
        session.set_tcp_stream(tcp);
        session.set_timeout(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
        session.handshake()?;

        let hash = session
            .host_key_hash(HashType::Sha256)
            .map(<[u8]>::to_vec)
            .unwrap_or_default();
        let actual = hex::encode(&hash);
        match &cfg.host_fingerprint {
            Some(expected) if parse_fingerprint(expected).as_deref() != Some(hash.as_slice()) => {
                return Err(SiteError::HostKeyMismatch {
                    host: cfg.host.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
            Some(_) => debug!("host key fingerprint verified"),
            None => warn!(
                host = %cfg.host,
                fingerprint = %actual,
                "host key not pinned; set sftp.host_fingerprint to verify it"
            ),
        }

        match &cfg.key_path {
            Some(key) => {
                let passphrase = secrets.sftp_password.as_ref().map(|p| p.expose_secret().as_str());
                session.userauth_pubkey_file(&cfg.user, None, Path::new(key), passphrase)?;
            }
            None => {
                let password = secrets.require_sftp_password()?;
                session.userauth_password(&cfg.user, password.expose_secret())?;
            }
        }
        if !session.authenticated() {
            return Err(SiteError::InvalidConfig(format!(
                "SSH authentication failed for {}@{}",
                cfg.user, cfg.host
            )));
        }

        let sftp = session.sftp()?;
        info!(host = %cfg.host, user = %cfg.user, "SSH session established");
        Ok(Self { session, sftp })
    }
}

/// SFTP does no tilde expansion; relative paths already start at the
/// login directory.
fn sftp_path(remote: &str) -> &str {
    match remote {
        "~" => ".",
        _ => remote.strip_prefix("~/").unwrap_or(remote),
    }
}

impl Transport for SshTransport {
    fn upload_bytes(&mut self, data: &[u8], remote: &str) -> Result<()> {
        let mut file = self.sftp.create(Path::new(sftp_path(remote)))?;
        file.write_all(data)?;
        debug!(%remote, bytes = data.len(), "uploaded");
        Ok(())
    }

    fn exec(&mut self, command: &str) -> Result<ExecOutput> {
        let mut channel = self.session.channel_session()?;
        channel.exec(command)?;
        let mut stdout = String::new();
        channel.read_to_string(&mut stdout)?;
        let mut stderr = String::new();
        channel.stderr().read_to_string(&mut stderr)?;
        channel.wait_close()?;
        let status = channel.exit_status()?;
        debug!(%command, status, "remote command finished");
        Ok(ExecOutput {
            status,
            stdout,
            stderr,
        })
    }

    fn ensure_dir(&mut self, remote: &str) -> Result<()> {
        let remote = sftp_path(remote);
        let mut current = String::new();
        for part in remote.split('/').filter(|p| !p.is_empty()) {
            if current.is_empty() && !remote.starts_with('/') {
                current.push_str(part);
            } else {
                current.push('/');
                current.push_str(part);
            }
            let path = Path::new(&current);
            if self.sftp.stat(path).is_ok() {
                continue;
            }
            if let Err(e) = self.sftp.mkdir(path, 0o755) {
                // Lost a race with another writer.
                if self.sftp.stat(path).is_err() {
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    fn list_dir(&mut self, remote: &str) -> Result<Vec<String>> {
        let entries = self.sftp.readdir(Path::new(sftp_path(remote)))?;
        Ok(entries
            .into_iter()
            .filter_map(|(path, _)| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect())
    }
}

/// Connects with the project's SFTP settings.
pub struct SshConnector {
    config: SftpConfig,
    secrets: Secrets,
}

impl SshConnector {
    pub fn new(config: SftpConfig, secrets: Secrets) -> Self {
        Self { config, secrets }
    }
}

impl Connect for SshConnector {
    type Transport = SshTransport;

    fn connect(&self) -> Result<SshTransport> {
        SshTransport::connect(&self.config, &self.secrets)
    }
}

// ---------------------------------------------------------------------------
// Remote check
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteCheck {
    pub remote_path: String,
    pub connected: bool,
    pub entries: Option<usize>,
    pub error: Option<String>,
}

impl RemoteCheck {
    pub fn is_ok(&self) -> bool {
        self.connected && self.error.is_none()
    }
}

/// Connect and list `remote_path`, the way a deploy would first touch it.
pub fn check_remote<C: Connect>(connector: &C, remote_path: &str) -> RemoteCheck {
    let mut check = RemoteCheck {
        remote_path: remote_path.to_string(),
        connected: false,
        entries: None,
        error: None,
    };
    let mut transport = match connector.connect() {
        Ok(t) => t,
        Err(e) => {
            check.error = Some(e.to_string());
            return check;
        }
    };
    check.connected = true;
    match transport.list_dir(remote_path) {
        Ok(entries) => check.entries = Some(entries.len()),
        Err(e) => check.error = Some(e.to_string()),
    }
    check
}

// ---------------------------------------------------------------------------
// Recording transport for tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    /// Everything a [`FakeTransport`] was asked to do.
    #[derive(Debug, Default)]
    pub struct Log {
        pub uploads: BTreeMap<String, Vec<u8>>,
        pub upload_order: Vec<String>,
        pub commands: Vec<String>,
        pub dirs: Vec<String>,
        pub connects: usize,
    }

    #[derive(Debug, Default, Clone)]
    pub struct FakeTransport {
        pub log: Rc<RefCell<Log>>,
        /// Remote paths containing one of these fail to upload.
        pub fail_uploads: Vec<String>,
        /// Commands containing the key exit with the value.
        pub exit_codes: Vec<(String, i32)>,
    }

    impl FakeTransport {
        pub fn uploaded(&self, remote: &str) -> Option<String> {
            self.log
                .borrow()
                .uploads
                .get(remote)
                .map(|b| String::from_utf8_lossy(b).into_owned())
        }

        pub fn commands(&self) -> Vec<String> {
            self.log.borrow().commands.clone()
        }
    }

    impl Transport for FakeTransport {
        fn upload_bytes(&mut self, data: &[u8], remote: &str) -> Result<()> {
            if self.fail_uploads.iter().any(|f| remote.contains(f.as_str())) {
                return Err(SiteError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    format!("permission denied: {remote}"),
                )));
            }
            let mut log = self.log.borrow_mut();
            log.uploads.insert(remote.to_string(), data.to_vec());
            log.upload_order.push(remote.to_string());
            Ok(())
        }

        fn exec(&mut self, command: &str) -> Result<ExecOutput> {
            self.log.borrow_mut().commands.push(command.to_string());
            let status = self
                .exit_codes
                .iter()
                .find(|(k, _)| command.contains(k.as_str()))
                .map(|(_, code)| *code)
                .unwrap_or(0);
            Ok(ExecOutput {
                status,
                stdout: String::new(),
                stderr: if status == 0 {
                    String::new()
                } else {
                    "simulated failure".to_string()
                },
            })
        }

        fn ensure_dir(&mut self, remote: &str) -> Result<()> {
            self.log.borrow_mut().dirs.push(remote.to_string());
            Ok(())
        }

        fn list_dir(&mut self, remote: &str) -> Result<Vec<String>> {
            let log = self.log.borrow();
            let prefix = format!("{}/", remote.trim_end_matches('/'));
            let names: Vec<String> = log
                .uploads
                .keys()
                .filter_map(|k| k.strip_prefix(prefix.as_str()))
                .filter(|rest| !rest.contains('/'))
                .map(str::to_string)
                .collect();
            if names.is_empty() && !log.dirs.iter().any(|d| d == remote) {
                return Err(SiteError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no such directory: {remote}"),
                )));
            }
            Ok(names)
        }
    }

    /// Hands out clones of one [`FakeTransport`], counting connects.
    #[derive(Debug, Default, Clone)]
    pub struct FakeConnector {
        pub transport: FakeTransport,
        pub refuse: bool,
    }

    impl Connect for FakeConnector {
        type Transport = FakeTransport;

        fn connect(&self) -> Result<FakeTransport> {
            if self.refuse {
                return Err(SiteError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )));
            }
            self.transport.log.borrow_mut().connects += 1;
            Ok(self.transport.clone())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
