use thiserror::Error;

#[derive(Debug, Error)]
pub enum SiteError {
    #[error("not initialized: run 'sitectl init'")]
    NotInitialized,

    #[error("missing setting: {0}")]
    MissingSetting(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("command not recognized: '{0}'. Try: add product, create post, create page, add customer, update navigation, change background, change colors, update field, create coupon, list orders, deploy, status")]
    UnrecognizedCommand(String),

    #[error("invalid parameter for {action}: {reason}")]
    InvalidParameter { action: String, reason: String },

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("unknown plugin: {0}")]
    UnknownPlugin(String),

    #[error("template marker not found in {file}: {marker}")]
    TemplateMarker { file: String, marker: String },

    #[error("theme file not found: {0}")]
    ThemeFileNotFound(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("AI response could not be used: {reason}\n  raw: {raw}")]
    AiResponse { reason: String, raw: String },

    #[error("intent confidence {confidence:.2} is below the minimum {minimum:.2}")]
    LowConfidence { confidence: f64, minimum: f64 },

    #[error("remote command failed with status {status}: {command}\n  {stderr}")]
    RemoteCommand {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("host key mismatch for {host}: expected {expected}, got {actual}")]
    HostKeyMismatch {
        host: String,
        expected: String,
        actual: String,
    },

    #[error("failed to deploy: {0}")]
    DeployFailed(String),

    #[error("invalid plugin archive {path}: {reason}")]
    InvalidArchive { path: String, reason: String },

    #[error(transparent)]
    Request(#[from] reqwest::Error),

    #[error(transparent)]
    Ssh(#[from] ssh2::Error),

    #[error(transparent)]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SiteError {
    /// True for failures that may succeed on retry: timeouts, refused
    /// connections, rate limiting and 5xx responses.
    pub fn is_transient(&self) -> bool {
        match self {
            SiteError::Http { status, .. } => *status == 429 || *status >= 500,
            SiteError::Request(e) => e.is_timeout() || e.is_connect(),
            SiteError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SiteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        let e = SiteError::Http {
            status: 503,
            body: String::new(),
        };
        assert!(e.is_transient());
        let e = SiteError::Http {
            status: 429,
            body: String::new(),
        };
        assert!(e.is_transient());
    }

    #[test]
    fn client_errors_are_permanent() {
        let e = SiteError::Http {
            status: 401,
            body: "rest_forbidden".into(),
        };
        assert!(!e.is_transient());
        assert!(!SiteError::NotInitialized.is_transient());
    }

    #[test]
    fn timed_out_io_is_transient() {
        let e = SiteError::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"));
        assert!(e.is_transient());
    }
}
