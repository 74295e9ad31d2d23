use sitectl_core::config::Secrets;
use std::io::Write;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Install the stderr subscriber. `RUST_LOG` wins when set; otherwise
/// `default_level` applies.
pub fn init(default_level: tracing::Level) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_level, rust_log.as_deref()))
        .with_target(false)
        .with_writer(RedactingStderr)
        .init();
}

fn filter(default_level: tracing::Level, rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::default().add_directive(default_level.into()))
}

/// Hands out one buffer per event; the event is scrubbed of secret values
/// and written to stderr when the buffer drops.
pub struct RedactingStderr;

impl<'a> MakeWriter<'a> for RedactingStderr {
    type Writer = RedactedEvent;

    fn make_writer(&'a self) -> Self::Writer {
        RedactedEvent { buf: Vec::new() }
    }
}

pub struct RedactedEvent {
    buf: Vec<u8>,
}

impl RedactedEvent {
    fn scrubbed(&self, secrets: &Secrets) -> String {
        secrets.redact(&String::from_utf8_lossy(&self.buf))
    }
}

impl Write for RedactedEvent {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Drop for RedactedEvent {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        // Read per event: env files load after the subscriber is installed.
        let line = self.scrubbed(&Secrets::from_env());
        let _ = std::io::stderr().write_all(line.as_bytes());
    }
}
