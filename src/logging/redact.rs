use std::borrow::Cow;
use std::io::{self, Write};
use std::sync::{Arc, RwLock};
use tracing_subscriber::fmt::MakeWriter;

pub const REDACTED: &str = "[REDACTED]";

/// Replaces every configured secret with [`REDACTED`]. Clones share the
/// secret list, so [`Redactor::set_secrets`] reaches every writer.
#[derive(Clone, Default)]
pub struct Redactor {
    secrets: Arc<RwLock<Vec<String>>>,
}

impl Redactor {
    pub fn new(secrets: impl IntoIterator<Item = String>) -> Self {
        let redactor = Self::default();
        redactor.set_secrets(secrets);
        redactor
    }

    pub fn set_secrets(&self, secrets: impl IntoIterator<Item = String>) {
        let secrets = secrets.into_iter().filter(|s| !s.is_empty()).collect();
        *self.secrets.write().unwrap() = secrets;
    }

    pub fn redact<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let secrets = self.secrets.read().unwrap();
        let mut out = Cow::Borrowed(text);
        for secret in secrets.iter() {
            if out.contains(secret.as_str()) {
                out = Cow::Owned(out.replace(secret.as_str(), REDACTED));
            }
        }
        out
    }
}

/// `MakeWriter` for the fmt layer. Each event is buffered whole and written
/// to stdout once redacted, so a secret split across writes is still caught.
#[derive(Clone)]
pub struct RedactingMakeWriter {
    redactor: Redactor,
}

impl RedactingMakeWriter {
    pub fn new(redactor: Redactor) -> Self {
        Self { redactor }
    }
}

pub struct RedactingWriter {
    redactor: Redactor,
    buf: Vec<u8>,
}

impl<'a> MakeWriter<'a> for RedactingMakeWriter {
    type Writer = RedactingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            redactor: self.redactor.clone(),
            buf: Vec::new(),
        }
    }
}

impl RedactingWriter {
    fn drain(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let text = String::from_utf8_lossy(&self.buf);
        let redacted = self.redactor.redact(&text);
        let mut stdout = io::stdout().lock();
        stdout.write_all(redacted.as_bytes())?;
        self.buf.clear();
        stdout.flush()
    }
}

impl Write for RedactingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.drain()
    }
}

impl Drop for RedactingWriter {
    fn drop(&mut self) {
        let _ = self.drain();
    }
}
