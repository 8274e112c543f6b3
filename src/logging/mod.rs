//! tracing setup: stdout output with API keys scrubbed, plus an in-memory
//! copy of recent events for the API.

mod log_buffer;
mod redact;

pub use log_buffer::{LogBuffer, LogCaptureLayer, LogEntry, LOG_BUFFER_CAPACITY};
pub use redact::{RedactingMakeWriter, Redactor, REDACTED};

use anyhow::{Context, Result};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

/// Maps a configured level name to a filter. `LOG_LEVEL` still wins when set.
pub fn level_filter(log_level: &str) -> LevelFilter {
    match log_level {
        "debug" => LevelFilter::DEBUG,
        "warning" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => LevelFilter::INFO,
    }
}

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level_filter(log_level).into())
        .with_env_var("LOG_LEVEL")
        .from_env_lossy()
}

/// Live handles on the installed subscriber, used to apply edited settings.
#[derive(Clone, Default)]
pub struct LoggingControl {
    redactor: Redactor,
    filter: Option<reload::Handle<EnvFilter, Registry>>,
}

impl LoggingControl {
    pub fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    /// Swaps the redacted secrets and the level filter.
    pub fn apply(&self, log_level: &str, secrets: &[String]) -> Result<()> {
        self.redactor.set_secrets(secrets.iter().cloned());
        if let Some(filter) = &self.filter {
            filter
                .reload(env_filter(log_level))
                .context("Failed to change log level")?;
        }
        Ok(())
    }
}

/// Installs the global subscriber. Can only succeed once per process.
pub fn init_logging(log_level: &str, secrets: &[String], buffer: LogBuffer) -> Result<LoggingControl> {
    let redactor = Redactor::new(secrets.iter().cloned());
    let (filter, filter_handle) = reload::Layer::new(env_filter(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer().with_writer(RedactingMakeWriter::new(redactor.clone())),
        )
        .with(LogCaptureLayer::new(buffer, redactor.clone()))
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(LoggingControl {
        redactor,
        filter: Some(filter_handle),
    })
}
