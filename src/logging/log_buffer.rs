use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use super::redact::Redactor;

pub const LOG_BUFFER_CAPACITY: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    /// `DEBUG`, `INFO`, `WARNING` or `ERROR`.
    pub level: String,
    pub message: String,
}

/// Bounded, shareable ring of recent log entries. Oldest entries are
/// evicted first.
#[derive(Clone)]
pub struct LogBuffer {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(LOG_BUFFER_CAPACITY)
    }
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn push(&self, entry: LogEntry) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock().unwrap();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> Vec<LogEntry> {
        let entries = self.entries.lock().unwrap();
        entries.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::TRACE | Level::DEBUG => "DEBUG",
        Level::INFO => "INFO",
        Level::WARN => "WARNING",
        Level::ERROR => "ERROR",
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            return self.message;
        }
        let fields = self.fields.join(" ");
        if self.message.is_empty() {
            fields
        } else {
            format!("{} {}", self.message, fields)
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

/// Layer copying every event that passes the filter into a [`LogBuffer`].
pub struct LogCaptureLayer {
    buffer: LogBuffer,
    redactor: Redactor,
}

impl LogCaptureLayer {
    pub fn new(buffer: LogBuffer, redactor: Redactor) -> Self {
        Self { buffer, redactor }
    }
}

impl<S: Subscriber> Layer<S> for LogCaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let message = visitor.finish();

        self.buffer.push(LogEntry {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            level: level_name(event.metadata().level()).to_string(),
            message: self.redactor.redact(&message).into_owned(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    fn entry(message: &str) -> LogEntry {
        LogEntry {
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            level: "INFO".to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn recent_is_newest_first_and_limited() {
        let buffer = LogBuffer::new(10);
        for i in 0..5 {
            buffer.push(entry(&format!("m{}", i)));
        }

        let recent = buffer.recent(3);

        let messages: Vec<_> = recent.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["m4", "m3", "m2"]);
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let buffer = LogBuffer::new(3);
        for i in 0..5 {
            buffer.push(entry(&format!("m{}", i)));
        }

        assert_eq!(buffer.len(), 3);
        let messages: Vec<_> = buffer.recent(10).into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["m4", "m3", "m2"]);
    }

    #[test]
    fn default_capacity_is_two_hundred() {
        let buffer = LogBuffer::default();
        for i in 0..250 {
            buffer.push(entry(&i.to_string()));
        }
        assert_eq!(buffer.len(), LOG_BUFFER_CAPACITY);
        assert_eq!(buffer.recent(1)[0].message, "249");
    }

    #[test]
    fn layer_captures_redacted_events() {
        let buffer = LogBuffer::new(10);
        let layer = LogCaptureLayer::new(buffer.clone(), Redactor::new(vec!["k3y".to_string()]));
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("Connected to Radarr v5.0");
            tracing::warn!(app = "sonarr", "Bad key k3y");
        });

        let recent = buffer.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].level, "WARNING");
        assert_eq!(recent[0].message, "Bad key [REDACTED] app=sonarr");
        assert_eq!(recent[1].level, "INFO");
        assert_eq!(recent[1].message, "Connected to Radarr v5.0");
    }
}
