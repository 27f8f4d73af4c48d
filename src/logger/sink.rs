//! Event sink seam shared by the synchronizer and outliners.

#![allow(missing_docs)]

use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::config::LoggingConfig;
use crate::logger::jsonl::{EventType, JsonlWriter, LogEntry};

/// Destination for journal entries. Implementations must never fail loudly.
pub trait EventSink: Send + Sync {
    fn record(&self, entry: LogEntry);
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _entry: LogEntry) {}
}

/// Keeps entries in memory; used by tests and the CLI trace output.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Number of recorded entries of one type.
    #[must_use]
    pub fn count(&self, event: EventType) -> usize {
        self.entries.lock().iter().filter(|e| e.event == event).count()
    }
}

impl EventSink for MemorySink {
    fn record(&self, entry: LogEntry) {
        self.entries.lock().push(entry);
    }
}

/// Thread-safe wrapper that writes to a [`JsonlWriter`].
pub struct JsonlSink {
    writer: Mutex<JsonlWriter>,
}

impl JsonlSink {
    #[must_use]
    pub fn open(config: &LoggingConfig) -> Self {
        Self {
            writer: Mutex::new(JsonlWriter::open(config)),
        }
    }

    pub fn flush(&self) {
        self.writer.lock().flush();
    }
}

impl EventSink for JsonlSink {
    fn record(&self, entry: LogEntry) {
        self.writer.lock().write_entry(&entry);
    }
}

/// Build the sink selected by configuration.
#[must_use]
pub fn sink_from_config(config: &LoggingConfig) -> Arc<dyn EventSink> {
    if config.enabled {
        Arc::new(JsonlSink::open(config))
    } else {
        Arc::new(NullSink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::jsonl::Severity;

    #[test]
    fn memory_sink_counts_by_event() {
        let sink = MemorySink::new();
        sink.record(LogEntry::new(EventType::ChipChanged, Severity::Info));
        sink.record(LogEntry::new(EventType::ChipChanged, Severity::Info));
        sink.record(LogEntry::new(EventType::BucketToggled, Severity::Info));
        assert_eq!(sink.count(EventType::ChipChanged), 2);
        assert_eq!(sink.count(EventType::StaleResponse), 0);
        assert_eq!(sink.entries().len(), 3);
    }

    #[test]
    fn disabled_logging_uses_null_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never.jsonl");
        let config = LoggingConfig {
            enabled: false,
            jsonl_path: path.clone(),
            ..LoggingConfig::default()
        };
        let sink = sink_from_config(&config);
        sink.record(LogEntry::new(EventType::TreeActivated, Severity::Info));
        assert!(!path.exists());
    }

    #[test]
    fn jsonl_sink_writes_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let config = LoggingConfig {
            enabled: true,
            jsonl_path: path.clone(),
            fallback_path: None,
            ..LoggingConfig::default()
        };
        let sink = JsonlSink::open(&config);
        sink.record(LogEntry::new(EventType::StaleResponse, Severity::Info).seq(3));
        sink.flush();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("stale_response"));
    }
}
