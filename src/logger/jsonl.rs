//! JSONL event journal: one self-contained JSON object per line.
//!
//! Lines are serialized in full before a single `write_all`, so a tailing
//! reader never observes half an entry. When the primary file cannot be
//! opened or written the writer degrades: fallback path, then stderr with a
//! `[SOL-JSONL]` prefix, then silent discard. Journal failures never reach the
//! caller.

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::config::LoggingConfig;
use crate::core::errors::{Result, SolError};

/// Severity level for journal events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Journal event types for the outliner lifecycle and map synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    TreeActivated,
    TreeDeactivated,
    TreeSuperseded,
    ChipChanged,
    BucketToggled,
    StaleResponse,
    CollaboratorFailure,
    DecodeInert,
    HighlightUnderflow,
    DoubleTeardown,
}

/// A single journal entry. Only `ts`, `event` and `severity` are mandatory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outliner: Option<u64>,
    /// Request sequence number the event refers to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    /// Feature id rendered as `namespace/id`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chip: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    #[must_use]
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            outliner: None,
            seq: None,
            feature: None,
            chip: None,
            value: None,
            bucket: None,
            count: None,
            error_code: None,
            details: None,
        }
    }

    #[must_use]
    pub fn outliner(mut self, id: u64) -> Self {
        self.outliner = Some(id);
        self
    }

    #[must_use]
    pub fn seq(mut self, seq: u64) -> Self {
        self.seq = Some(seq);
        self
    }

    #[must_use]
    pub fn feature(mut self, feature: impl Into<String>) -> Self {
        self.feature = Some(feature.into());
        self
    }

    #[must_use]
    pub fn chip(mut self, index: i64, value: i64) -> Self {
        self.chip = Some(index);
        self.value = Some(value);
        self
    }

    #[must_use]
    pub fn bucket(mut self, bucket: Option<i64>) -> Self {
        self.bucket = bucket;
        self
    }

    #[must_use]
    pub fn count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    #[must_use]
    pub fn error(mut self, err: &SolError) -> Self {
        self.error_code = Some(err.code().to_string());
        self.details = Some(err.to_string());
        self
    }

    #[must_use]
    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Degradation state of the JSONL writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Primary,
    Fallback,
    Stderr,
    Discard,
}

/// Append-only JSONL journal writer with size-based rotation and fallback.
pub struct JsonlWriter {
    path: PathBuf,
    fallback_path: Option<PathBuf>,
    max_size_bytes: u64,
    max_rotated_files: u32,
    writer: Option<BufWriter<File>>,
    state: WriterState,
    bytes_written: u64,
}

impl JsonlWriter {
    /// Open the journal described by `config`, degrading on failure.
    #[must_use]
    pub fn open(config: &LoggingConfig) -> Self {
        let mut w = Self {
            path: config.jsonl_path.clone(),
            fallback_path: config.fallback_path.clone(),
            max_size_bytes: config.max_size_bytes,
            max_rotated_files: config.max_rotated_files,
            writer: None,
            state: WriterState::Discard,
            bytes_written: 0,
        };
        w.open_primary();
        w
    }

    /// Write a single entry as one JSONL line.
    pub fn write_entry(&mut self, entry: &LogEntry) {
        match serde_json::to_string(entry) {
            Ok(json) => self.write_line(&format!("{json}\n")),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[SOL-JSONL] serialize error: {e}");
            }
        }
    }

    /// Flush buffered lines to the file.
    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }

    /// Current degradation state.
    #[must_use]
    pub fn state(&self) -> &'static str {
        match self.state {
            WriterState::Primary => "primary",
            WriterState::Fallback => "fallback",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    // ──────────────────────── internals ────────────────────────

    fn write_line(&mut self, line: &str) {
        if self.bytes_written + line.len() as u64 > self.max_size_bytes
            && matches!(self.state, WriterState::Primary | WriterState::Fallback)
        {
            self.rotate();
        }

        match self.state {
            WriterState::Primary | WriterState::Fallback => {
                let written = self
                    .writer
                    .as_mut()
                    .is_some_and(|w| w.write_all(line.as_bytes()).is_ok());
                if written {
                    self.bytes_written += line.len() as u64;
                } else {
                    self.degrade();
                    self.write_line(line);
                }
            }
            WriterState::Stderr => {
                let _ = write!(io::stderr(), "[SOL-JSONL] {line}");
            }
            WriterState::Discard => {}
        }
    }

    fn open_primary(&mut self) {
        if let Ok((file, size)) = open_append(&self.path) {
            self.writer = Some(BufWriter::new(file));
            self.state = WriterState::Primary;
            self.bytes_written = size;
        } else {
            self.open_fallback();
        }
    }

    fn open_fallback(&mut self) {
        let opened = self
            .fallback_path
            .as_deref()
            .and_then(|fb| open_append(fb).ok());
        if let Some((file, size)) = opened {
            self.writer = Some(BufWriter::new(file));
            self.state = WriterState::Fallback;
            self.bytes_written = size;
        } else {
            self.state = WriterState::Stderr;
            let _ = writeln!(io::stderr(), "[SOL-JSONL] journal files unavailable, using stderr");
        }
    }

    fn degrade(&mut self) {
        self.writer = None;
        match self.state {
            WriterState::Primary => self.open_fallback(),
            WriterState::Fallback => self.state = WriterState::Stderr,
            WriterState::Stderr | WriterState::Discard => self.state = WriterState::Discard,
        }
    }

    fn rotate(&mut self) {
        self.flush();
        self.writer = None;
        let base = match self.state {
            WriterState::Primary => self.path.clone(),
            WriterState::Fallback => match &self.fallback_path {
                Some(p) => p.clone(),
                None => return,
            },
            WriterState::Stderr | WriterState::Discard => return,
        };

        // events.jsonl.2 → .3, .1 → .2, current → .1
        let _ = fs::remove_file(rotated_name(&base, self.max_rotated_files));
        for i in (1..self.max_rotated_files).rev() {
            let _ = fs::rename(rotated_name(&base, i), rotated_name(&base, i + 1));
        }
        let _ = fs::rename(&base, rotated_name(&base, 1));

        match open_append(&base) {
            Ok((file, _)) => {
                self.writer = Some(BufWriter::new(file));
                self.bytes_written = 0;
            }
            Err(_) => self.degrade(),
        }
    }
}

impl Drop for JsonlWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Open or create a file for appending. Returns `(File, current_size)`.
fn open_append(path: &Path) -> Result<(File, u64)> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| SolError::io(parent, source))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| SolError::io(path, source))?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    Ok((file, size))
}

/// `events.jsonl` → `events.jsonl.3`.
fn rotated_name(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_at(path: PathBuf, max_size_bytes: u64) -> LoggingConfig {
        LoggingConfig {
            enabled: true,
            jsonl_path: path,
            fallback_path: None,
            max_size_bytes,
            max_rotated_files: 2,
        }
    }

    #[test]
    fn write_entry_produces_valid_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let mut writer = JsonlWriter::open(&config_at(path.clone(), 1024 * 1024));

        writer.write_entry(
            &LogEntry::new(EventType::HighlightUnderflow, Severity::Warning)
                .outliner(4)
                .feature("/area/openstreetmap.org/way/7"),
        );
        writer.write_entry(&LogEntry::new(EventType::TreeActivated, Severity::Info));
        writer.flush();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["event"], "highlight_underflow");
        assert_eq!(parsed["severity"], "warning");
        assert_eq!(parsed["outliner"], 4);
    }

    #[test]
    fn optional_fields_omitted_when_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sparse.jsonl");
        let mut writer = JsonlWriter::open(&config_at(path.clone(), 1024 * 1024));
        writer.write_entry(&LogEntry::new(EventType::TreeDeactivated, Severity::Info));
        writer.flush();

        let line = fs::read_to_string(&path).unwrap();
        assert!(!line.contains("\"feature\""));
        assert!(!line.contains("\"seq\""));
    }

    #[test]
    fn rotation_shifts_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rot.jsonl");
        let mut writer = JsonlWriter::open(&config_at(path.clone(), 120));
        for _ in 0..10 {
            writer.write_entry(&LogEntry::new(EventType::ChipChanged, Severity::Info));
        }
        writer.flush();

        assert!(path.exists());
        assert!(rotated_name(&path, 1).exists());
        assert!(!rotated_name(&path, 3).exists());
    }

    #[test]
    fn fallback_when_primary_dir_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("fallback.jsonl");
        let mut cfg = config_at(
            PathBuf::from("/proc/sol_no_such_dir/primary.jsonl"),
            1024 * 1024,
        );
        cfg.fallback_path = Some(fallback.clone());
        let mut writer = JsonlWriter::open(&cfg);

        assert_eq!(writer.state(), "fallback");
        writer.write_entry(&LogEntry::new(EventType::CollaboratorFailure, Severity::Warning));
        writer.flush();
        assert!(!fs::read_to_string(&fallback).unwrap().is_empty());
    }

    #[test]
    fn error_builder_records_code() {
        let entry = LogEntry::new(EventType::CollaboratorFailure, Severity::Warning)
            .error(&SolError::collaborator("backend down"));
        assert_eq!(entry.error_code.as_deref(), Some("SOL-3001"));
        assert!(entry.details.unwrap().contains("backend down"));
    }
}
