//! Structured request journal
//!
//! Records `{timestamp, level, type, data}` for every request, attempt, raw
//! backend reply, retry decision and error. Each record goes to two places:
//!
//! - a `tracing` event (console, via the JSON subscriber installed in main)
//! - one JSON line in an append-only file, written through
//!   `tracing_appender::non_blocking` so callers never wait on disk I/O
//!
//! Recording never fails from the caller's point of view. A full buffer or a
//! write error drops the line.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Info,
    Warn,
    Error,
}

/// One journal line.
#[derive(Debug, Serialize)]
pub struct Record<'a> {
    pub timestamp: String,
    pub level: Level,
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub data: serde_json::Value,
}

/// Cheap-to-clone handle to the journal sink.
#[derive(Clone, Default)]
pub struct Journal {
    file: Option<NonBlocking>,
}

impl Journal {
    /// Journal that only emits tracing events.
    pub fn console_only() -> Self {
        Self { file: None }
    }

    /// Journal that also appends to `path`, creating parent directories.
    ///
    /// The returned guard flushes pending lines when dropped; keep it alive
    /// for the life of the process.
    pub fn with_file(path: &Path) -> std::io::Result<(Self, WorkerGuard)> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let (writer, guard) = tracing_appender::non_blocking(file);
        Ok((Self { file: Some(writer) }, guard))
    }

    pub fn info(&self, kind: &str, data: serde_json::Value) {
        self.record(Level::Info, kind, data);
    }

    pub fn warn(&self, kind: &str, data: serde_json::Value) {
        self.record(Level::Warn, kind, data);
    }

    pub fn error(&self, kind: &str, data: serde_json::Value) {
        self.record(Level::Error, kind, data);
    }

    fn record(&self, level: Level, kind: &str, data: serde_json::Value) {
        match level {
            Level::Info => info!(record_type = kind, data = %data, "journal"),
            Level::Warn => warn!(record_type = kind, data = %data, "journal"),
            Level::Error => error!(record_type = kind, data = %data, "journal"),
        }

        let Some(file) = &self.file else {
            return;
        };
        let record = Record {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level,
            kind,
            data,
        };
        let Ok(mut line) = serde_json::to_vec(&record) else {
            return;
        };
        line.push(b'\n');
        let mut writer = file.clone();
        let _ = writer.write_all(&line);
    }
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Journal")
            .field("file", &self.file.is_some())
            .finish()
    }
}
