//! Verdict persistence.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::error::SinkError;

use super::verdict::AuditRecord;

/// Destination for audit records.
///
/// The session manager hands every verdict to its sink exactly once, and
/// retries only records whose first write failed.
pub trait VerdictSink: Send + Sync {
    /// Persists one record.
    ///
    /// # Errors
    ///
    /// Returns `SinkError` when the record could not be made durable.
    fn record(&self, record: &AuditRecord) -> Result<(), SinkError>;
}

/// Appends one JSON line per verdict to a file.
pub struct JsonlAuditSink {
    // held briefly for a buffered write + flush, never across .await
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlAuditSink {
    /// Opens `path` for appending, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory or file cannot be created.
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        debug!(path = %path.display(), "audit file opened");
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    /// Path of the audit file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for JsonlAuditSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlAuditSink")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl VerdictSink for JsonlAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<(), SinkError> {
        let line = serde_json::to_string(record)?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| SinkError::Unavailable("audit writer lock poisoned".into()))?;
        writeln!(writer, "{line}")?;
        writer.flush()?;
        drop(writer);
        Ok(())
    }
}

/// Keeps records in memory.
///
/// Can be switched offline to exercise persistence failures.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<AuditRecord>>,
    offline: AtomicBool,
}

impl MemorySink {
    /// Creates an empty, online sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent writes fail (`true`) or succeed (`false`).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Records written so far.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl VerdictSink for MemorySink {
    fn record(&self, record: &AuditRecord) -> Result<(), SinkError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(SinkError::Unavailable("memory sink offline".into()));
        }
        self.records
            .lock()
            .map_err(|_| SinkError::Unavailable("memory sink lock poisoned".into()))?
            .push(record.clone());
        Ok(())
    }
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl VerdictSink for NoopSink {
    fn record(&self, _record: &AuditRecord) -> Result<(), SinkError> {
        Ok(())
    }
}
