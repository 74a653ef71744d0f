//! Structured error sink.
//!
//! One entry per record-level fault or batch-level error, timestamped, with
//! a category and message. The live progress feed continues regardless of
//! what lands here.

use chrono::Local;
use parking_lot::Mutex;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::warn;

/// Category of a recorded failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The store could not be queried for record identifiers
    List,
    /// A credential's connection could not be established
    Connection,
    /// A batch could not be submitted at all
    Batch,
    /// One record inside an otherwise-submitted batch could not be deleted
    RecordFault,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::List => "ListError",
            ErrorCategory::Connection => "ConnectionError",
            ErrorCategory::Batch => "BatchError",
            ErrorCategory::RecordFault => "RecordFault",
        };
        f.write_str(name)
    }
}

/// Destination for record- and batch-level failures.
pub trait ErrorSink: Send + Sync {
    fn record(&self, category: ErrorCategory, message: &str);
}

/// Appends timestamped entries to a log file.
pub struct FileErrorSink {
    file: Mutex<File>,
}

impl FileErrorSink {
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl ErrorSink for FileErrorSink {
    fn record(&self, category: ErrorCategory, message: &str) {
        let line = format!(
            "{} - {}: {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            category,
            message
        );
        let mut file = self.file.lock();
        if let Err(e) = file.write_all(line.as_bytes()) {
            // The run must not die because the error log is unwritable.
            warn!(error = %e, "failed to append error log entry");
        }
    }
}

/// In-memory sink for tests.
#[derive(Default)]
pub struct MemorySink {
    entries: Mutex<Vec<(ErrorCategory, String)>>,
}

impl MemorySink {
    pub fn entries(&self) -> Vec<(ErrorCategory, String)> {
        self.entries.lock().clone()
    }
}

impl ErrorSink for MemorySink {
    fn record(&self, category: ErrorCategory, message: &str) {
        self.entries.lock().push((category, message.to_string()));
    }
}
