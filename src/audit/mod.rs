//! Append-only request audit sinks
//!
//! Every sink serializes writers so that concurrent requests never
//! produce interleaved lines.

use crate::error::{Error, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;

/// Destination for audit lines
pub trait AuditSink: Send + Sync {
    /// Append one line. The sink adds the line terminator.
    fn append(&self, line: &str) -> Result<()>;
}

/// Audit file opened in append mode
pub struct FileAuditSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileAuditSink {
    /// Open (or create) the audit file, creating missing parent directories
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for FileAuditSink {
    fn append(&self, line: &str) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| Error::Audit(format!("audit writer for {} poisoned", self.path.display())))?;
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}

/// In-memory sink, mainly for tests and dry runs
#[derive(Clone, Default)]
pub struct MemoryAuditSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the lines written so far
    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for MemoryAuditSink {
    fn append(&self, line: &str) -> Result<()> {
        let mut lines = self
            .lines
            .lock()
            .map_err(|_| Error::Audit("memory audit sink poisoned".to_string()))?;
        lines.push(line.to_string());
        Ok(())
    }
}

/// Emits audit lines as tracing events on the `audit` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn append(&self, line: &str) -> Result<()> {
        info!(target: "audit", "{}", line);
        Ok(())
    }
}
