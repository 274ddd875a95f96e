//! Pluggable audit sinks
//!
//! A sink receives a live copy of every binding attempt as it is
//! produced. The engine guarantees at-most-one `write` per attempt and a
//! deterministic `flush`/`close` at session end, on every exit path.
//!
//! Built-in backends: streaming JSONL, whole-array JSON, in-memory, and
//! a multiplex sink that fans out to several children. Custom backends
//! (SQLite, object stores) implement the same three methods.

use sigil_types::{BindingAttempt, SinkError};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Protocol for pluggable audit trail storage
pub trait AuditSink: Send {
    /// Write a single binding attempt. May buffer.
    fn write(&mut self, attempt: &BindingAttempt) -> Result<(), SinkError>;

    /// Flush any buffered attempts to storage.
    fn flush(&mut self) -> Result<(), SinkError>;

    /// Flush remaining data and release resources. Further writes fail.
    fn close(&mut self) -> Result<(), SinkError>;
}

// ── JSONL file sink ──────────────────────────────────────────────────

/// Streaming newline-delimited JSON sink with a small write buffer.
///
/// Each attempt becomes one JSON object per line. Suited to long
/// sessions and line-oriented tooling.
pub struct JsonlFileSink {
    writer: Option<BufWriter<File>>,
    buffer: Vec<BindingAttempt>,
    buffer_size: usize,
}

impl JsonlFileSink {
    /// Open a sink appending to `path` (created if missing), flushing
    /// every `buffer_size` attempts.
    pub fn append(path: impl AsRef<Path>, buffer_size: usize) -> Result<Self, SinkError> {
        Self::open(path, buffer_size, true)
    }

    /// Open a sink truncating `path`.
    pub fn truncate(path: impl AsRef<Path>, buffer_size: usize) -> Result<Self, SinkError> {
        Self::open(path, buffer_size, false)
    }

    fn open(path: impl AsRef<Path>, buffer_size: usize, append: bool) -> Result<Self, SinkError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(append)
            .write(true)
            .truncate(!append)
            .open(path)?;
        Ok(Self {
            writer: Some(BufWriter::new(file)),
            buffer: Vec::new(),
            buffer_size: buffer_size.max(1),
        })
    }
}

impl AuditSink for JsonlFileSink {
    fn write(&mut self, attempt: &BindingAttempt) -> Result<(), SinkError> {
        if self.writer.is_none() {
            return Err(SinkError::Closed);
        }
        self.buffer.push(attempt.clone());
        if self.buffer.len() >= self.buffer_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(SinkError::Closed);
        };
        for attempt in self.buffer.drain(..) {
            serde_json::to_writer(&mut *writer, &attempt)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        if self.writer.is_some() {
            self.flush()?;
            self.writer = None;
        }
        Ok(())
    }
}

// ── JSON array sink ──────────────────────────────────────────────────

/// Sink that accumulates attempts in memory and writes one
/// pretty-printed JSON array on close. Suited to small sessions that
/// want a single document.
pub struct JsonFileSink {
    path: PathBuf,
    attempts: Vec<BindingAttempt>,
    closed: bool,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            attempts: Vec::new(),
            closed: false,
        }
    }
}

impl AuditSink for JsonFileSink {
    fn write(&mut self, attempt: &BindingAttempt) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        self.attempts.push(attempt.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        // Everything is held until close; nothing to do.
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        if self.closed {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(&self.path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.attempts)?;
        self.attempts.clear();
        self.closed = true;
        Ok(())
    }
}

// ── In-memory sink ───────────────────────────────────────────────────

/// Sink that keeps attempts in memory, for tests and inspection
#[derive(Debug, Default)]
pub struct MemorySink {
    attempts: Vec<BindingAttempt>,
    flushes: usize,
    closed: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> &[BindingAttempt] {
        &self.attempts
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl AuditSink for MemorySink {
    fn write(&mut self, attempt: &BindingAttempt) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        self.attempts.push(attempt.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.flushes += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.closed = true;
        Ok(())
    }
}

// ── Multiplex sink ───────────────────────────────────────────────────

/// Fan-out sink: forwards every call to each child.
///
/// Every child is attempted even after one fails; the first error is
/// reported.
pub struct MultiplexSink {
    children: Vec<Box<dyn AuditSink>>,
}

impl MultiplexSink {
    pub fn new(children: Vec<Box<dyn AuditSink>>) -> Self {
        Self { children }
    }

    fn each(
        &mut self,
        mut op: impl FnMut(&mut Box<dyn AuditSink>) -> Result<(), SinkError>,
    ) -> Result<(), SinkError> {
        let mut first_error = None;
        for child in &mut self.children {
            if let Err(err) = op(child) {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl AuditSink for MultiplexSink {
    fn write(&mut self, attempt: &BindingAttempt) -> Result<(), SinkError> {
        self.each(|child| child.write(attempt))
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.each(|child| child.flush())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.each(|child| child.close())
    }
}
