//! Bounded, append-only CSV tables
//!
//! Rows are buffered in memory up to a fixed capacity and appended to the
//! table file on [`EventTable::flush`]. Whether the header row has been
//! written is tracked by the table itself, not inferred from the file
//! system.

use crate::error::{Result, ResultExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// A row type with a fixed column header
pub trait TableRow: Serialize {
    /// Column names, in serialization order
    const HEADER: &'static [&'static str];
}

/// One logged message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    /// Stream-clock timestamp
    pub timestamp: f64,
    /// Sender loop timestamp
    pub loop_timestamp: Option<f64>,
    /// Message name
    pub name: String,
    /// Value as text (JSON for non-string values)
    pub value: String,
    /// File name current when the message arrived
    pub file: Option<String>,
}

impl TableRow for EventRow {
    const HEADER: &'static [&'static str] = &["timestamp", "loop_timestamp", "name", "value", "file"];
}

/// Append buffer for one CSV table
#[derive(Debug)]
pub struct EventTable<T: TableRow> {
    path: PathBuf,
    capacity: usize,
    buffer: Vec<T>,
    writer: Option<csv::Writer<File>>,
    /// Header row already written to `path`
    initialized: bool,
    rows_written: u64,
}

impl<T: TableRow> EventTable<T> {
    /// Create a table; nothing touches the disk until the first flush
    pub fn new(path: impl Into<PathBuf>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            path: path.into(),
            capacity,
            buffer: Vec::with_capacity(capacity),
            writer: None,
            initialized: false,
            rows_written: 0,
        }
    }

    /// Buffer a row, flushing first if the buffer is full
    pub fn push(&mut self, row: T) -> Result<()> {
        if self.buffer.len() >= self.capacity {
            self.flush()?;
        }
        self.buffer.push(row);
        Ok(())
    }

    /// Buffer rows that must reach the file together
    ///
    /// Flushes pending rows first if the group would not fit; a group larger
    /// than the capacity is kept whole.
    pub fn push_group(&mut self, rows: Vec<T>) -> Result<()> {
        if !self.buffer.is_empty() && self.buffer.len() + rows.len() > self.capacity {
            self.flush()?;
        }
        self.buffer.extend(rows);
        Ok(())
    }

    /// Append buffered rows to the file and clear the buffer
    ///
    /// A no-op when nothing is buffered. Returns the number of rows written.
    pub fn flush(&mut self) -> Result<usize> {
        if self.buffer.is_empty() {
            return Ok(0);
        }

        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)
                    .with_context(|| format!("Failed to open table {:?}", self.path))?;
                // Reopening an existing table continues it under its header
                let existing = file
                    .metadata()
                    .with_context(|| format!("Failed to stat table {:?}", self.path))?
                    .len();
                if existing > 0 {
                    self.initialized = true;
                }
                tracing::debug!("Opened event table {:?} ({} bytes)", self.path, existing);
                csv::WriterBuilder::new()
                    .has_headers(false)
                    .from_writer(file)
            }
        };
        let writer = self.writer.insert(writer);

        if !self.initialized {
            writer.write_record(T::HEADER)?;
            self.initialized = true;
        }
        for row in &self.buffer {
            writer.serialize(row)?;
        }
        writer.flush().with_context(|| format!("Failed to flush {:?}", self.path))?;

        let count = self.buffer.len();
        self.rows_written += count as u64;
        self.buffer.clear();
        Ok(count)
    }

    /// Rows waiting for the next flush
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Rows written to disk so far
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Whether the header row has been written
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Table file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read every row of a table written by [`EventTable`]
pub fn read_rows<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}
