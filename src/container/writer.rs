//! Incremental container writer
//!
//! The header and metadata are staged in a sibling `.part` file, synced and
//! renamed into place, so a reader either sees no file or a complete header.
//! Records are then appended one `write_all` at a time straight to the file:
//! memory use does not depend on session length, and a crash can only leave
//! a truncated final record.

use super::header::{ContainerHeader, ContainerMetadata, SampleEncoding, FORMAT_VERSION};
use super::StreamInfo;
use crate::error::{Result, ResultExt, StreamLogError};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Counters reported when a writer is closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriterStats {
    /// Records appended
    pub records: u64,
    /// Total file size in bytes
    pub bytes: u64,
}

/// Exclusive, append-only writer for one container file
#[derive(Debug)]
pub struct ContainerWriter {
    file: Option<File>,
    path: PathBuf,
    channel_count: usize,
    encoding: SampleEncoding,
    /// Reused per-record encode buffer
    scratch: Vec<u8>,
    records: u64,
    bytes: u64,
    /// Set after a failed write; the file may hold a partial record
    poisoned: Option<String>,
}

impl ContainerWriter {
    /// Create a new container and write its header and metadata
    ///
    /// Fails if `path` already exists.
    pub fn create(path: impl AsRef<Path>, info: &StreamInfo) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        info.validate()?;

        if path.exists() {
            return Err(StreamLogError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("container {:?} already exists", path),
            )));
        }

        let header = ContainerHeader {
            version: FORMAT_VERSION,
            channel_count: info.channel_count as u32,
            sample_rate: info.sample_rate,
            encoding: info.encoding,
            name: info.name.clone(),
        };
        let metadata = info.metadata();

        let mut prefix = header.encode();
        prefix.extend_from_slice(&metadata.encode()?);

        let staging = staging_path(&path);
        {
            let mut staged = File::create(&staging)
                .with_context(|| format!("Failed to create {:?}", staging))?;
            staged
                .write_all(&prefix)
                .and_then(|_| staged.sync_all())
                .with_context(|| format!("Failed to write header to {:?}", staging))?;
        }
        if let Err(e) = std::fs::rename(&staging, &path) {
            let _ = std::fs::remove_file(&staging);
            return Err(StreamLogError::Io(e).with_context(format!("Failed to publish {:?}", path)));
        }

        let file = OpenOptions::new()
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to reopen {:?}", path))?;

        tracing::info!(
            "Opened container {:?} ({} channels, {} Hz, {})",
            path,
            info.channel_count,
            info.sample_rate,
            info.encoding.display_name()
        );

        Ok(Self {
            file: Some(file),
            path,
            channel_count: info.channel_count,
            encoding: info.encoding,
            scratch: Vec::with_capacity(info.encoding.record_len(info.channel_count)),
            records: 0,
            bytes: prefix.len() as u64,
            poisoned: None,
        })
    }

    /// Append one record
    ///
    /// Fails with [`StreamLogError::Encoding`] without writing anything when
    /// `samples` does not hold exactly one value per channel.
    pub fn append(&mut self, timestamp: f64, samples: &[f64]) -> Result<()> {
        self.check_len(samples.len())?;
        self.write_record(timestamp, samples)
    }

    /// Append a chunk of records
    ///
    /// Every row is validated before the first one is written.
    pub fn append_chunk(&mut self, timestamps: &[f64], rows: &[Vec<f64>]) -> Result<()> {
        // One row per timestamp
        if timestamps.len() != rows.len() {
            return Err(StreamLogError::Encoding {
                expected: timestamps.len(),
                actual: rows.len(),
            });
        }
        for row in rows {
            self.check_len(row.len())?;
        }
        for (ts, row) in timestamps.iter().zip(rows) {
            self.write_record(*ts, row)?;
        }
        Ok(())
    }

    /// Force written records to stable storage
    pub fn sync(&mut self) -> Result<()> {
        let file = self.live_file()?;
        file.sync_data()
            .with_context(|| "Failed to sync container".to_string())
    }

    /// Flush, sync and release the file
    pub fn close(mut self) -> Result<WriterStats> {
        let stats = self.stats();
        if let Some(file) = self.file.take() {
            if self.poisoned.is_none() {
                file.sync_all()
                    .with_context(|| format!("Failed to sync {:?}", self.path))?;
            }
        }
        tracing::info!(
            "Closed container {:?} after {} records ({} bytes)",
            self.path,
            stats.records,
            stats.bytes
        );
        Ok(stats)
    }

    /// Destination path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of samples per record
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Sample encoding
    pub fn encoding(&self) -> SampleEncoding {
        self.encoding
    }

    /// Records appended so far
    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// Current file size in bytes
    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }

    /// Current counters
    pub fn stats(&self) -> WriterStats {
        WriterStats {
            records: self.records,
            bytes: self.bytes,
        }
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len != self.channel_count {
            return Err(StreamLogError::Encoding {
                expected: self.channel_count,
                actual: len,
            });
        }
        Ok(())
    }

    fn write_record(&mut self, timestamp: f64, samples: &[f64]) -> Result<()> {
        self.scratch.clear();
        self.scratch.extend_from_slice(&timestamp.to_le_bytes());
        for &value in samples {
            self.encoding.encode_into(value, &mut self.scratch);
        }

        let file = match (&self.poisoned, self.file.as_mut()) {
            (None, Some(file)) => file,
            (Some(reason), _) => {
                return Err(StreamLogError::Io(std::io::Error::other(format!(
                    "writer unusable after earlier failure: {}",
                    reason
                ))))
            }
            (None, None) => {
                return Err(StreamLogError::Io(std::io::Error::other("writer is closed")))
            }
        };

        if let Err(e) = file.write_all(&self.scratch) {
            tracing::error!("Write to {:?} failed: {}", self.path, e);
            self.poisoned = Some(e.to_string());
            return Err(StreamLogError::Io(e).with_context(format!("Failed to append to {:?}", self.path)));
        }

        self.records += 1;
        self.bytes += self.scratch.len() as u64;
        Ok(())
    }

    fn live_file(&mut self) -> Result<&mut File> {
        if let Some(reason) = &self.poisoned {
            return Err(StreamLogError::Io(std::io::Error::other(format!(
                "writer unusable after earlier failure: {}",
                reason
            ))));
        }
        self.file
            .as_mut()
            .ok_or_else(|| StreamLogError::Io(std::io::Error::other("writer is closed")))
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}
