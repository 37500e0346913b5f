//! Container reader
//!
//! Parses the header and metadata eagerly, then decodes records either as a
//! stream ([`ContainerReader::records`]) or all at once
//! ([`ContainerReader::load`]). A partially written final record is dropped
//! and reported, never misread.
//!
//! Loading a file that a [`super::ContainerWriter`] still holds open is the
//! caller's responsibility to avoid: the tail may be observed mid-record.

use super::header::{ContainerHeader, ContainerMetadata, SampleEncoding, TIMESTAMP_LEN};
use crate::error::{Result, ResultExt, StreamLogError};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// One decoded record
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Stream-clock timestamp
    pub timestamp: f64,
    /// One value per channel
    pub samples: Vec<f64>,
}

/// A fully materialized container
#[derive(Debug, Clone)]
pub struct LoadedContainer {
    /// Source file
    pub path: PathBuf,
    /// Stream name from the header
    pub stream_name: String,
    /// Nominal sample rate in Hz
    pub sample_rate: f32,
    /// Sample encoding
    pub encoding: SampleEncoding,
    /// Format version from the header
    pub header_version: u32,
    /// Metadata after repair
    pub metadata: ContainerMetadata,
    /// True when `metadata.start_time` was substituted from the first record
    pub start_time_estimated: bool,
    /// Record timestamps
    pub timestamps: Vec<f64>,
    /// Samples as `[channel][sample]`
    pub signal: Vec<Vec<f64>>,
    /// Bytes of an incomplete final record that were dropped
    pub truncated_bytes: usize,
}

impl LoadedContainer {
    /// Number of channels
    pub fn channel_count(&self) -> usize {
        self.signal.len()
    }

    /// Number of complete records
    pub fn record_count(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether an incomplete tail was dropped
    pub fn is_truncated(&self) -> bool {
        self.truncated_bytes > 0
    }

    /// The recoverable truncation condition, if any
    pub fn truncation(&self) -> Option<StreamLogError> {
        self.is_truncated().then(|| StreamLogError::TruncatedRecord {
            complete_records: self.record_count(),
            dangling_bytes: self.truncated_bytes,
        })
    }

    /// Samples of the record at `index`, in channel order
    pub fn record(&self, index: usize) -> Option<Record> {
        let timestamp = *self.timestamps.get(index)?;
        Some(Record {
            timestamp,
            samples: self.signal.iter().map(|ch| ch[index]).collect(),
        })
    }
}

/// Reader positioned after the header and metadata
pub struct ContainerReader<R: Read = BufReader<File>> {
    inner: R,
    path: PathBuf,
    header: ContainerHeader,
    metadata: ContainerMetadata,
    record_len: usize,
    buf: Vec<u8>,
    records_read: usize,
    truncated_bytes: usize,
    done: bool,
}

impl ContainerReader {
    /// Open a container and parse its header and metadata
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        Self::from_reader(BufReader::new(file), path)
    }

    /// Load a whole container into memory
    ///
    /// A truncated tail is dropped and reported through
    /// [`LoadedContainer::truncation`].
    pub fn load(path: impl AsRef<Path>) -> Result<LoadedContainer> {
        Self::open(path)?.into_container()
    }

    /// Load a whole container, treating a truncated tail as an error
    pub fn load_strict(path: impl AsRef<Path>) -> Result<LoadedContainer> {
        let loaded = Self::load(path)?;
        match loaded.truncation() {
            Some(err) => Err(err),
            None => Ok(loaded),
        }
    }
}

impl<R: Read> ContainerReader<R> {
    /// Parse the header and metadata from any byte source
    pub fn from_reader(mut inner: R, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let header = ContainerHeader::read_from(&mut inner)?;
        let mut metadata = ContainerMetadata::read_from(&mut inner)?;

        let channel_count = header.channel_count as usize;
        if metadata.normalize_channels(channel_count) {
            tracing::warn!(
                "{:?}: channel labels did not match {} channels; padded/trimmed",
                path,
                channel_count
            );
        }

        let record_len = header.encoding.record_len(channel_count);
        tracing::debug!(
            "Opened {:?}: stream {:?}, header v{}, metadata v{}, {} channels",
            path,
            header.name,
            header.version,
            metadata.version,
            channel_count
        );

        Ok(Self {
            inner,
            path,
            header,
            metadata,
            record_len,
            buf: vec![0u8; record_len],
            records_read: 0,
            truncated_bytes: 0,
            done: false,
        })
    }

    /// Parsed header
    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    /// Parsed metadata (not yet repaired for a missing start time)
    pub fn metadata(&self) -> &ContainerMetadata {
        &self.metadata
    }

    /// Size of one record in bytes
    pub fn record_len(&self) -> usize {
        self.record_len
    }

    /// Stream the records
    ///
    /// An incomplete tail yields one final [`StreamLogError::TruncatedRecord`].
    pub fn records(&mut self) -> Records<'_, R> {
        Records { reader: self }
    }

    /// Decode every remaining record and materialize the container
    pub fn into_container(mut self) -> Result<LoadedContainer> {
        let channel_count = self.header.channel_count as usize;
        let mut timestamps = Vec::new();
        let mut signal: Vec<Vec<f64>> = vec![Vec::new(); channel_count];

        while let Some(record) = self.next_record() {
            match record {
                Ok(record) => {
                    timestamps.push(record.timestamp);
                    for (channel, value) in signal.iter_mut().zip(record.samples) {
                        channel.push(value);
                    }
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!("{:?}: {}", self.path, e);
                }
                Err(e) => return Err(e),
            }
        }

        let mut metadata = self.metadata;
        let start_time_estimated = repair_start_time(&mut metadata, timestamps.first().copied());
        if start_time_estimated {
            tracing::debug!(
                "{:?}: metadata v{} has no start_time, using first record timestamp",
                self.path,
                metadata.version
            );
        }

        Ok(LoadedContainer {
            path: self.path,
            stream_name: self.header.name,
            sample_rate: self.header.sample_rate,
            encoding: self.header.encoding,
            header_version: self.header.version,
            metadata,
            start_time_estimated,
            timestamps,
            signal,
            truncated_bytes: self.truncated_bytes,
        })
    }

    fn next_record(&mut self) -> Option<Result<Record>> {
        if self.done {
            return None;
        }

        let filled = match fill(&mut self.inner, &mut self.buf) {
            Ok(n) => n,
            Err(e) => {
                self.done = true;
                return Some(Err(StreamLogError::Io(e)));
            }
        };

        if filled == 0 {
            self.done = true;
            return None;
        }
        if filled < self.record_len {
            self.done = true;
            self.truncated_bytes = filled;
            return Some(Err(StreamLogError::TruncatedRecord {
                complete_records: self.records_read,
                dangling_bytes: filled,
            }));
        }

        let mut ts = [0u8; TIMESTAMP_LEN];
        ts.copy_from_slice(&self.buf[..TIMESTAMP_LEN]);
        let encoding = self.header.encoding;
        let samples = self.buf[TIMESTAMP_LEN..]
            .chunks_exact(encoding.width())
            .map(|bytes| encoding.decode(bytes))
            .collect();

        self.records_read += 1;
        Some(Ok(Record {
            timestamp: f64::from_le_bytes(ts),
            samples,
        }))
    }
}

/// Streaming record iterator
pub struct Records<'a, R: Read> {
    reader: &'a mut ContainerReader<R>,
}

impl<R: Read> Iterator for Records<'_, R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next_record()
    }
}

/// Substitute a missing start time with the first record's timestamp
///
/// This is an approximation of the device start time, not a correction.
/// Returns true when the value was substituted.
pub fn repair_start_time(metadata: &mut ContainerMetadata, first_timestamp: Option<f64>) -> bool {
    match (metadata.start_time, first_timestamp) {
        (None, Some(first)) => {
            metadata.start_time = Some(first);
            true
        }
        _ => false,
    }
}

/// Read until `buf` is full or the source is exhausted
fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
