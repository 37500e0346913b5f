//! Sample stream capture

use super::worker::{Sink, WorkerHandle};
use crate::config::{LoggerConfig, DEFAULT_CHANNEL_CAPACITY};
use crate::container::{ContainerWriter, StreamInfo, WriterStats};
use crate::error::{Result, StreamLogError};
use std::path::{Path, PathBuf};

/// A batch of records as delivered by the transport
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleChunk {
    /// One timestamp per record
    pub timestamps: Vec<f64>,
    /// One sample vector per record
    pub rows: Vec<Vec<f64>>,
}

impl SampleChunk {
    /// Chunk from parallel timestamp and row lists
    pub fn new(timestamps: Vec<f64>, rows: Vec<Vec<f64>>) -> Self {
        Self { timestamps, rows }
    }

    /// Chunk holding a single record
    pub fn single(timestamp: f64, samples: Vec<f64>) -> Self {
        Self {
            timestamps: vec![timestamp],
            rows: vec![samples],
        }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether the chunk holds no record
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Outcome of a finished sample capture
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureReport {
    /// Container path
    pub path: PathBuf,
    /// Whether the container was created (false if no record ever arrived)
    pub created: bool,
    /// Timestamp of the first record written
    pub start_time: Option<f64>,
    /// Chunks written
    pub chunks: u64,
    /// Chunks refused because a row had the wrong number of samples
    pub rejected_chunks: u64,
    /// Records and bytes written
    pub stats: WriterStats,
}

struct StreamSink {
    path: PathBuf,
    info: StreamInfo,
    writer: Option<ContainerWriter>,
    start_time: Option<f64>,
    chunks: u64,
    rejected_chunks: u64,
}

impl StreamSink {
    fn writer_for(&mut self, first_timestamp: f64) -> Result<&mut ContainerWriter> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => {
                let mut info = self.info.clone();
                let start_time = *info.start_time.get_or_insert(first_timestamp);
                let writer = ContainerWriter::create(&self.path, &info)?;
                tracing::info!(
                    "Recording {:?} to {:?} from t={}",
                    info.name,
                    self.path,
                    start_time
                );
                self.start_time = Some(start_time);
                writer
            }
        };
        Ok(self.writer.insert(writer))
    }

    fn reject(&mut self, chunk: &SampleChunk, e: StreamLogError) -> Result<()> {
        tracing::warn!("{:?}: dropping chunk of {} records: {}", self.path, chunk.len(), e);
        self.rejected_chunks += 1;
        Ok(())
    }
}

/// One row per timestamp, `channel_count` samples per row
fn chunk_shape(chunk: &SampleChunk, channel_count: usize) -> Result<()> {
    if chunk.timestamps.len() != chunk.rows.len() {
        return Err(StreamLogError::Encoding {
            expected: chunk.timestamps.len(),
            actual: chunk.rows.len(),
        });
    }
    match chunk.rows.iter().find(|row| row.len() != channel_count) {
        Some(row) => Err(StreamLogError::Encoding {
            expected: channel_count,
            actual: row.len(),
        }),
        None => Ok(()),
    }
}

impl Sink<SampleChunk> for StreamSink {
    type Report = CaptureReport;

    fn consume(&mut self, chunk: SampleChunk) -> Result<()> {
        let Some(&first) = chunk.timestamps.first() else {
            return Ok(());
        };
        // Checked before the first chunk can fix the container start time
        if let Err(e) = chunk_shape(&chunk, self.info.channel_count) {
            return self.reject(&chunk, e);
        }
        let writer = self.writer_for(first)?;
        match writer.append_chunk(&chunk.timestamps, &chunk.rows) {
            Ok(()) => {
                self.chunks += 1;
                Ok(())
            }
            Err(e @ StreamLogError::Encoding { .. }) => self.reject(&chunk, e),
            Err(e) => Err(e),
        }
    }

    fn finish(self) -> Result<CaptureReport> {
        let (created, stats) = match self.writer {
            Some(writer) => (true, writer.close()?),
            None => {
                tracing::warn!("{:?}: no samples received, nothing written", self.path);
                (false, WriterStats::default())
            }
        };
        Ok(CaptureReport {
            path: self.path,
            created,
            start_time: self.start_time,
            chunks: self.chunks,
            rejected_chunks: self.rejected_chunks,
            stats,
        })
    }

    fn abort(self) {
        if let Some(writer) = self.writer {
            if let Err(e) = writer.close() {
                tracing::warn!("{:?}: close after failure: {}", self.path, e);
            }
        }
    }
}

/// Records one sample stream into a container on a dedicated thread
#[derive(Debug)]
pub struct SampleCapture {
    path: PathBuf,
    handle: WorkerHandle<SampleChunk, CaptureReport>,
}

impl SampleCapture {
    /// Start capturing into `path`; the file is created with the first chunk
    pub fn spawn(path: impl Into<PathBuf>, info: StreamInfo) -> Result<Self> {
        Self::with_capacity(path, info, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Start capturing with the channel capacity of `config`
    pub fn from_config(path: impl Into<PathBuf>, info: StreamInfo, config: &LoggerConfig) -> Result<Self> {
        Self::with_capacity(path, info, config.channel_capacity)
    }

    /// Start capturing with an explicit channel capacity (in chunks)
    pub fn with_capacity(path: impl Into<PathBuf>, info: StreamInfo, capacity: usize) -> Result<Self> {
        info.validate()?;
        let path = path.into();
        let sink = StreamSink {
            path: path.clone(),
            info: info.clone(),
            writer: None,
            start_time: None,
            chunks: 0,
            rejected_chunks: 0,
        };
        let handle = WorkerHandle::spawn(format!("capture-{}", info.name), capacity, sink)?;
        Ok(Self { path, handle })
    }

    /// Queue a chunk
    ///
    /// Fails with [`StreamLogError::Channel`] once stopped or after the
    /// worker ended on a write error.
    pub fn push(&self, chunk: SampleChunk) -> Result<()> {
        self.handle.push(chunk)
    }

    /// Queue a single record
    pub fn push_sample(&self, timestamp: f64, samples: Vec<f64>) -> Result<()> {
        self.push(SampleChunk::single(timestamp, samples))
    }

    /// Container path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `stop` has been requested
    pub fn is_stopped(&self) -> bool {
        self.handle.is_stopped()
    }

    /// Chunks waiting to be written
    pub fn queued(&self) -> usize {
        self.handle.queued()
    }

    /// Write everything already queued, close the container and report
    pub fn stop(self) -> Result<CaptureReport> {
        self.handle.stop()
    }
}
