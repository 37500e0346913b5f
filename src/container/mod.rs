//! Binary stream container
//!
//! One container file holds one captured stream: a fixed header, a JSON
//! metadata block and an unbounded run of `(timestamp, samples)` records.
//!
//! # Layout (little-endian)
//!
//! | Field | Size |
//! |---|---|
//! | magic `LSLB` | 4 |
//! | format version | 4 |
//! | channel count | 4 |
//! | sample rate (f32) | 4 |
//! | encoding code (0 = f32, 1 = f64) | 4 |
//! | name length + name | 4 + N |
//! | metadata length + JSON | 4 + M |
//! | records: f64 timestamp + samples | repeated |

pub mod header;
pub mod reader;
pub mod writer;

pub use header::{ContainerHeader, ContainerMetadata, SampleEncoding};
pub use reader::{ContainerReader, LoadedContainer, Record};
pub use writer::{ContainerWriter, WriterStats};

use crate::error::{Result, StreamLogError};
use header::{default_channel_name, DEFAULT_UNIT, MAX_CHANNELS, METADATA_VERSION};

/// Description of a stream, as exposed by the transport that delivers it
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    /// Stream name
    pub name: String,
    /// Samples per record
    pub channel_count: usize,
    /// Nominal sample rate in Hz
    pub sample_rate: f32,
    /// Sample encoding on disk
    pub encoding: SampleEncoding,
    /// Channel labels (empty = generated)
    pub channel_names: Vec<String>,
    /// Channel units (empty = unknown)
    pub channel_units: Vec<String>,
    /// Producing device identifier
    pub source_id: String,
    /// Timestamp of the first sample, when known
    pub start_time: Option<f64>,
}

impl StreamInfo {
    /// Describe a stream with generated channel labels
    pub fn new(
        name: impl Into<String>,
        channel_count: usize,
        sample_rate: f32,
        encoding: SampleEncoding,
    ) -> Self {
        Self {
            name: name.into(),
            channel_count,
            sample_rate,
            encoding,
            channel_names: Vec::new(),
            channel_units: Vec::new(),
            source_id: String::new(),
            start_time: None,
        }
    }

    /// Set channel labels and units
    pub fn with_channels(mut self, names: Vec<String>, units: Vec<String>) -> Self {
        self.channel_names = names;
        self.channel_units = units;
        self
    }

    /// Set the source identifier
    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = source_id.into();
        self
    }

    /// Set the first-sample timestamp
    pub fn with_start_time(mut self, start_time: f64) -> Self {
        self.start_time = Some(start_time);
        self
    }

    /// Check the description before a container is created
    pub fn validate(&self) -> Result<()> {
        if self.channel_count == 0 {
            return Err(StreamLogError::Config(format!(
                "stream {:?} has no channels",
                self.name
            )));
        }
        if self.channel_count > MAX_CHANNELS as usize {
            return Err(StreamLogError::Config(format!(
                "stream {:?} has too many channels",
                self.name
            )));
        }
        for (what, list) in [
            ("channel names", &self.channel_names),
            ("channel units", &self.channel_units),
        ] {
            if !list.is_empty() && list.len() != self.channel_count {
                return Err(StreamLogError::Config(format!(
                    "stream {:?}: {} {} for {} channels",
                    self.name,
                    list.len(),
                    what,
                    self.channel_count
                )));
            }
        }
        Ok(())
    }

    /// Metadata block written for this stream
    pub fn metadata(&self) -> ContainerMetadata {
        let channel_names = if self.channel_names.is_empty() {
            (0..self.channel_count).map(default_channel_name).collect()
        } else {
            self.channel_names.clone()
        };
        let units = if self.channel_units.is_empty() {
            vec![DEFAULT_UNIT.to_string(); self.channel_count]
        } else {
            self.channel_units.clone()
        };

        ContainerMetadata {
            version: METADATA_VERSION,
            channel_names,
            units,
            source_id: self.source_id.clone(),
            start_time: self.start_time,
            extra: Default::default(),
        }
    }
}
