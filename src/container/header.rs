//! Container header and metadata block
//!
//! The header is a fixed little-endian prefix followed by the stream name;
//! the metadata block is a length-prefixed JSON object whose own `version`
//! field governs which keys are guaranteed present.

use crate::error::{Result, StreamLogError};
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Magic constant opening every container file
pub const MAGIC: [u8; 4] = *b"LSLB";

/// Format-level header version
pub const FORMAT_VERSION: u32 = 1;

/// Metadata version written by this crate
pub const METADATA_VERSION: u32 = 2;

/// Metadata version assumed when the block carries no `version` key
pub const LEGACY_METADATA_VERSION: u32 = 1;

/// Size of the fixed header part preceding the stream name
pub const FIXED_HEADER_LEN: usize = 24;

/// Size of one record timestamp
pub const TIMESTAMP_LEN: usize = 8;

/// Largest channel count accepted by the reader and writer
pub const MAX_CHANNELS: u32 = 65_536;

/// Largest stream name accepted by the reader
pub const MAX_NAME_LEN: usize = 64 * 1024;

/// Largest metadata block accepted by the reader
pub const MAX_METADATA_LEN: usize = 16 * 1024 * 1024;

/// Fixed-width floating point format used for samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleEncoding {
    /// 32-bit IEEE float (code 0)
    #[default]
    F32,
    /// 64-bit IEEE float (code 1)
    F64,
}

impl SampleEncoding {
    /// Numeric tag stored in the header
    pub fn code(&self) -> u32 {
        match self {
            SampleEncoding::F32 => 0,
            SampleEncoding::F64 => 1,
        }
    }

    /// Decode a header tag
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            0 => Ok(SampleEncoding::F32),
            1 => Ok(SampleEncoding::F64),
            other => Err(StreamLogError::UnsupportedEncoding(other)),
        }
    }

    /// Bytes per sample
    pub fn width(&self) -> usize {
        match self {
            SampleEncoding::F32 => 4,
            SampleEncoding::F64 => 8,
        }
    }

    /// Size of one record (timestamp + sample vector)
    pub fn record_len(&self, channel_count: usize) -> usize {
        TIMESTAMP_LEN + channel_count * self.width()
    }

    /// Append one sample in this encoding
    pub(crate) fn encode_into(&self, value: f64, out: &mut Vec<u8>) {
        match self {
            SampleEncoding::F32 => out.extend_from_slice(&(value as f32).to_le_bytes()),
            SampleEncoding::F64 => out.extend_from_slice(&value.to_le_bytes()),
        }
    }

    /// Decode one sample; `bytes` must be exactly `width()` long
    pub(crate) fn decode(&self, bytes: &[u8]) -> f64 {
        match self {
            SampleEncoding::F32 => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(bytes);
                f64::from(f32::from_le_bytes(buf))
            }
            SampleEncoding::F64 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                f64::from_le_bytes(buf)
            }
        }
    }

    /// Display name
    pub fn display_name(&self) -> &'static str {
        match self {
            SampleEncoding::F32 => "float32",
            SampleEncoding::F64 => "float64",
        }
    }
}

/// Fixed header of a container
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerHeader {
    /// Format version from the header
    pub version: u32,
    /// Number of samples per record
    pub channel_count: u32,
    /// Nominal sample rate in Hz (0 for irregular streams)
    pub sample_rate: f32,
    /// Sample encoding
    pub encoding: SampleEncoding,
    /// Stream name
    pub name: String,
}

impl ContainerHeader {
    /// Serialize the header including the stream name
    pub fn encode(&self) -> Vec<u8> {
        let name = self.name.as_bytes();
        let mut out = Vec::with_capacity(FIXED_HEADER_LEN + name.len());
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.channel_count.to_le_bytes());
        out.extend_from_slice(&self.sample_rate.to_le_bytes());
        out.extend_from_slice(&self.encoding.code().to_le_bytes());
        out.extend_from_slice(&(name.len() as u32).to_le_bytes());
        out.extend_from_slice(name);
        out
    }

    /// Parse the header from the start of a container
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut fixed = [0u8; FIXED_HEADER_LEN];
        read_exact_or_format(reader, &mut fixed, "header")?;

        if fixed[0..4] != MAGIC {
            return Err(StreamLogError::Format(format!(
                "bad magic {:02X?}, expected {:02X?}",
                &fixed[0..4],
                MAGIC
            )));
        }

        let version = le_u32(&fixed[4..8]);
        let channel_count = le_u32(&fixed[8..12]);
        let sample_rate = f32::from_le_bytes([fixed[12], fixed[13], fixed[14], fixed[15]]);
        let encoding = SampleEncoding::from_code(le_u32(&fixed[16..20]))?;
        let name_len = le_u32(&fixed[20..24]) as usize;

        if channel_count == 0 {
            return Err(StreamLogError::Format("channel count is zero".to_string()));
        }
        if channel_count > MAX_CHANNELS {
            return Err(StreamLogError::Format(format!(
                "channel count {} exceeds {}",
                channel_count, MAX_CHANNELS
            )));
        }
        if name_len > MAX_NAME_LEN {
            return Err(StreamLogError::Format(format!(
                "stream name length {} exceeds {}",
                name_len, MAX_NAME_LEN
            )));
        }

        let mut name = vec![0u8; name_len];
        read_exact_or_format(reader, &mut name, "stream name")?;
        let name = String::from_utf8(name)
            .map_err(|e| StreamLogError::Format(format!("stream name is not UTF-8: {}", e)))?;

        Ok(Self {
            version,
            channel_count,
            sample_rate,
            encoding,
            name,
        })
    }
}

/// Channel metadata block
///
/// Keys this crate does not know are kept in `extra` and written back
/// unchanged, so newer writers' fields survive a read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerMetadata {
    /// Metadata version (independent from the header version)
    #[serde(default = "legacy_metadata_version")]
    pub version: u32,

    /// Channel labels in record order
    #[serde(default)]
    pub channel_names: Vec<String>,

    /// Channel units in record order
    #[serde(default)]
    pub units: Vec<String>,

    /// Identifier of the producing device/stream
    #[serde(default)]
    pub source_id: String,

    /// Stream-clock timestamp of the first sample
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,

    /// Fields written by other versions
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn legacy_metadata_version() -> u32 {
    LEGACY_METADATA_VERSION
}

impl ContainerMetadata {
    /// Serialize as a length-prefixed JSON block
    pub fn encode(&self) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(self)?;
        let mut out = Vec::with_capacity(4 + json.len());
        out.extend_from_slice(&(json.len() as u32).to_le_bytes());
        out.extend_from_slice(&json);
        Ok(out)
    }

    /// Parse the length-prefixed JSON block
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut len = [0u8; 4];
        read_exact_or_format(reader, &mut len, "metadata length")?;
        let len = u32::from_le_bytes(len) as usize;
        if len > MAX_METADATA_LEN {
            return Err(StreamLogError::Format(format!(
                "metadata length {} exceeds {}",
                len, MAX_METADATA_LEN
            )));
        }

        let mut block = vec![0u8; len];
        read_exact_or_format(reader, &mut block, "metadata block")?;
        serde_json::from_slice(&block)
            .map_err(|e| StreamLogError::Format(format!("metadata is not valid JSON: {}", e)))
    }

    /// Pad or cut channel labels to `channel_count` entries
    ///
    /// Returns true when anything had to change.
    pub fn normalize_channels(&mut self, channel_count: usize) -> bool {
        let mut changed = false;
        if self.channel_names.len() != channel_count {
            changed = true;
            self.channel_names.truncate(channel_count);
            let have = self.channel_names.len();
            self.channel_names
                .extend((have..channel_count).map(default_channel_name));
        }
        if self.units.len() != channel_count {
            changed = true;
            self.units.truncate(channel_count);
            self.units.resize(channel_count, DEFAULT_UNIT.to_string());
        }
        changed
    }
}

/// Unit recorded for channels without one
pub const DEFAULT_UNIT: &str = "unknown";

/// Label recorded for channels without one
pub fn default_channel_name(index: usize) -> String {
    format!("ch{}", index)
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn read_exact_or_format<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            StreamLogError::Format(format!("file ends inside {}", what))
        } else {
            StreamLogError::Io(e)
        }
    })
}
