//! # streamlog-rs: multi-stream recording with trial segmentation
//!
//! Records independently clocked sample streams into self-describing binary
//! containers, logs the control stream of an experiment into CSV event tables
//! segmented into trials, and joins both back together offline.
//!
//! ## Architecture
//!
//! - **Container**: Length-prefixed header, JSON metadata and fixed-size
//!   records; written atomically, read back tolerant of a truncated tail
//! - **Events**: Control messages classified by name, buffered into bounded
//!   CSV tables and segmented into trials by a recording-state sentinel
//! - **Session**: Resolves session keys and slices the signal per trial
//! - **Capture**: Dedicated writer threads fed by bounded crossbeam channels
//!
//! ## Configuration
//!
//! Defaults for directories and logging behaviour are read from
//! `config.toml` in the platform config directory under
//! `dev.streamlog.streamlog-rs`:
//!
//! - **Linux**: `~/.config/dev.streamlog.streamlog-rs/`
//! - **macOS**: `~/Library/Application Support/dev.streamlog.streamlog-rs/`
//! - **Windows**: `%APPDATA%\dev.streamlog.streamlog-rs\`
//!
//! ## Example
//!
//! ```no_run
//! use streamlog_rs::{
//!     capture::{EventCapture, RawMessage, SampleCapture, SampleChunk},
//!     config::LoggerConfig,
//!     container::{SampleEncoding, StreamInfo},
//!     events::TrialLogger,
//!     session::SessionJoiner,
//! };
//!
//! fn main() -> streamlog_rs::Result<()> {
//!     let config = LoggerConfig::load_or_default();
//!
//!     let info = StreamInfo::new("EEG", 8, 250.0, SampleEncoding::F32);
//!     let samples = SampleCapture::spawn("logs/streams/20250101_100000_EEG.bin", info)?;
//!     let events = EventCapture::spawn(TrialLogger::create(&config)?)?;
//!
//!     events.push(RawMessage::new(r#"{"name":"state","value":"rec"}"#, 0.1))?;
//!     samples.push(SampleChunk::single(0.1, vec![0.0; 8]))?;
//!     events.push(RawMessage::new(r#"{"name":"state","value":"idle"}"#, 0.2))?;
//!
//!     samples.stop()?;
//!     let summary = events.stop()?;
//!
//!     let session = SessionJoiner::from_config(&config).load("20250101_100000", &summary.session_id)?;
//!     for segment in session.segments() {
//!         println!("trial {}: {} samples", segment.trial_index, segment.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod capture;
pub mod config;
pub mod container;
pub mod error;
pub mod events;
pub mod session;

// Re-export commonly used types
pub use capture::{CaptureReport, EventCapture, RawMessage, SampleCapture, SampleChunk};
pub use config::LoggerConfig;
pub use container::{
    ContainerMetadata, ContainerReader, ContainerWriter, LoadedContainer, SampleEncoding, StreamInfo,
};
pub use error::{Result, StreamLogError};
pub use events::{EventMessage, LoggerSummary, Trial, TrialLogger};
pub use session::{Session, SessionJoiner, SessionKey, TrialSegment};
