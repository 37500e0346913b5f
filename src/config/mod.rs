//! Configuration module for streamlog-rs
//!
//! This module handles logger configuration:
//! - Output directories for containers and event tables
//! - Trial segmentation settings (recording sentinel, session suffix)
//! - Buffering and channel capacities for the capture workers
//!
//! # Config Location
//!
//! The default configuration file lives in the platform config directory
//! under `dev.streamlog.streamlog-rs`:
//!
//! - **Linux**: `~/.config/dev.streamlog.streamlog-rs/config.toml`
//! - **macOS**: `~/Library/Application Support/dev.streamlog.streamlog-rs/config.toml`
//! - **Windows**: `%APPDATA%\dev.streamlog.streamlog-rs\config.toml`
//!
//! # Example
//!
//! ```ignore
//! use streamlog_rs::config::LoggerConfig;
//!
//! let mut config = LoggerConfig::load_or_default();
//! config.session_suffix = "S01".to_string();
//! config.save(LoggerConfig::default_path().unwrap())?;
//! ```

use crate::container::SampleEncoding;
use crate::error::{Result, StreamLogError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "dev.streamlog.streamlog-rs";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// State value that marks an active recording
pub const DEFAULT_RECORDING_STATE: &str = "rec";

/// Session suffix used when none is given
pub const DEFAULT_SESSION_SUFFIX: &str = "DEFAULT";

/// Default number of rows an event table buffers before it is forced to flush
pub const DEFAULT_BUFFER_CAPACITY: usize = 256;

/// Default capacity of the channel feeding a capture worker
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

// ==================== Config Directory ====================

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Ensure a directory exists, creating it and its parents if needed
pub fn ensure_dir(dir: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = dir.as_ref();
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| {
            StreamLogError::Config(format!("Failed to create directory {:?}: {}", dir, e))
        })?;
    }
    Ok(dir.to_path_buf())
}

// ==================== Logger Config ====================

/// Configuration for the capture and event logging paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Directory receiving binary stream containers
    pub stream_dir: PathBuf,

    /// Directory receiving event tables
    pub event_dir: PathBuf,

    /// `state` value that opens a trial
    pub recording_state: String,

    /// Human-readable suffix appended to session identifiers
    pub session_suffix: String,

    /// Rows an event table holds before a forced flush
    pub buffer_capacity: usize,

    /// Flush every table after each classified message
    pub flush_every_message: bool,

    /// Capacity of the bounded channel feeding each capture worker
    pub channel_capacity: usize,

    /// Sample encoding used when a stream does not dictate one
    pub default_encoding: SampleEncoding,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            stream_dir: PathBuf::from("logs").join("streams"),
            event_dir: PathBuf::from("logs").join("metadata"),
            recording_state: DEFAULT_RECORDING_STATE.to_string(),
            session_suffix: DEFAULT_SESSION_SUFFIX.to_string(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            flush_every_message: true,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            default_encoding: SampleEncoding::F32,
        }
    }
}

impl LoggerConfig {
    /// Path of the default config file
    pub fn default_path() -> Option<PathBuf> {
        config_dir().map(|p| p.join(CONFIG_FILE))
    }

    /// Load a config file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            StreamLogError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            StreamLogError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load the default config file, returning defaults on any error
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the config to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                ensure_dir(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| StreamLogError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| StreamLogError::Config(format!("Failed to write config: {}", e)))
    }

    /// Check that the values are usable
    pub fn validate(&self) -> Result<()> {
        if self.recording_state.is_empty() {
            return Err(StreamLogError::Config(
                "recording_state must not be empty".to_string(),
            ));
        }
        if self.buffer_capacity == 0 {
            return Err(StreamLogError::Config(
                "buffer_capacity must be at least 1".to_string(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(StreamLogError::Config(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
