//! Test data builders for containers and event sessions

use std::path::{Path, PathBuf};
use streamlog_rs::{
    config::LoggerConfig, ContainerWriter, LoggerSummary, SampleEncoding, SessionKey, StreamInfo,
    TrialLogger,
};

/// Builder for container files
pub struct StreamBuilder {
    info: StreamInfo,
    timestamps: Vec<f64>,
}

impl StreamBuilder {
    pub fn new(name: &str, channel_count: usize) -> Self {
        Self {
            info: StreamInfo::new(name, channel_count, 100.0, SampleEncoding::F64),
            timestamps: Vec::new(),
        }
    }

    pub fn encoding(mut self, encoding: SampleEncoding) -> Self {
        self.info.encoding = encoding;
        self
    }

    pub fn channels(mut self, names: &[&str], units: &[&str]) -> Self {
        self.info = self.info.with_channels(
            names.iter().map(|s| s.to_string()).collect(),
            units.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn timestamps(mut self, timestamps: &[f64]) -> Self {
        self.timestamps = timestamps.to_vec();
        self
    }

    /// Sample value of `channel` in record `index`
    pub fn sample(index: usize, channel: usize) -> f64 {
        (index * 10 + channel) as f64
    }

    /// Write the container, one record per timestamp
    pub fn write(self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref().to_path_buf();
        let mut info = self.info;
        if let Some(&first) = self.timestamps.first() {
            info = info.with_start_time(first);
        }
        let mut writer = ContainerWriter::create(&path, &info).unwrap();
        for (i, &t) in self.timestamps.iter().enumerate() {
            let samples: Vec<f64> = (0..info.channel_count).map(|c| Self::sample(i, c)).collect();
            writer.append(t, &samples).unwrap();
        }
        writer.close().unwrap();
        path
    }
}

/// Builder for event sessions replayed through a logger
pub struct SessionBuilder {
    key: SessionKey,
    config: LoggerConfig,
    messages: Vec<(String, f64)>,
}

impl SessionBuilder {
    pub fn new(key: SessionKey) -> Self {
        Self {
            key,
            config: LoggerConfig::default(),
            messages: Vec::new(),
        }
    }

    pub fn buffered(mut self, capacity: usize) -> Self {
        self.config.flush_every_message = false;
        self.config.buffer_capacity = capacity;
        self
    }

    pub fn message(mut self, payload: impl Into<String>, timestamp: f64) -> Self {
        self.messages.push((payload.into(), timestamp));
        self
    }

    /// Log every message into `event_dir` and close the session
    pub fn write(self, event_dir: impl AsRef<Path>) -> LoggerSummary {
        let mut logger = TrialLogger::new(event_dir, &self.key, &self.config).unwrap();
        for (payload, timestamp) in &self.messages {
            logger.handle_raw(payload, *timestamp).unwrap();
        }
        logger.finish().unwrap()
    }
}
