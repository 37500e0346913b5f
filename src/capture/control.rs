//! Control stream capture

use super::worker::{Sink, WorkerHandle};
use crate::config::DEFAULT_CHANNEL_CAPACITY;
use crate::error::Result;
use crate::events::{LoggerSummary, TrialLogger};

/// One control message as delivered by the transport
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    /// JSON payload
    pub payload: String,
    /// Arrival timestamp (stream clock)
    pub timestamp: f64,
}

impl RawMessage {
    /// Message with the given payload and timestamp
    pub fn new(payload: impl Into<String>, timestamp: f64) -> Self {
        Self {
            payload: payload.into(),
            timestamp,
        }
    }
}

struct LoggerSink(TrialLogger);

impl Sink<RawMessage> for LoggerSink {
    type Report = LoggerSummary;

    fn consume(&mut self, msg: RawMessage) -> Result<()> {
        self.0.handle_raw(&msg.payload, msg.timestamp).map(|_| ())
    }

    fn finish(self) -> Result<LoggerSummary> {
        let summary = self.0.finish()?;
        if let Some(warning) = summary.incomplete_trial_warning() {
            tracing::warn!("{}", warning);
        }
        Ok(summary)
    }

    fn abort(mut self) {
        if let Err(e) = self.0.flush() {
            tracing::warn!("Session {}: flush after failure: {}", self.0.session_id(), e);
        }
    }
}

/// Logs control messages of one session on a dedicated thread
#[derive(Debug)]
pub struct EventCapture {
    session_id: String,
    handle: WorkerHandle<RawMessage, LoggerSummary>,
}

impl EventCapture {
    /// Start logging into `logger`
    pub fn spawn(logger: TrialLogger) -> Result<Self> {
        Self::with_capacity(logger, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Start logging with an explicit channel capacity (in messages)
    pub fn with_capacity(logger: TrialLogger, capacity: usize) -> Result<Self> {
        let session_id = logger.session_id().to_string();
        let handle = WorkerHandle::spawn(format!("events-{}", session_id), capacity, LoggerSink(logger))?;
        Ok(Self { session_id, handle })
    }

    /// Queue a message
    pub fn push(&self, msg: RawMessage) -> Result<()> {
        self.handle.push(msg)
    }

    /// Session identifier
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Whether `stop` has been requested
    pub fn is_stopped(&self) -> bool {
        self.handle.is_stopped()
    }

    /// Log everything already queued, write the tables and report
    pub fn stop(self) -> Result<LoggerSummary> {
        self.handle.stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoggerConfig;
    use crate::events::{read_rows, trials_from_rows, TrialRow};
    use crate::session::SessionKey;
    use chrono::{TimeZone, Utc};

    fn logger(dir: &std::path::Path) -> TrialLogger {
        let key = SessionKey::at(Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap(), "CAP");
        let config = LoggerConfig {
            flush_every_message: false,
            ..LoggerConfig::default()
        };
        TrialLogger::new(dir, &key, &config).unwrap()
    }

    #[test]
    fn test_stop_flushes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let logger = logger(dir.path());
        let trials_path = logger.trials_path().to_path_buf();
        let capture = EventCapture::spawn(logger).unwrap();

        capture.push(RawMessage::new(r#"{"name":"state","value":"rec"}"#, 1.0)).unwrap();
        capture.push(RawMessage::new(r#"{"name":"parameter","value":3}"#, 1.5)).unwrap();
        capture.push(RawMessage::new(r#"{"name":"state","value":"idle"}"#, 2.0)).unwrap();
        capture.push(RawMessage::new("garbage", 2.5)).unwrap();
        capture.push(RawMessage::new(r#"{"name":"state","value":"rec"}"#, 3.0)).unwrap();

        let summary = capture.stop().unwrap();
        assert_eq!(summary.session_id, "20250301_080000_CAP");
        assert_eq!(summary.stats.messages, 4);
        assert_eq!(summary.stats.malformed, 1);
        assert_eq!(summary.stats.trials_completed, 1);
        assert!(summary.unterminated_trial.is_some());

        let rows: Vec<TrialRow> = read_rows(&trials_path).unwrap();
        let trials = trials_from_rows(rows);
        assert_eq!(trials.len(), 2);
        assert!(trials[0].is_complete());
        assert!(!trials[1].is_complete());
    }

    #[test]
    fn test_stop_reports_open_trial() {
        let dir = tempfile::tempdir().unwrap();
        let capture = EventCapture::spawn(logger(dir.path())).unwrap();
        assert!(!capture.is_stopped());
        capture.push(RawMessage::new(r#"{"name":"state","value":"rec"}"#, 1.0)).unwrap();
        let summary = capture.stop().unwrap();
        assert_eq!(summary.stats.messages, 1);
        assert!(summary.incomplete_trial_warning().is_some());
    }
}
