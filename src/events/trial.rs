//! Trials and their table rows

use super::table::TableRow;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event text of the row opening a trial
pub const RECORDING_START: &str = "Recording Start";

/// Event text of the row closing a trial
pub const RECORDING_END: &str = "Recording End";

/// A trial boundary
#[derive(Debug, Clone, PartialEq)]
pub struct TrialMarker {
    /// Stream-clock timestamp of the `state` message
    pub timestamp: f64,
    /// File name current at that moment
    pub file: Option<String>,
}

/// A parameter change observed during a trial
#[derive(Debug, Clone, PartialEq)]
pub struct TrialEvent {
    /// Stream-clock timestamp
    pub timestamp: f64,
    /// File name current at that moment
    pub file: Option<String>,
    /// The original message
    pub payload: Value,
}

/// Interval between a recording start and the matching recording end
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    /// Opening boundary
    pub start: TrialMarker,
    /// Closing boundary; `None` if the session ended mid-trial
    pub end: Option<TrialMarker>,
    /// Parameter changes in arrival order
    pub events: Vec<TrialEvent>,
}

impl Trial {
    /// Open a trial
    pub fn open(timestamp: f64, file: Option<String>) -> Self {
        Self {
            start: TrialMarker { timestamp, file },
            end: None,
            events: Vec::new(),
        }
    }

    /// Start timestamp
    pub fn start_time(&self) -> f64 {
        self.start.timestamp
    }

    /// End timestamp, if the trial was closed
    pub fn end_time(&self) -> Option<f64> {
        self.end.as_ref().map(|m| m.timestamp)
    }

    /// File name current when the trial opened
    pub fn file(&self) -> Option<&str> {
        self.start.file.as_deref()
    }

    /// Whether a recording end was seen
    pub fn is_complete(&self) -> bool {
        self.end.is_some()
    }

    /// Duration in stream-clock seconds, if closed
    pub fn duration(&self) -> Option<f64> {
        self.end_time().map(|end| end - self.start_time())
    }

    /// Rows for the trial table, in arrival order
    pub fn rows(&self) -> Vec<TrialRow> {
        let mut rows = Vec::with_capacity(self.events.len() + 2);
        rows.push(TrialRow {
            timestamp: self.start.timestamp,
            file: self.start.file.clone(),
            event: RECORDING_START.to_string(),
        });
        rows.extend(self.events.iter().map(|e| TrialRow {
            timestamp: e.timestamp,
            file: e.file.clone(),
            event: e.payload.to_string(),
        }));
        if let Some(end) = &self.end {
            rows.push(TrialRow {
                timestamp: end.timestamp,
                file: end.file.clone(),
                event: RECORDING_END.to_string(),
            });
        }
        rows
    }
}

/// One row of the trial table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRow {
    /// Stream-clock timestamp
    pub timestamp: f64,
    /// File name current at that moment
    pub file: Option<String>,
    /// Boundary text or encoded parameter message
    pub event: String,
}

impl TableRow for TrialRow {
    const HEADER: &'static [&'static str] = &["timestamp", "file", "event"];
}

/// Rebuild trials from trial-table rows
///
/// A start while a trial is still open leaves the earlier one unterminated.
/// Ends and events outside any trial are dropped with a warning.
pub fn trials_from_rows(rows: impl IntoIterator<Item = TrialRow>) -> Vec<Trial> {
    let mut trials = Vec::new();
    let mut open: Option<Trial> = None;

    for row in rows {
        match row.event.as_str() {
            RECORDING_START => {
                if let Some(unterminated) = open.take() {
                    tracing::warn!(
                        "Trial starting at {} has no end row",
                        unterminated.start_time()
                    );
                    trials.push(unterminated);
                }
                open = Some(Trial::open(row.timestamp, row.file));
            }
            RECORDING_END => match open.take() {
                Some(mut trial) => {
                    trial.end = Some(TrialMarker {
                        timestamp: row.timestamp,
                        file: row.file,
                    });
                    trials.push(trial);
                }
                None => tracing::warn!("End row at {} outside any trial", row.timestamp),
            },
            encoded => match open.as_mut() {
                Some(trial) => {
                    let payload = serde_json::from_str(encoded)
                        .unwrap_or_else(|_| Value::String(encoded.to_string()));
                    trial.events.push(TrialEvent {
                        timestamp: row.timestamp,
                        file: row.file,
                        payload,
                    });
                }
                None => tracing::warn!("Event row at {} outside any trial", row.timestamp),
            },
        }
    }

    trials.extend(open);
    trials
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_trial() -> Trial {
        let mut trial = Trial::open(1.0, Some("run01".into()));
        trial.events.push(TrialEvent {
            timestamp: 1.5,
            file: Some("run01".into()),
            payload: json!({"name": "parameter", "value": {"amp": 3}}),
        });
        trial.end = Some(TrialMarker {
            timestamp: 2.0,
            file: Some("run01".into()),
        });
        trial
    }

    #[test]
    fn test_rows_order() {
        let rows = sample_trial().rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].event, RECORDING_START);
        assert_eq!(rows[2].event, RECORDING_END);
    }

    #[test]
    fn test_rows_rebuild_trial() {
        let trial = sample_trial();
        let rebuilt = trials_from_rows(trial.rows());
        assert_eq!(rebuilt, vec![trial]);
    }

    #[test]
    fn test_unterminated_trial_kept() {
        let mut trial = sample_trial();
        trial.end = None;
        let mut rows = trial.rows();
        rows.extend(sample_trial().rows());

        let rebuilt = trials_from_rows(rows);
        assert_eq!(rebuilt.len(), 2);
        assert!(!rebuilt[0].is_complete());
        assert!(rebuilt[1].is_complete());
        assert_eq!(rebuilt[1].duration(), Some(1.0));
    }

    #[test]
    fn test_stray_rows_dropped() {
        let rows = vec![
            TrialRow {
                timestamp: 0.5,
                file: None,
                event: RECORDING_END.to_string(),
            },
            TrialRow {
                timestamp: 0.6,
                file: None,
                event: "{}".to_string(),
            },
        ];
        assert!(trials_from_rows(rows).is_empty());
    }
}
