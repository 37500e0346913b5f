//! Event/trial logger
//!
//! Consumes control messages in arrival order, writes them to the `all` and
//! per-type tables, and segments them into trials:
//!
//! - `filename` updates the current file name in any phase
//! - `state == <recording sentinel>` while idle opens a trial
//! - any other `state` while in a trial closes it; the whole trial is queued
//!   for the trial table as one group
//! - `parameter` while in a trial is attached to it
//!
//! The mutable trial/file name state lives in [`SessionState`], passed
//! explicitly through [`SessionState::apply`].

use super::message::{EventMessage, MessageKind};
use super::table::{EventRow, EventTable};
use super::trial::{Trial, TrialEvent, TrialMarker, TrialRow};
use crate::config::{ensure_dir, LoggerConfig};
use crate::error::{Result, StreamLogError};
use crate::session::key::{SessionKey, TABLE_ALL, TABLE_TRIALS, TYPE_TABLES};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Trial segmentation phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrialPhase {
    /// No trial open
    #[default]
    Idle,
    /// A trial is open
    InTrial,
}

impl TrialPhase {
    /// Display name for the phase
    pub fn display_name(&self) -> &'static str {
        match self {
            TrialPhase::Idle => "Idle",
            TrialPhase::InTrial => "InTrial",
        }
    }
}

/// What a message did to the segmentation state
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Nothing changed
    None,
    /// The current file name changed
    FilenameChanged,
    /// A trial opened
    TrialStarted,
    /// A parameter was attached to the open trial
    EventAttached,
    /// The open trial closed
    TrialFinished(Trial),
}

/// Segmentation state of one logging session
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Most recent `filename` value
    pub current_filename: Option<String>,
    /// Trial being recorded
    pub current_trial: Option<Trial>,
}

impl SessionState {
    /// Current phase
    pub fn phase(&self) -> TrialPhase {
        if self.current_trial.is_some() {
            TrialPhase::InTrial
        } else {
            TrialPhase::Idle
        }
    }

    /// Feed one message through the state machine
    pub fn apply(&mut self, msg: &EventMessage, recording_state: &str) -> Transition {
        match &msg.kind {
            MessageKind::Filename(name) => {
                self.current_filename = name.clone();
                Transition::FilenameChanged
            }
            MessageKind::State(state) => {
                let recording = state == recording_state;
                match (self.current_trial.take(), recording) {
                    (None, true) => {
                        self.current_trial =
                            Some(Trial::open(msg.timestamp, self.current_filename.clone()));
                        Transition::TrialStarted
                    }
                    (Some(mut trial), false) => {
                        trial.end = Some(TrialMarker {
                            timestamp: msg.timestamp,
                            file: self.current_filename.clone(),
                        });
                        Transition::TrialFinished(trial)
                    }
                    (open, _) => {
                        self.current_trial = open;
                        Transition::None
                    }
                }
            }
            MessageKind::Parameter(_) => match self.current_trial.as_mut() {
                Some(trial) => {
                    trial.events.push(TrialEvent {
                        timestamp: msg.timestamp,
                        file: self.current_filename.clone(),
                        payload: msg.raw.clone(),
                    });
                    Transition::EventAttached
                }
                None => Transition::None,
            },
            MessageKind::Unknown { .. } => Transition::None,
        }
    }
}

/// Counters kept while logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoggerStats {
    /// Messages decoded and logged
    pub messages: u64,
    /// Payloads skipped as malformed
    pub malformed: u64,
    /// Trials closed by a recording end
    pub trials_completed: u64,
}

/// Result of shutting a logger down
#[derive(Debug, Clone, PartialEq)]
pub struct LoggerSummary {
    /// Session identifier the tables were written under
    pub session_id: String,
    /// Final counters
    pub stats: LoggerStats,
    /// Trial still open at shutdown, written without an end row
    pub unterminated_trial: Option<Trial>,
}

impl LoggerSummary {
    /// The reportable incomplete-trial condition, if any
    pub fn incomplete_trial_warning(&self) -> Option<String> {
        self.unterminated_trial.as_ref().map(|t| {
            format!(
                "session {}: trial started at {} was never closed",
                self.session_id,
                t.start_time()
            )
        })
    }
}

/// Writes control messages to event tables and segments them into trials
#[derive(Debug)]
pub struct TrialLogger {
    session_id: String,
    event_dir: PathBuf,
    recording_state: String,
    flush_every_message: bool,
    state: SessionState,
    all: EventTable<EventRow>,
    by_type: BTreeMap<&'static str, EventTable<EventRow>>,
    trials: EventTable<TrialRow>,
    stats: LoggerStats,
}

impl TrialLogger {
    /// Logger for a new session named after the current time
    pub fn create(config: &LoggerConfig) -> Result<Self> {
        let key = SessionKey::now(&config.session_suffix);
        Self::new(&config.event_dir, &key, config)
    }

    /// Logger writing the tables of session `key` into `event_dir`
    pub fn new(event_dir: impl AsRef<Path>, key: &SessionKey, config: &LoggerConfig) -> Result<Self> {
        config.validate()?;
        let event_dir = ensure_dir(event_dir)?;
        let capacity = config.buffer_capacity;

        let by_type = TYPE_TABLES
            .iter()
            .map(|&table| (table, EventTable::new(key.table_path(&event_dir, table), capacity)))
            .collect();

        tracing::info!(
            "Logging session {} to {:?} (recording state {:?})",
            key,
            event_dir,
            config.recording_state
        );

        Ok(Self {
            session_id: key.to_string(),
            all: EventTable::new(key.table_path(&event_dir, TABLE_ALL), capacity),
            trials: EventTable::new(key.table_path(&event_dir, TABLE_TRIALS), capacity),
            by_type,
            event_dir,
            recording_state: config.recording_state.clone(),
            flush_every_message: config.flush_every_message,
            state: SessionState::default(),
            stats: LoggerStats::default(),
        })
    }

    /// Decode and log one raw payload
    ///
    /// Malformed payloads are logged, counted and skipped; only table write
    /// failures are returned.
    pub fn handle_raw(&mut self, payload: &str, timestamp: f64) -> Result<Option<Transition>> {
        match EventMessage::decode(payload, timestamp) {
            Ok(msg) => self.handle(msg).map(Some),
            Err(e @ StreamLogError::MalformedMessage(_)) => {
                self.stats.malformed += 1;
                tracing::warn!("Skipping message at {}: {}", timestamp, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Log one decoded message and advance the trial state
    pub fn handle(&mut self, msg: EventMessage) -> Result<Transition> {
        let transition = self.state.apply(&msg, &self.recording_state);
        self.stats.messages += 1;

        let row = EventRow {
            timestamp: msg.timestamp,
            loop_timestamp: msg.loop_timestamp,
            name: msg.name.clone(),
            value: msg.value_text(),
            file: self.state.current_filename.clone(),
        };
        if let Some(table) = self.by_type.get_mut(msg.kind.table()) {
            table.push(row.clone())?;
        }
        self.all.push(row)?;

        match &transition {
            Transition::TrialStarted => {
                tracing::debug!("Trial started at {}", msg.timestamp);
            }
            Transition::TrialFinished(trial) => {
                self.stats.trials_completed += 1;
                tracing::info!(
                    "Trial {} finished: {} -> {} ({} events, file {:?})",
                    self.stats.trials_completed,
                    trial.start_time(),
                    msg.timestamp,
                    trial.events.len(),
                    trial.file()
                );
                self.trials.push_group(trial.rows())?;
            }
            Transition::None | Transition::FilenameChanged | Transition::EventAttached => {}
        }

        if self.flush_every_message {
            self.flush()?;
        }
        Ok(transition)
    }

    /// Append every non-empty buffer to its table
    ///
    /// Safe to call at any time; empty buffers are left alone.
    pub fn flush(&mut self) -> Result<()> {
        self.all.flush()?;
        for table in self.by_type.values_mut() {
            table.flush()?;
        }
        self.trials.flush()?;
        Ok(())
    }

    /// Final flush at shutdown
    ///
    /// A trial still open is written without an end row and reported in the
    /// summary.
    pub fn finish(mut self) -> Result<LoggerSummary> {
        let unterminated_trial = self.state.current_trial.take();
        if let Some(trial) = &unterminated_trial {
            tracing::warn!(
                "Session {}: trial started at {} still open at shutdown",
                self.session_id,
                trial.start_time()
            );
            self.trials.push_group(trial.rows())?;
        }
        self.flush()?;

        tracing::info!(
            "Closed session {}: {} messages, {} malformed, {} trials",
            self.session_id,
            self.stats.messages,
            self.stats.malformed,
            self.stats.trials_completed
        );

        Ok(LoggerSummary {
            session_id: self.session_id,
            stats: self.stats,
            unterminated_trial,
        })
    }

    /// Session identifier
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Directory holding the tables
    pub fn event_dir(&self) -> &Path {
        &self.event_dir
    }

    /// Current segmentation state
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Current counters
    pub fn stats(&self) -> LoggerStats {
        self.stats
    }

    /// Path of the trial table
    pub fn trials_path(&self) -> &Path {
        self.trials.path()
    }

    /// Path of the `all` table
    pub fn all_path(&self) -> &Path {
        self.all.path()
    }

    /// Path of a per-type table
    pub fn table_path(&self, table: &str) -> Option<&Path> {
        self.by_type.get(table).map(|t| t.path())
    }

    /// Rows buffered but not yet written, across all tables
    pub fn pending_rows(&self) -> usize {
        self.all.pending()
            + self.trials.pending()
            + self.by_type.values().map(EventTable::pending).sum::<usize>()
    }
}
