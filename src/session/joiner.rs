//! Session joiner
//!
//! Pairs a container from the stream directory with the event tables of a
//! session from the event directory, and slices the signal per trial.

use super::key::{event_table_path, find_container, SessionCatalog, TABLE_TRIALS, TYPE_TABLES};
use super::types::Session;
use crate::config::LoggerConfig;
use crate::container::ContainerReader;
use crate::error::{Result, ResultExt};
use crate::events::{read_rows, trials_from_rows, EventRow, Trial, TrialRow};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Event data of one logging session
#[derive(Debug, Clone, Default)]
pub struct SessionEvents {
    /// Resolved session identifier
    pub session_id: String,
    /// Trials in table order
    pub trials: Vec<Trial>,
    /// Per-type tables that exist
    pub tables: BTreeMap<String, Vec<EventRow>>,
}

/// Loads sessions from a stream directory and an event directory
#[derive(Debug, Clone)]
pub struct SessionJoiner {
    stream_dir: PathBuf,
    event_dir: PathBuf,
}

impl SessionJoiner {
    /// Joiner over explicit directories
    pub fn new(stream_dir: impl Into<PathBuf>, event_dir: impl Into<PathBuf>) -> Self {
        Self {
            stream_dir: stream_dir.into(),
            event_dir: event_dir.into(),
        }
    }

    /// Joiner over the directories of a logger config
    pub fn from_config(config: &LoggerConfig) -> Self {
        Self::new(&config.stream_dir, &config.event_dir)
    }

    /// Directory holding containers
    pub fn stream_dir(&self) -> &Path {
        &self.stream_dir
    }

    /// Directory holding event tables
    pub fn event_dir(&self) -> &Path {
        &self.event_dir
    }

    /// Sessions present in the event directory
    pub fn catalog(&self) -> Result<SessionCatalog> {
        SessionCatalog::scan(&self.event_dir)
    }

    /// Load the container matching `stream_key` and the session matching
    /// `event_key` (identifier, suffix or timestamp)
    pub fn load(&self, stream_key: &str, event_key: &str) -> Result<Session> {
        let path = find_container(&self.stream_dir, stream_key)?;
        let container = ContainerReader::load(&path)
            .with_context(|| format!("Failed to load container {:?}", path))?;
        if let Some(truncation) = container.truncation() {
            tracing::warn!("{:?}: {}", path, truncation);
        }

        let events = self.load_events(event_key)?;
        tracing::info!(
            "Joined {:?} ({} records) with session {} ({} trials)",
            path,
            container.record_count(),
            events.session_id,
            events.trials.len()
        );

        Ok(Session::from_parts(
            events.session_id,
            container,
            events.trials,
            events.tables,
        ))
    }

    /// Load only the event tables of a session
    pub fn load_events(&self, event_key: &str) -> Result<SessionEvents> {
        let session_id = self.catalog()?.resolve(event_key)?;
        load_session_events(&self.event_dir, &session_id)
    }
}

/// Read the trial and per-type tables of `session_id`; missing tables are
/// treated as empty
pub fn load_session_events(event_dir: &Path, session_id: &str) -> Result<SessionEvents> {
    let trials_path = event_table_path(event_dir, session_id, TABLE_TRIALS);
    let trials = if trials_path.exists() {
        read_trials(&trials_path)?
    } else {
        tracing::debug!("Session {} has no trial table", session_id);
        Vec::new()
    };

    let mut tables = BTreeMap::new();
    for table in TYPE_TABLES {
        let path = event_table_path(event_dir, session_id, table);
        if !path.exists() {
            continue;
        }
        let rows: Vec<EventRow> =
            read_rows(&path).with_context(|| format!("Failed to read {:?}", path))?;
        tables.insert(table.to_string(), rows);
    }

    Ok(SessionEvents {
        session_id: session_id.to_string(),
        trials,
        tables,
    })
}

/// Parse a trial table back into trials
pub fn read_trials(path: impl AsRef<Path>) -> Result<Vec<Trial>> {
    let path = path.as_ref();
    let rows: Vec<TrialRow> =
        read_rows(path).with_context(|| format!("Failed to read {:?}", path))?;
    Ok(trials_from_rows(rows))
}
