//! Session identifiers and file naming
//!
//! A session identifier is `YYYYMMDD_HHMMSS_<suffix>`. The timestamp prefix
//! makes identifiers sort chronologically, so "earliest session with this
//! suffix" is simply the lexicographically smallest match.
//!
//! - Event tables: `logger_<session id>_<table>.csv`
//! - Containers: `<YYYYMMDD_HHMMSS>_<stream name>.bin`

use crate::error::{Result, ResultExt, StreamLogError};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// strftime pattern of the timestamp part
pub const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Length of a formatted timestamp (`YYYYMMDD_HHMMSS`)
pub const STAMP_LEN: usize = 15;

/// File name prefix of event tables
pub const EVENT_TABLE_PREFIX: &str = "logger_";

/// Table holding every message
pub const TABLE_ALL: &str = "all";

/// Table holding trial boundaries and their parameter events
pub const TABLE_TRIALS: &str = "trials";

/// Per-type tables, in the order they are loaded
pub const TYPE_TABLES: [&str; 4] = ["state", "filename", "parameter", "other"];

/// Container file extension
pub const CONTAINER_EXTENSION: &str = "bin";

/// Parsed session identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionKey {
    stamp: String,
    suffix: String,
}

impl SessionKey {
    /// Key for a session starting now
    pub fn now(suffix: &str) -> Self {
        Self::at(Local::now(), suffix)
    }

    /// Key for a session starting at `time`
    pub fn at<Tz: TimeZone>(time: DateTime<Tz>, suffix: &str) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        Self {
            stamp: time.format(STAMP_FORMAT).to_string(),
            suffix: sanitize(suffix),
        }
    }

    /// Parse `YYYYMMDD_HHMMSS_<suffix>`
    pub fn parse(id: &str) -> Option<Self> {
        if id.len() <= STAMP_LEN + 1 || !id.is_char_boundary(STAMP_LEN) {
            return None;
        }
        let (stamp, rest) = id.split_at(STAMP_LEN);
        let suffix = rest.strip_prefix('_')?;
        if !is_stamp(stamp) || suffix.is_empty() {
            return None;
        }
        Some(Self {
            stamp: stamp.to_string(),
            suffix: suffix.to_string(),
        })
    }

    /// Timestamp part
    pub fn stamp(&self) -> &str {
        &self.stamp
    }

    /// Suffix part
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Start time encoded in the identifier
    pub fn started_at(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.stamp, STAMP_FORMAT).ok()
    }

    /// Path of one of this session's event tables
    pub fn table_path(&self, event_dir: &Path, table: &str) -> PathBuf {
        event_table_path(event_dir, &self.to_string(), table)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.stamp, self.suffix)
    }
}

/// Whether `s` is a `YYYYMMDD_HHMMSS` timestamp
pub fn is_stamp(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == STAMP_LEN
        && bytes[8] == b'_'
        && bytes[..8].iter().all(u8::is_ascii_digit)
        && bytes[9..].iter().all(u8::is_ascii_digit)
}

/// Path of an event table
pub fn event_table_path(event_dir: &Path, session_id: &str, table: &str) -> PathBuf {
    event_dir.join(format!("{}{}_{}.csv", EVENT_TABLE_PREFIX, session_id, table))
}

/// File name of a container for a stream starting at `time`
pub fn container_file_name<Tz: TimeZone>(time: DateTime<Tz>, stream_name: &str) -> String
where
    Tz::Offset: fmt::Display,
{
    format!(
        "{}_{}.{}",
        time.format(STAMP_FORMAT),
        sanitize(stream_name),
        CONTAINER_EXTENSION
    )
}

/// Replace characters that cannot appear in a file name component
pub fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "stream".to_string()
    } else {
        cleaned
    }
}

/// Split `logger_<session id>_<table>.csv` into `(session id, table)`
pub fn parse_event_table_name(file_name: &str) -> Option<(String, String)> {
    let stem = file_name
        .strip_prefix(EVENT_TABLE_PREFIX)?
        .strip_suffix(".csv")?;
    let (id, table) = stem.rsplit_once('_')?;
    SessionKey::parse(id)?;
    Some((id.to_string(), table.to_string()))
}

/// Session identifiers found in an event directory
#[derive(Debug, Clone, Default)]
pub struct SessionCatalog {
    ids: BTreeSet<String>,
}

impl SessionCatalog {
    /// List the sessions that have at least one event table in `event_dir`
    pub fn scan(event_dir: impl AsRef<Path>) -> Result<Self> {
        let event_dir = event_dir.as_ref();
        let mut ids = BTreeSet::new();
        let entries = std::fs::read_dir(event_dir)
            .with_context(|| format!("Failed to list {:?}", event_dir))?;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            if let Some((id, _table)) = name.to_str().and_then(parse_event_table_name) {
                ids.insert(id);
            }
        }
        tracing::debug!("Found {} sessions in {:?}", ids.len(), event_dir);
        Ok(Self { ids })
    }

    /// Build a catalog from known identifiers
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Identifiers in chronological order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Number of sessions
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether no session was found
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Resolve a caller-given key to one session identifier
    ///
    /// Tries, in order: an exact identifier, a suffix, a `YYYYMMDD_HHMMSS`
    /// timestamp. Among several matches the earliest identifier wins.
    pub fn resolve(&self, key: &str) -> Result<String> {
        if self.ids.contains(key) {
            return Ok(key.to_string());
        }

        let by_suffix = self
            .ids
            .iter()
            .find(|id| SessionKey::parse(id).is_some_and(|k| k.suffix() == key));
        if let Some(id) = by_suffix {
            return Ok(id.clone());
        }

        if is_stamp(key) {
            if let Some(id) = self
                .ids
                .iter()
                .find(|id| SessionKey::parse(id).is_some_and(|k| k.stamp() == key))
            {
                return Ok(id.clone());
            }
        }

        Err(StreamLogError::NoMatch(format!(
            "no session matches {:?} ({} sessions known)",
            key,
            self.ids.len()
        )))
    }
}

/// Earliest container in `stream_dir` whose file name starts with `stream_key`
pub fn find_container(stream_dir: impl AsRef<Path>, stream_key: &str) -> Result<PathBuf> {
    let stream_dir = stream_dir.as_ref();
    let entries = std::fs::read_dir(stream_dir)
        .with_context(|| format!("Failed to list {:?}", stream_dir))?;

    let mut best: Option<(String, PathBuf)> = None;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        let is_container = path.extension().and_then(|e| e.to_str()) == Some(CONTAINER_EXTENSION);
        if !is_container || !name.starts_with(stream_key) {
            continue;
        }
        if best.as_ref().map_or(true, |(current, _)| name < *current) {
            best = Some((name, path));
        }
    }

    best.map(|(_, path)| path).ok_or_else(|| {
        StreamLogError::NoMatch(format!(
            "no container starting with {:?} in {:?}",
            stream_key, stream_dir
        ))
    })
}
