//! Session joining
//!
//! A session pairs one stream container with the event tables that share its
//! timeline. This module resolves session keys, loads both sides and cuts the
//! signal into per-trial segments on the container's own timestamps.
//!
//! # Features
//!
//! - Resolve a session by identifier, suffix or timestamp
//! - Locate the container of a stream by file name prefix
//! - Rebuild the trial table from CSV
//! - Slice the signal per trial, boundaries inclusive

pub mod joiner;
pub mod key;
pub mod types;

pub use joiner::{load_session_events, read_trials, SessionEvents, SessionJoiner};
pub use key::{find_container, SessionCatalog, SessionKey};
pub use types::{inclusive_range, Session, TrialSegment};
