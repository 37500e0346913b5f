//! Control-stream logging
//!
//! Messages from the control stream are classified ([`message`]), buffered
//! into bounded CSV tables ([`table`]) and segmented into trials
//! ([`trial`], [`logger`]).
//!
//! # Tables per session
//!
//! - `all` - every decoded message
//! - `state`, `filename`, `parameter`, `other` - messages by name
//! - `trials` - recording start/end rows with the parameter changes between them

pub mod logger;
pub mod message;
pub mod table;
pub mod trial;

pub use logger::{LoggerStats, LoggerSummary, SessionState, Transition, TrialLogger, TrialPhase};
pub use message::{EventMessage, MessageKind};
pub use table::{read_rows, EventRow, EventTable, TableRow};
pub use trial::{trials_from_rows, Trial, TrialEvent, TrialMarker, TrialRow};
