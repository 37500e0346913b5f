//! Background capture
//!
//! Each stream is recorded by a dedicated thread that owns its sink. The
//! transport pushes data through a bounded [`crossbeam_channel`] queue, so a
//! slow disk applies back-pressure instead of growing memory.
//!
//! - [`SampleCapture`] writes [`SampleChunk`]s into a container; the file is
//!   created when the first chunk arrives so its `start_time` is the first
//!   sample timestamp
//! - [`EventCapture`] feeds [`RawMessage`]s to a
//!   [`TrialLogger`](crate::events::TrialLogger)
//!
//! `stop()` refuses new input, drains what was already accepted, flushes and
//! returns the final report or the error that ended the worker.

mod control;
mod stream;
mod worker;

pub use control::{EventCapture, RawMessage};
pub use stream::{CaptureReport, SampleCapture, SampleChunk};
