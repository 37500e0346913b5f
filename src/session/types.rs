//! Joined session data types

use crate::container::{ContainerMetadata, LoadedContainer};
use crate::events::{EventRow, Trial};
use std::collections::BTreeMap;
use std::ops::Range;

/// Signal restricted to one trial
#[derive(Debug, Clone, PartialEq)]
pub struct TrialSegment {
    /// Position of the trial in the session's trial table
    pub trial_index: usize,
    /// Trial start (stream clock)
    pub start: f64,
    /// Trial end; `None` for a trial that was never closed
    pub end: Option<f64>,
    /// Timestamps of the included samples
    pub timestamps: Vec<f64>,
    /// Included samples as `[channel][sample]`
    pub data: Vec<Vec<f64>>,
}

impl TrialSegment {
    /// Number of channels (kept even when no sample falls in the trial)
    pub fn channel_count(&self) -> usize {
        self.data.len()
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether no sample fell inside the trial
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// A container joined with the event tables of its session
#[derive(Debug, Clone)]
pub struct Session {
    /// Event session identifier
    pub session_id: String,
    /// Decoded container
    pub container: LoadedContainer,
    /// Trials in table order
    pub trials: Vec<Trial>,
    /// Per-type event tables that exist for this session, by table name
    pub tables: BTreeMap<String, Vec<EventRow>>,
    /// Whether the container timestamps never decrease
    monotonic: bool,
}

impl Session {
    /// Join already loaded parts
    pub fn from_parts(
        session_id: impl Into<String>,
        container: LoadedContainer,
        trials: Vec<Trial>,
        tables: BTreeMap<String, Vec<EventRow>>,
    ) -> Self {
        let monotonic = container.timestamps.windows(2).all(|w| w[0] <= w[1]);
        if !monotonic {
            tracing::warn!(
                "{:?}: timestamps are not monotonic, segments use a linear scan",
                container.path
            );
        }
        Self {
            session_id: session_id.into(),
            container,
            trials,
            tables,
            monotonic,
        }
    }

    /// Samples as `[channel][sample]`
    pub fn signal(&self) -> &[Vec<f64>] {
        &self.container.signal
    }

    /// Sample timestamps
    pub fn timestamps(&self) -> &[f64] {
        &self.container.timestamps
    }

    /// Channel metadata
    pub fn metadata(&self) -> &ContainerMetadata {
        &self.container.metadata
    }

    /// Samples of the channel called `name`
    pub fn channel(&self, name: &str) -> Option<&[f64]> {
        let index = self
            .container
            .metadata
            .channel_names
            .iter()
            .position(|n| n == name)?;
        self.container.signal.get(index).map(Vec::as_slice)
    }

    /// Rows of a per-type event table
    pub fn table(&self, name: &str) -> Option<&[EventRow]> {
        self.tables.get(name).map(Vec::as_slice)
    }

    /// Signal of one trial, both boundaries inclusive
    pub fn segment(&self, trial_index: usize) -> Option<TrialSegment> {
        let trial = self.trials.get(trial_index)?;
        let (start, end) = (trial.start_time(), trial.end_time());
        let indices = self.indices_between(start, end);

        Some(TrialSegment {
            trial_index,
            start,
            end,
            timestamps: indices.iter().map(|&i| self.container.timestamps[i]).collect(),
            data: self
                .container
                .signal
                .iter()
                .map(|channel| indices.iter().map(|&i| channel[i]).collect())
                .collect(),
        })
    }

    /// Signal of every trial, in trial order
    pub fn segments(&self) -> Vec<TrialSegment> {
        (0..self.trials.len())
            .filter_map(|i| self.segment(i))
            .collect()
    }

    fn indices_between(&self, start: f64, end: Option<f64>) -> Vec<usize> {
        let timestamps = &self.container.timestamps;
        if self.monotonic {
            inclusive_range(timestamps, start, end).collect()
        } else {
            timestamps
                .iter()
                .enumerate()
                .filter(|&(_, &t)| t >= start && end.map_or(true, |e| t <= e))
                .map(|(i, _)| i)
                .collect()
        }
    }
}

/// Index range of sorted `timestamps` within `[start, end]`
///
/// `end == None` extends to the last sample. An inverted interval gives an
/// empty range.
pub fn inclusive_range(timestamps: &[f64], start: f64, end: Option<f64>) -> Range<usize> {
    let lo = timestamps.partition_point(|&t| t < start);
    let hi = match end {
        Some(end) => timestamps.partition_point(|&t| t <= end),
        None => timestamps.len(),
    };
    lo..hi.max(lo)
}
