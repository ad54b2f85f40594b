//! What passes between the scheduler and a block on each service step.

use serde::Serialize;
use std::time::Duration;

/// Label id carrying the capture sample rate.
pub const RX_RATE_LABEL: &str = "rxRate";

/// Scheduler-side view of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkInfo {
    /// Elements every port can take (capture) or offers (playback).
    pub elements: usize,
    /// Longest the step may idle when there is nothing to do.
    pub max_wait: Duration,
}

impl WorkInfo {
    pub fn new(elements: usize, max_wait: Duration) -> Self {
        Self { elements, max_wait }
    }
}

/// Stream annotation attached to one port.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Label {
    pub port: usize,
    pub id: &'static str,
    pub value: f64,
    /// Element offset inside this step's buffer.
    pub index: usize,
}

/// Result of one service step.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkOutcome {
    /// Elements produced (capture) or consumed (playback) on every port.
    pub frames: usize,
    /// Ask the scheduler to come back later.
    pub yielded: bool,
    pub labels: Vec<Label>,
}

impl WorkOutcome {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn yielded() -> Self {
        Self {
            yielded: true,
            ..Self::default()
        }
    }

    pub fn advanced(frames: usize) -> Self {
        Self {
            frames,
            ..Self::default()
        }
    }

    pub fn with_labels(mut self, labels: Vec<Label>) -> Self {
        self.labels = labels;
        self
    }
}

/// Running counters for one block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BlockStats {
    pub steps: u64,
    pub transfers: u64,
    pub frames: u64,
    pub xruns: u64,
    pub io_errors: u64,
    pub suppressed: u64,
}
