use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffState {
    /// Transfers are permitted.
    Armed,
    /// A recent xrun holds transfers off until the deadline.
    Suppressed,
}

/// Tracks the readiness deadline that suppresses transfers after an xrun.
#[derive(Debug, Clone)]
pub struct BackoffController {
    backoff: Duration,
    ready_at: Option<Instant>,
}

impl BackoffController {
    pub fn new(backoff: Duration) -> Self {
        Self {
            backoff,
            ready_at: None,
        }
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    pub fn set_backoff(&mut self, backoff: Duration) {
        self.backoff = backoff;
    }

    pub fn ready_at(&self) -> Option<Instant> {
        self.ready_at
    }

    /// Reset the deadline on activation.
    pub fn arm(&mut self, now: Instant) {
        self.ready_at = Some(now);
    }

    pub fn state(&self, now: Instant) -> BackoffState {
        match self.ready_at {
            Some(ready_at) if now < ready_at => BackoffState::Suppressed,
            _ => BackoffState::Armed,
        }
    }

    pub fn is_suppressed(&self, now: Instant) -> bool {
        self.state(now) == BackoffState::Suppressed
    }

    /// Push the deadline out after an xrun observed at `now`. The window
    /// starts at the later of the fault and the current deadline.
    pub fn record_fault(&mut self, now: Instant) {
        let base = match self.ready_at {
            Some(ready_at) if ready_at > now => ready_at,
            _ => now,
        };
        self.ready_at = Some(base + self.backoff);
    }
}
