use crate::device::Direction;
use crate::error::SetupError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use tracing::error;

/// Where xrun notices go. Unexpected device errors are always logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReportPolicy {
    /// Full message through `tracing`.
    Logger,
    /// Two-letter marker on stderr: "aO" for overflow, "aU" for underflow.
    #[default]
    Stderror,
    Disabled,
}

impl fmt::Display for ReportPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportPolicy::Logger => f.write_str("LOGGER"),
            ReportPolicy::Stderror => f.write_str("STDERROR"),
            ReportPolicy::Disabled => f.write_str("DISABLED"),
        }
    }
}

impl FromStr for ReportPolicy {
    type Err = SetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOGGER" => Ok(ReportPolicy::Logger),
            "STDERROR" => Ok(ReportPolicy::Stderror),
            "DISABLED" => Ok(ReportPolicy::Disabled),
            _ => Err(SetupError::invalid("report mode", s)),
        }
    }
}

pub fn xrun_marker(direction: Direction) -> &'static str {
    match direction {
        Direction::Capture => "aO",
        Direction::Playback => "aU",
    }
}

/// Surfaces transfer conditions for one block.
#[derive(Debug, Clone)]
pub struct Reporter {
    block: &'static str,
    policy: ReportPolicy,
}

impl Reporter {
    pub fn new(block: &'static str, policy: ReportPolicy) -> Self {
        Self { block, policy }
    }

    pub fn policy(&self) -> ReportPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: ReportPolicy) {
        self.policy = policy;
    }

    pub fn xrun(&self, op: &str, direction: Direction) {
        match self.policy {
            ReportPolicy::Logger => {
                let what = match direction {
                    Direction::Capture => "input overflowed",
                    Direction::Playback => "output underflowed",
                };
                error!(block = self.block, "{op}: {what}");
            }
            ReportPolicy::Stderror => {
                let mut stderr = std::io::stderr().lock();
                let _ = stderr.write_all(xrun_marker(direction).as_bytes());
                let _ = stderr.flush();
            }
            ReportPolicy::Disabled => {}
        }
    }

    pub fn unexpected(&self, op: &str, err: &dyn fmt::Display) {
        error!(block = self.block, "{op}: {err}");
    }
}
