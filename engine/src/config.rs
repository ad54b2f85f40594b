use crate::device::DeviceSelector;
use crate::error::SetupError;
use crate::format::{ChannelLayout, SampleType, StreamFormat};
use crate::report::ReportPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_SAMPLE_RATE: f64 = 44_100.0;

/// Parameters of one capture or playback block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockConfig {
    /// Device name, integer index, or empty for the system default.
    pub device: String,
    pub sample_rate: f64,
    pub dtype: SampleType,
    pub channels: usize,
    pub channel_mode: ChannelLayout,
    pub report_mode: ReportPolicy,
    pub backoff_ms: u64,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            dtype: SampleType::Float32,
            channels: 1,
            channel_mode: ChannelLayout::Interleaved,
            report_mode: ReportPolicy::Stderror,
            backoff_ms: 0,
        }
    }
}

impl BlockConfig {
    pub fn selector(&self) -> DeviceSelector {
        match self.device.parse() {
            Ok(selector) => selector,
            Err(never) => match never {},
        }
    }

    pub fn format(&self) -> Result<StreamFormat, SetupError> {
        StreamFormat::new(self.dtype, self.channels, self.channel_mode, self.sample_rate)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}
