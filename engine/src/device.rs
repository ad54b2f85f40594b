use crate::buffer::{CaptureBuffers, PlaybackBuffers};
use crate::error::{DeviceError, SetupError, TransferError};
use crate::format::StreamFormat;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Capture,
    Playback,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Capture => f.write_str("capture"),
            Direction::Playback => f.write_str("playback"),
        }
    }
}

/// Index into a backend's device table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub usize);

/// How a block names its device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelector {
    Default,
    Index(usize),
    Name(String),
}

impl FromStr for DeviceSelector {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(DeviceSelector::Default);
        }
        if s.bytes().all(|b| b.is_ascii_digit()) {
            // Digits too large for usize can never be in range.
            return Ok(DeviceSelector::Index(s.parse().unwrap_or(usize::MAX)));
        }
        Ok(DeviceSelector::Name(s.to_string()))
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelector::Default => f.write_str("<default>"),
            DeviceSelector::Index(i) => write!(f, "{i}"),
            DeviceSelector::Name(name) => f.write_str(name),
        }
    }
}

/// What a backend knows about one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub name: String,
    pub host_api: String,
    pub max_input_channels: usize,
    pub max_output_channels: usize,
    pub low_input_latency: Duration,
    pub high_input_latency: Duration,
    pub low_output_latency: Duration,
    pub high_output_latency: Duration,
}

impl DeviceInfo {
    /// Midpoint of the reported latency bounds for `direction`.
    pub fn suggested_latency(&self, direction: Direction) -> Duration {
        let (low, high) = match direction {
            Direction::Capture => (self.low_input_latency, self.high_input_latency),
            Direction::Playback => (self.low_output_latency, self.high_output_latency),
        };
        (low + high) / 2
    }
}

/// Everything needed to open a stream on one device.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamParams {
    pub device: DeviceHandle,
    pub direction: Direction,
    pub format: StreamFormat,
    pub suggested_latency: Duration,
}

/// Device table plus stream factory.
pub trait DeviceBackend: Send + Sync {
    fn host_api(&self) -> &str;
    fn device_count(&self) -> usize;
    fn device_info(&self, device: DeviceHandle) -> Option<DeviceInfo>;
    fn default_device(&self, direction: Direction) -> Option<DeviceHandle>;
    fn is_format_supported(&self, params: &StreamParams) -> Result<(), DeviceError>;
    fn open(&self, params: &StreamParams) -> Result<Box<dyn DeviceStream>, DeviceError>;
}

/// An open, blocking hardware stream.
pub trait DeviceStream {
    fn start(&mut self) -> Result<(), DeviceError>;
    fn stop(&mut self) -> Result<(), DeviceError>;
    fn close(&mut self) -> Result<(), DeviceError>;

    /// Frames that can move without blocking. Negative values are backend
    /// error codes, see [`DeviceStream::describe_error`].
    fn available(&mut self) -> i64;
    fn describe_error(&self, code: i64) -> String;

    /// Fill up to `frames` frames; returns how many arrived.
    fn read(&mut self, buffers: CaptureBuffers<'_>, frames: usize)
    -> Result<usize, TransferError>;
    /// Send up to `frames` frames; returns how many the device took.
    fn write(&mut self, buffers: PlaybackBuffers<'_>, frames: usize)
    -> Result<usize, TransferError>;

    /// Rate the device actually runs at.
    fn sample_rate(&self) -> f64;
    /// Bytes per sample the device negotiated.
    fn sample_size(&self) -> usize;
}

pub fn resolve(
    backend: &dyn DeviceBackend,
    selector: &DeviceSelector,
    direction: Direction,
) -> Result<DeviceHandle, SetupError> {
    match selector {
        DeviceSelector::Default => backend
            .default_device(direction)
            .ok_or(SetupError::NoDefaultDevice(direction)),
        DeviceSelector::Index(index) => {
            let count = backend.device_count();
            if *index >= count {
                return Err(SetupError::DeviceRange {
                    index: *index,
                    count,
                });
            }
            Ok(DeviceHandle(*index))
        }
        DeviceSelector::Name(name) => (0..backend.device_count())
            .map(DeviceHandle)
            .find(|&h| {
                backend
                    .device_info(h)
                    .is_some_and(|info| info.name == *name)
            })
            .ok_or_else(|| SetupError::DeviceNotFound(name.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_parsing() {
        assert_eq!("".parse::<DeviceSelector>().unwrap(), DeviceSelector::Default);
        assert_eq!("3".parse::<DeviceSelector>().unwrap(), DeviceSelector::Index(3));
        assert_eq!(
            "hw:0,0".parse::<DeviceSelector>().unwrap(),
            DeviceSelector::Name("hw:0,0".to_string())
        );
        assert_eq!(
            "99999999999999999999999".parse::<DeviceSelector>().unwrap(),
            DeviceSelector::Index(usize::MAX)
        );
        assert_eq!(
            "-1".parse::<DeviceSelector>().unwrap(),
            DeviceSelector::Name("-1".to_string())
        );
    }

    #[test]
    fn suggested_latency_is_midpoint() {
        let info = DeviceInfo {
            name: "dev".to_string(),
            host_api: "test".to_string(),
            max_input_channels: 2,
            max_output_channels: 2,
            low_input_latency: Duration::from_millis(10),
            high_input_latency: Duration::from_millis(30),
            low_output_latency: Duration::from_millis(4),
            high_output_latency: Duration::from_millis(8),
        };
        assert_eq!(
            info.suggested_latency(Direction::Capture),
            Duration::from_millis(20)
        );
        assert_eq!(
            info.suggested_latency(Direction::Playback),
            Duration::from_millis(6)
        );
    }
}
