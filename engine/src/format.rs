use crate::error::SetupError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sample element type carried by a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleType {
    #[default]
    Float32,
    Int32,
    UInt32,
    Int16,
    UInt16,
    Int8,
    UInt8,
}

impl SampleType {
    pub const ALL: [SampleType; 7] = [
        SampleType::Float32,
        SampleType::Int32,
        SampleType::UInt32,
        SampleType::Int16,
        SampleType::UInt16,
        SampleType::Int8,
        SampleType::UInt8,
    ];

    pub fn size(self) -> usize {
        match self {
            SampleType::Float32 | SampleType::Int32 | SampleType::UInt32 => 4,
            SampleType::Int16 | SampleType::UInt16 => 2,
            SampleType::Int8 | SampleType::UInt8 => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SampleType::Float32 => "float32",
            SampleType::Int32 => "int32",
            SampleType::UInt32 => "uint32",
            SampleType::Int16 => "int16",
            SampleType::UInt16 => "uint16",
            SampleType::Int8 => "int8",
            SampleType::UInt8 => "uint8",
        }
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SampleType {
    type Err = SetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SampleType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| SetupError::invalid("sample type", s))
    }
}

/// How channels map onto scheduler ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChannelLayout {
    /// One port, channels interleaved inside each element.
    #[default]
    #[serde(rename = "INTERLEAVED")]
    Interleaved,
    /// One port per channel, in channel order.
    #[serde(rename = "PORTPERCHAN", alias = "PER_CHANNEL")]
    PerChannel,
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelLayout::Interleaved => f.write_str("INTERLEAVED"),
            ChannelLayout::PerChannel => f.write_str("PORTPERCHAN"),
        }
    }
}

impl FromStr for ChannelLayout {
    type Err = SetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INTERLEAVED" => Ok(ChannelLayout::Interleaved),
            "PORTPERCHAN" | "PER_CHANNEL" => Ok(ChannelLayout::PerChannel),
            _ => Err(SetupError::invalid("channel mode", s)),
        }
    }
}

/// Fixed stream format. Changing any field means reopening the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamFormat {
    pub sample: SampleType,
    pub channels: usize,
    pub layout: ChannelLayout,
    pub sample_rate: f64,
}

impl StreamFormat {
    pub fn new(
        sample: SampleType,
        channels: usize,
        layout: ChannelLayout,
        sample_rate: f64,
    ) -> Result<Self, SetupError> {
        if channels == 0 {
            return Err(SetupError::invalid("channel count", "0"));
        }
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(SetupError::invalid("sample rate", sample_rate.to_string()));
        }
        Ok(Self {
            sample,
            channels,
            layout,
            sample_rate,
        })
    }

    pub fn with_rate(self, sample_rate: f64) -> Result<Self, SetupError> {
        Self::new(self.sample, self.channels, self.layout, sample_rate)
    }

    pub fn interleaved(&self) -> bool {
        self.layout == ChannelLayout::Interleaved
    }

    pub fn sample_size(&self) -> usize {
        self.sample.size()
    }

    pub fn frame_bytes(&self) -> usize {
        self.sample.size() * self.channels
    }

    pub fn port_count(&self) -> usize {
        match self.layout {
            ChannelLayout::Interleaved => 1,
            ChannelLayout::PerChannel => self.channels,
        }
    }

    /// Bytes per scheduler element on each port.
    pub fn port_element_bytes(&self) -> usize {
        match self.layout {
            ChannelLayout::Interleaved => self.frame_bytes(),
            ChannelLayout::PerChannel => self.sample_size(),
        }
    }
}
