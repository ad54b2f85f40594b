use anyhow::{Context, Result, bail};
use audioblock_engine::{BlockConfig, ChannelLayout, ReportPolicy, SampleType};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Whole loopback setup: one `[capture]` table, one `[playback]` table and
/// the `[runner]` scheduling knobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopbackConfig {
    pub capture: BlockConfig,
    pub playback: BlockConfig,
    pub runner: RunnerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Largest step offered to either block.
    pub period_frames: usize,
    /// Frames buffered between capture and playback.
    pub fifo_frames: usize,
    pub max_wait_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            period_frames: 256,
            fifo_frames: 8192,
            max_wait_ms: 20,
        }
    }
}

impl RunnerConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

/// Command line and environment settings layered over the file.
#[derive(Args, Debug, Clone, Default)]
pub struct Overrides {
    /// Capture device: name, index, or empty for the default
    #[arg(long, value_name = "DEVICE")]
    pub capture_device: Option<String>,

    /// Playback device: name, index, or empty for the default
    #[arg(long, value_name = "DEVICE")]
    pub playback_device: Option<String>,

    /// Sample rate for both blocks
    #[arg(long, value_name = "HZ")]
    pub rate: Option<f64>,

    /// Channel count for both blocks
    #[arg(long)]
    pub channels: Option<usize>,

    /// Sample type (float32, int32, uint32, int16, uint16, int8, uint8)
    #[arg(long)]
    pub dtype: Option<SampleType>,

    /// INTERLEAVED or PORTPERCHAN
    #[arg(long)]
    pub channel_mode: Option<ChannelLayout>,

    /// LOGGER, STDERROR or DISABLED
    #[arg(long, env = "AUDIOBLOCK_REPORT_MODE")]
    pub report_mode: Option<ReportPolicy>,

    /// Pause after an xrun, in milliseconds
    #[arg(long, env = "AUDIOBLOCK_BACKOFF_MS")]
    pub backoff_ms: Option<u64>,

    /// Largest step in frames
    #[arg(long)]
    pub period_frames: Option<usize>,
}

impl LoopbackConfig {
    /// Read a TOML file, or start from defaults when none is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn apply(&mut self, o: &Overrides) {
        if let Some(device) = &o.capture_device {
            self.capture.device = device.clone();
        }
        if let Some(device) = &o.playback_device {
            self.playback.device = device.clone();
        }
        if let Some(period) = o.period_frames {
            self.runner.period_frames = period;
        }
        for block in [&mut self.capture, &mut self.playback] {
            if let Some(rate) = o.rate {
                block.sample_rate = rate;
            }
            if let Some(channels) = o.channels {
                block.channels = channels;
            }
            if let Some(dtype) = o.dtype {
                block.dtype = dtype;
            }
            if let Some(mode) = o.channel_mode {
                block.channel_mode = mode;
            }
            if let Some(mode) = o.report_mode {
                block.report_mode = mode;
            }
            if let Some(ms) = o.backoff_ms {
                block.backoff_ms = ms;
            }
        }
    }

    /// Capture ports feed playback ports byte for byte, so both sides need
    /// the same port geometry.
    pub fn validate(&self) -> Result<()> {
        let capture = self.capture.format().context("Invalid [capture] block")?;
        let playback = self.playback.format().context("Invalid [playback] block")?;
        if capture.port_count() != playback.port_count()
            || capture.port_element_bytes() != playback.port_element_bytes()
        {
            bail!(
                "capture ({} x{} {}) and playback ({} x{} {}) ports do not line up",
                capture.sample,
                capture.channels,
                capture.layout,
                playback.sample,
                playback.channels,
                playback.layout
            );
        }
        if capture.sample != playback.sample {
            bail!(
                "capture sample type {} differs from playback {}",
                capture.sample,
                playback.sample
            );
        }
        if self.runner.period_frames == 0 {
            bail!("period_frames must be positive");
        }
        if self.runner.fifo_frames < self.runner.period_frames {
            bail!(
                "fifo_frames ({}) is smaller than period_frames ({})",
                self.runner.fifo_frames,
                self.runner.period_frames
            );
        }
        Ok(())
    }
}
