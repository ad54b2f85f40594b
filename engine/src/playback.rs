//! Audio playback block.
//!
//! Forwards the scheduler's input ports into an output device, one
//! interleaved port or one port per channel.

use crate::block::AudioBlock;
use crate::buffer::{self, PlaybackBuffers};
use crate::clock::{Clock, MonotonicClock};
use crate::config::BlockConfig;
use crate::device::{DeviceBackend, DeviceSelector, Direction};
use crate::error::{SetupError, WorkError};
use crate::work::{WorkInfo, WorkOutcome};
use std::sync::Arc;

#[derive(Debug)]
pub struct AudioPlayback<C: Clock = MonotonicClock> {
    block: AudioBlock<C>,
}

impl AudioPlayback<MonotonicClock> {
    pub fn new(backend: Arc<dyn DeviceBackend>, config: &BlockConfig) -> Result<Self, SetupError> {
        Self::with_clock(backend, config, MonotonicClock)
    }
}

impl<C: Clock> AudioPlayback<C> {
    pub fn with_clock(
        backend: Arc<dyn DeviceBackend>,
        config: &BlockConfig,
        clock: C,
    ) -> Result<Self, SetupError> {
        Ok(Self {
            block: AudioBlock::open("AudioSink", Direction::Playback, backend, config, clock)?,
        })
    }

    pub fn block(&self) -> &AudioBlock<C> {
        &self.block
    }

    pub fn block_mut(&mut self) -> &mut AudioBlock<C> {
        &mut self.block
    }

    pub fn activate(&mut self) -> Result<(), SetupError> {
        self.block.activate()
    }

    pub fn deactivate(&mut self) {
        self.block.deactivate();
    }

    pub fn setup_device(&mut self, selector: &DeviceSelector) -> Result<(), SetupError> {
        self.block.setup_device(selector)
    }

    pub fn setup_stream(&mut self, sample_rate: f64) -> Result<(), SetupError> {
        self.block.setup_stream(sample_rate)
    }

    /// One service step. `inputs` holds one buffer per input port with at
    /// least `info.elements` elements queued.
    pub fn work(&mut self, info: &WorkInfo, inputs: &[&[u8]]) -> Result<WorkOutcome, WorkError> {
        let block = &mut self.block;
        let Some(session) = block.session.as_mut() else {
            return Err(WorkError::NoStream(block.name));
        };
        if !block.active {
            return Ok(WorkOutcome::idle());
        }
        block.stats.steps += 1;

        if info.elements == 0 {
            return Ok(WorkOutcome::idle());
        }

        if block.backoff.is_suppressed(block.clock.now()) {
            block.stats.suppressed += 1;
            return Ok(WorkOutcome::yielded());
        }

        let available = session.available_frames()?;
        let frames = buffer::playback_frames(available, info.elements);
        if frames == 0 {
            return Ok(WorkOutcome::idle());
        }

        let format = *session.format();
        let buffers = PlaybackBuffers::from_ports(&format, inputs, frames)?;
        let result = session.write(buffers, frames);
        let moved = block.classify("write stream", frames, &result);

        if block.backoff.is_suppressed(block.clock.now()) {
            block.stats.suppressed += 1;
            return Ok(WorkOutcome::yielded());
        }

        block.stats.frames += moved as u64;
        Ok(WorkOutcome::advanced(moved))
    }
}
