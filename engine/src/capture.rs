//! Audio capture block.
//!
//! Forwards an input device to the scheduler's output ports. Interleaved
//! streams use one output port; per-channel streams use one port per
//! channel. The first step that reads after each activation posts an
//! `rxRate` label with the device's negotiated sample rate on every port.

use crate::block::AudioBlock;
use crate::buffer::{self, CaptureBuffers};
use crate::clock::{Clock, MonotonicClock};
use crate::config::BlockConfig;
use crate::device::{DeviceBackend, DeviceSelector, Direction};
use crate::error::{SetupError, TransferError, WorkError};
use crate::work::{Label, RX_RATE_LABEL, WorkInfo, WorkOutcome};
use std::sync::Arc;

/// Fraction of the scheduler's wait budget spent idling when nothing can be read.
const IDLE_WAIT_DIVISOR: u32 = 2;

#[derive(Debug)]
pub struct AudioCapture<C: Clock = MonotonicClock> {
    block: AudioBlock<C>,
    send_label: bool,
}

impl AudioCapture<MonotonicClock> {
    pub fn new(backend: Arc<dyn DeviceBackend>, config: &BlockConfig) -> Result<Self, SetupError> {
        Self::with_clock(backend, config, MonotonicClock)
    }
}

impl<C: Clock> AudioCapture<C> {
    pub fn with_clock(
        backend: Arc<dyn DeviceBackend>,
        config: &BlockConfig,
        clock: C,
    ) -> Result<Self, SetupError> {
        Ok(Self {
            block: AudioBlock::open("AudioSource", Direction::Capture, backend, config, clock)?,
            send_label: false,
        })
    }

    pub fn block(&self) -> &AudioBlock<C> {
        &self.block
    }

    pub fn block_mut(&mut self) -> &mut AudioBlock<C> {
        &mut self.block
    }

    pub fn activate(&mut self) -> Result<(), SetupError> {
        if !self.block.is_active() {
            self.block.activate()?;
            self.send_label = true;
        }
        Ok(())
    }

    pub fn deactivate(&mut self) {
        self.block.deactivate();
    }

    /// Move to another device. A running stream restarts there and
    /// announces its rate again.
    pub fn setup_device(&mut self, selector: &DeviceSelector) -> Result<(), SetupError> {
        self.block.setup_device(selector)?;
        self.send_label = self.block.is_active();
        Ok(())
    }

    /// Reopen at a new sample rate. A running stream restarts and
    /// announces the newly negotiated rate.
    pub fn setup_stream(&mut self, sample_rate: f64) -> Result<(), SetupError> {
        self.block.setup_stream(sample_rate)?;
        self.send_label = self.block.is_active();
        Ok(())
    }

    /// One service step. `outputs` holds one buffer per output port, each
    /// with room for at least `info.elements` elements.
    pub fn work(
        &mut self,
        info: &WorkInfo,
        outputs: &mut [&mut [u8]],
    ) -> Result<WorkOutcome, WorkError> {
        let block = &mut self.block;
        let Some(session) = block.session.as_mut() else {
            return Err(WorkError::NoStream(block.name));
        };
        if !block.active {
            return Ok(WorkOutcome::idle());
        }
        block.stats.steps += 1;

        // Nothing downstream can take samples; leave them queued in the device.
        if info.elements == 0 {
            return Ok(WorkOutcome::idle());
        }

        if block.backoff.is_suppressed(block.clock.now()) {
            block.stats.suppressed += 1;
            return Ok(WorkOutcome::yielded());
        }

        let available = session.available_frames()?;
        let frames = buffer::capture_frames(available, info.elements);
        if frames == 0 {
            block.clock.sleep(info.max_wait / IDLE_WAIT_DIVISOR);
            return Ok(WorkOutcome::yielded());
        }

        let format = *session.format();
        let rate = session.sample_rate();
        let buffers = CaptureBuffers::from_ports(&format, outputs, frames)?;
        let result = session.read(buffers, frames);
        let moved = block.classify("read stream", frames, &result);

        let mut labels = Vec::new();
        if self.send_label && !matches!(result, Err(TransferError::Io { .. })) {
            self.send_label = false;
            labels = (0..format.port_count())
                .map(|port| Label {
                    port,
                    id: RX_RATE_LABEL,
                    value: rate,
                    index: 0,
                })
                .collect();
        }

        if block.backoff.is_suppressed(block.clock.now()) {
            block.stats.suppressed += 1;
            return Ok(WorkOutcome::yielded().with_labels(labels));
        }

        block.stats.frames += moved as u64;
        Ok(WorkOutcome::advanced(moved).with_labels(labels))
    }
}
