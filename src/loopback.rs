//! Minimal cooperative scheduler: one capture block feeding one playback
//! block through a byte FIFO per port.

use crate::config::{LoopbackConfig, RunnerConfig};
use anyhow::{Context, Result};
use audioblock_engine::clock::Clock;
use audioblock_engine::work::RX_RATE_LABEL;
use audioblock_engine::{
    AudioCapture, AudioPlayback, BlockStats, DeviceBackend, WorkError, WorkInfo,
};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize)]
pub struct LoopbackReport {
    pub capture: BlockStats,
    pub playback: BlockStats,
    /// Last `rxRate` seen on the capture ports.
    pub capture_rate: Option<f64>,
    pub iterations: u64,
    pub queued_frames: usize,
}

pub struct Loopback<C: Clock> {
    source: AudioCapture<C>,
    sink: AudioPlayback<C>,
    fifos: Vec<VecDeque<u8>>,
    scratch: Vec<Vec<u8>>,
    element_bytes: usize,
    runner: RunnerConfig,
    capture_rate: Option<f64>,
    iterations: u64,
}

impl<C: Clock + Clone> Loopback<C> {
    pub fn new(backend: Arc<dyn DeviceBackend>, config: &LoopbackConfig, clock: C) -> Result<Self> {
        config.validate()?;
        let source = AudioCapture::with_clock(backend.clone(), &config.capture, clock.clone())
            .context("Failed to open capture block")?;
        let sink = AudioPlayback::with_clock(backend, &config.playback, clock)
            .context("Failed to open playback block")?;

        let ports = source.block().port_count();
        let element_bytes = source.block().port_element_bytes();
        let runner = config.runner.clone();
        Ok(Self {
            source,
            sink,
            fifos: vec![VecDeque::with_capacity(runner.fifo_frames * element_bytes); ports],
            scratch: vec![vec![0; runner.period_frames * element_bytes]; ports],
            element_bytes,
            runner,
            capture_rate: None,
            iterations: 0,
        })
    }

    fn queued_frames(&self) -> usize {
        self.fifos.first().map_or(0, |f| f.len() / self.element_bytes)
    }

    /// Run one capture step and one playback step. Returns whether either
    /// block moved data.
    pub fn step(&mut self) -> Result<bool, WorkError> {
        self.iterations += 1;
        let max_wait = self.runner.max_wait();
        let room = self.runner.fifo_frames - self.queued_frames();
        let elements = room.min(self.runner.period_frames);

        let mut outputs: Vec<&mut [u8]> = self.scratch.iter_mut().map(|b| b.as_mut_slice()).collect();
        let produced = self.source.work(&WorkInfo::new(elements, max_wait), &mut outputs)?;
        for label in &produced.labels {
            if label.id == RX_RATE_LABEL && self.capture_rate != Some(label.value) {
                info!("capture running at {} Hz", label.value);
                self.capture_rate = Some(label.value);
            }
        }
        let bytes = produced.frames * self.element_bytes;
        for (fifo, buf) in self.fifos.iter_mut().zip(&self.scratch) {
            fifo.extend(&buf[..bytes]);
        }

        let queued = self.queued_frames();
        let offered = queued.min(self.runner.period_frames);
        let inputs: Vec<&[u8]> = self
            .fifos
            .iter_mut()
            .map(|f| &*f.make_contiguous())
            .collect();
        let consumed = self.sink.work(&WorkInfo::new(offered, max_wait), &inputs)?;
        let bytes = consumed.frames * self.element_bytes;
        for fifo in &mut self.fifos {
            fifo.drain(..bytes);
        }

        Ok(produced.frames > 0 || consumed.frames > 0)
    }

    /// Step until `stop` is raised or `duration` of scheduler time has passed.
    pub fn run(&mut self, stop: &AtomicBool, duration: Option<Duration>) -> Result<LoopbackReport> {
        self.source.activate().context("Failed to start capture")?;
        self.sink.activate().context("Failed to start playback")?;

        let started = self.source.block().clock().now();
        let idle_pause = self.runner.max_wait() / 4;
        while !stop.load(Ordering::Relaxed) {
            if duration.is_some_and(|d| self.source.block().clock().now() - started >= d) {
                break;
            }
            if !self.step()? {
                // Both sides are backing off or starved.
                self.source.block().clock().sleep(idle_pause);
            }
        }
        debug!("loopback stopped after {} iterations", self.iterations);

        self.source.deactivate();
        self.sink.deactivate();
        Ok(self.report())
    }

    pub fn report(&self) -> LoopbackReport {
        LoopbackReport {
            capture: self.source.block().stats(),
            playback: self.sink.block().stats(),
            capture_rate: self.capture_rate,
            iterations: self.iterations,
            queued_frames: self.queued_frames(),
        }
    }
}
