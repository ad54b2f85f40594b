//! Scripted in-memory device backend shared by the integration tests.

#![allow(dead_code)]

use audioblock_engine::buffer::{CaptureBuffers, PlaybackBuffers};
use audioblock_engine::device::{DeviceInfo, StreamParams};
use audioblock_engine::{
    DeviceBackend, DeviceError, DeviceHandle, DeviceStream, Direction, TransferError,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FormatCheck(usize),
    Open(usize),
    Start,
    Stop,
    Close,
    Available,
    Read(usize),
    Write(usize),
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub devices: Vec<DeviceInfo>,
    pub default_capture: Option<usize>,
    pub default_playback: Option<usize>,
    pub unsupported: Option<String>,
    pub open_failure: Option<String>,
    pub start_failure: Option<String>,
    /// Overrides the sample size a stream reports after opening.
    pub negotiated_sample_size: Option<usize>,
    /// Overrides the rate a stream reports after opening.
    pub negotiated_rate: Option<f64>,
    /// Returned by `available` in order; `idle_available` once drained.
    pub available: VecDeque<i64>,
    pub idle_available: i64,
    /// Returned by `read`/`write` in order; a full transfer once drained.
    pub transfers: VecDeque<Result<usize, TransferError>>,
    pub calls: Vec<Call>,
    /// Bytes handed to each write, one entry per port.
    pub written: Vec<Vec<Vec<u8>>>,
    pub opened: Vec<StreamParams>,
}

impl FakeState {
    fn reply(&mut self, frames: usize) -> Result<usize, TransferError> {
        self.transfers.pop_front().unwrap_or(Ok(frames))
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

pub fn device(name: &str, inputs: usize, outputs: usize) -> DeviceInfo {
    DeviceInfo {
        name: name.to_string(),
        host_api: "fake".to_string(),
        max_input_channels: inputs,
        max_output_channels: outputs,
        low_input_latency: Duration::from_millis(10),
        high_input_latency: Duration::from_millis(30),
        low_output_latency: Duration::from_millis(20),
        high_output_latency: Duration::from_millis(60),
    }
}

impl FakeBackend {
    /// Two duplex devices, "default" first and "hw:1" second.
    pub fn new() -> Self {
        let backend = Self::default();
        {
            let mut state = backend.state();
            state.devices = vec![device("default", 2, 2), device("hw:1", 8, 8)];
            state.default_capture = Some(0);
            state.default_playback = Some(0);
        }
        backend
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn shared(&self) -> Arc<dyn DeviceBackend> {
        Arc::new(self.clone())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn queue_available(&self, values: &[i64]) {
        self.state().available.extend(values.iter().copied());
    }

    pub fn queue_transfer(&self, result: Result<usize, TransferError>) {
        self.state().transfers.push_back(result);
    }

    pub fn transfer_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Read(_) | Call::Write(_)))
            .collect()
    }
}

impl DeviceBackend for FakeBackend {
    fn host_api(&self) -> &str {
        "fake"
    }

    fn device_count(&self) -> usize {
        self.state().devices.len()
    }

    fn device_info(&self, device: DeviceHandle) -> Option<DeviceInfo> {
        self.state().devices.get(device.0).cloned()
    }

    fn default_device(&self, direction: Direction) -> Option<DeviceHandle> {
        let state = self.state();
        let index = match direction {
            Direction::Capture => state.default_capture,
            Direction::Playback => state.default_playback,
        };
        index.map(DeviceHandle)
    }

    fn is_format_supported(&self, params: &StreamParams) -> Result<(), DeviceError> {
        let mut state = self.state();
        state.calls.push(Call::FormatCheck(params.device.0));
        match &state.unsupported {
            Some(message) => Err(DeviceError::new("format", message.clone())),
            None => Ok(()),
        }
    }

    fn open(&self, params: &StreamParams) -> Result<Box<dyn DeviceStream>, DeviceError> {
        let mut state = self.state();
        state.calls.push(Call::Open(params.device.0));
        if let Some(message) = &state.open_failure {
            return Err(DeviceError::new("open", message.clone()));
        }
        state.opened.push(params.clone());
        Ok(Box::new(FakeStream {
            state: self.state.clone(),
            sample_rate: state.negotiated_rate.unwrap_or(params.format.sample_rate),
            sample_size: state
                .negotiated_sample_size
                .unwrap_or(params.format.sample_size()),
        }))
    }
}

pub struct FakeStream {
    state: Arc<Mutex<FakeState>>,
    sample_rate: f64,
    sample_size: usize,
}

impl FakeStream {
    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

impl DeviceStream for FakeStream {
    fn start(&mut self) -> Result<(), DeviceError> {
        let mut state = self.state();
        state.calls.push(Call::Start);
        match &state.start_failure {
            Some(message) => Err(DeviceError::new("start", message.clone())),
            None => Ok(()),
        }
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.state().calls.push(Call::Stop);
        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        self.state().calls.push(Call::Close);
        Ok(())
    }

    fn available(&mut self) -> i64 {
        let mut state = self.state();
        state.calls.push(Call::Available);
        let idle = state.idle_available;
        state.available.pop_front().unwrap_or(idle)
    }

    fn describe_error(&self, code: i64) -> String {
        format!("fake error {code}")
    }

    /// Fills port `p` with the byte `p + 1`; interleaved fills with 0xAA.
    fn read(
        &mut self,
        buffers: CaptureBuffers<'_>,
        frames: usize,
    ) -> Result<usize, TransferError> {
        let mut state = self.state();
        state.calls.push(Call::Read(frames));
        match buffers {
            CaptureBuffers::Interleaved(buf) => buf.fill(0xAA),
            CaptureBuffers::PerChannel(bufs) => {
                for (port, buf) in bufs.into_iter().enumerate() {
                    buf.fill(port as u8 + 1);
                }
            }
        }
        state.reply(frames)
    }

    fn write(
        &mut self,
        buffers: PlaybackBuffers<'_>,
        frames: usize,
    ) -> Result<usize, TransferError> {
        let mut state = self.state();
        state.calls.push(Call::Write(frames));
        let ports = match buffers {
            PlaybackBuffers::Interleaved(buf) => vec![buf.to_vec()],
            PlaybackBuffers::PerChannel(bufs) => bufs.iter().map(|b| b.to_vec()).collect(),
        };
        state.written.push(ports);
        state.reply(frames)
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn sample_size(&self) -> usize {
        self.sample_size
    }
}

pub fn xrun(direction: Direction, frames: usize) -> Result<usize, TransferError> {
    Err(TransferError::Xrun { direction, frames })
}

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}
