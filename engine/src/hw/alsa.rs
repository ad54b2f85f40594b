use super::error_fmt;
use super::latency;
use crate::buffer::{CaptureBuffers, PlaybackBuffers};
use crate::device::{
    DeviceBackend, DeviceHandle, DeviceInfo, DeviceStream, Direction, StreamParams,
};
use crate::error::{DeviceError, TransferError};
use crate::format::{ChannelLayout, SampleType};
use alsa::device_name::HintIter;
use alsa::pcm::{Access, Format, HwParams, PCM, State};
use alsa::{Direction as PcmDirection, ValueOr};
use nix::errno::Errno;
use nix::libc;
use tracing::{debug, warn};

const BACKEND: &str = "ALSA";
const DEFAULT_DEVICE: &str = "default";
const REFERENCE_RATE: f64 = 44_100.0;
const LOW_LATENCY_FRAMES: usize = 512;
const HIGH_LATENCY_FRAMES: usize = 2048;

fn pcm_direction(direction: Direction) -> PcmDirection {
    match direction {
        Direction::Capture => PcmDirection::Capture,
        Direction::Playback => PcmDirection::Playback,
    }
}

fn pcm_format(sample: SampleType) -> Format {
    match sample {
        SampleType::Float32 => Format::float(),
        SampleType::Int32 => Format::s32(),
        SampleType::UInt32 => Format::u32(),
        SampleType::Int16 => Format::s16(),
        SampleType::UInt16 => Format::u16(),
        SampleType::Int8 => Format::S8,
        SampleType::UInt8 => Format::U8,
    }
}

fn probe_channels(name: &str, direction: PcmDirection) -> usize {
    let Ok(pcm) = PCM::new(name, direction, true) else {
        return 0;
    };
    let Ok(hwp) = HwParams::any(&pcm) else {
        return 0;
    };
    hwp.get_channels_max().map(|v| v as usize).unwrap_or(0)
}

/// Device table built from the PCM name hints.
#[derive(Debug, Clone)]
pub struct AlsaBackend {
    devices: Vec<DeviceInfo>,
}

impl AlsaBackend {
    pub fn new() -> Result<Self, DeviceError> {
        let hints = HintIter::new_str(None, "pcm")
            .map_err(|e| DeviceError::new("enumerate", format!("{BACKEND} pcm hints: {e}")))?;
        let low = latency::frames_latency(LOW_LATENCY_FRAMES, REFERENCE_RATE);
        let high = latency::frames_latency(HIGH_LATENCY_FRAMES, REFERENCE_RATE);

        let mut devices = Vec::new();
        for hint in hints {
            let Some(name) = hint.name else {
                continue;
            };
            let (input, output) = match hint.direction {
                Some(PcmDirection::Capture) => (true, false),
                Some(PcmDirection::Playback) => (false, true),
                None => (true, true),
            };
            let max_input_channels = if input {
                probe_channels(&name, PcmDirection::Capture)
            } else {
                0
            };
            let max_output_channels = if output {
                probe_channels(&name, PcmDirection::Playback)
            } else {
                0
            };
            devices.push(DeviceInfo {
                name,
                host_api: BACKEND.to_string(),
                max_input_channels,
                max_output_channels,
                low_input_latency: low,
                high_input_latency: high,
                low_output_latency: low,
                high_output_latency: high,
            });
        }
        debug!("{BACKEND}: {} pcm devices", devices.len());
        Ok(Self { devices })
    }

    fn device_name(&self, device: DeviceHandle) -> Result<&str, DeviceError> {
        self.devices
            .get(device.0)
            .map(|d| d.name.as_str())
            .ok_or_else(|| DeviceError::new("lookup", format!("no device {}", device.0)))
    }
}

fn has_channels(info: &DeviceInfo, direction: Direction) -> bool {
    match direction {
        Direction::Capture => info.max_input_channels > 0,
        Direction::Playback => info.max_output_channels > 0,
    }
}

/// Constrain hw params to the requested format without committing them.
fn configure<'a>(pcm: &'a PCM, params: &StreamParams) -> Result<HwParams<'a>, DeviceError> {
    let dir = params.direction;
    let format = &params.format;
    let hwp = HwParams::any(pcm)
        .map_err(|e| error_fmt::backend_param_error(BACKEND, dir, "hw params", e))?;
    let access = match format.layout {
        ChannelLayout::Interleaved => Access::RWInterleaved,
        ChannelLayout::PerChannel => Access::RWNonInterleaved,
    };
    hwp.set_access(access)
        .map_err(|e| error_fmt::backend_param_error(BACKEND, dir, "access", e))?;
    hwp.set_format(pcm_format(format.sample))
        .map_err(|e| error_fmt::backend_param_error(BACKEND, dir, "format", e))?;
    hwp.set_channels(format.channels as u32)
        .map_err(|e| error_fmt::backend_param_error(BACKEND, dir, "channels", e))?;

    let rate = format.sample_rate.round() as u32;
    hwp.set_rate(rate, ValueOr::Nearest)
        .map_err(|e| error_fmt::backend_param_error(BACKEND, dir, "rate", e))?;
    let actual = hwp
        .get_rate()
        .map_err(|e| error_fmt::backend_param_error(BACKEND, dir, "rate", e))?;
    if actual != rate {
        return Err(error_fmt::backend_param_error(
            BACKEND,
            dir,
            "rate",
            format!("{rate} Hz unsupported, nearest is {actual} Hz"),
        ));
    }
    Ok(hwp)
}

impl DeviceBackend for AlsaBackend {
    fn host_api(&self) -> &str {
        BACKEND
    }

    fn device_count(&self) -> usize {
        self.devices.len()
    }

    fn device_info(&self, device: DeviceHandle) -> Option<DeviceInfo> {
        self.devices.get(device.0).cloned()
    }

    fn default_device(&self, direction: Direction) -> Option<DeviceHandle> {
        self.devices
            .iter()
            .position(|d| d.name == DEFAULT_DEVICE && has_channels(d, direction))
            .or_else(|| self.devices.iter().position(|d| has_channels(d, direction)))
            .map(DeviceHandle)
    }

    fn is_format_supported(&self, params: &StreamParams) -> Result<(), DeviceError> {
        let name = self.device_name(params.device)?;
        let pcm = PCM::new(name, pcm_direction(params.direction), true)
            .map_err(|e| error_fmt::backend_open_error(BACKEND, params.direction, name, e))?;
        configure(&pcm, params).map(|_| ())
    }

    fn open(&self, params: &StreamParams) -> Result<Box<dyn DeviceStream>, DeviceError> {
        let dir = params.direction;
        let name = self.device_name(params.device)?;
        let pcm = PCM::new(name, pcm_direction(dir), false)
            .map_err(|e| error_fmt::backend_open_error(BACKEND, dir, name, e))?;

        let rate = {
            let hwp = configure(&pcm, params)?;
            let frames = latency::latency_frames(params.suggested_latency, params.format.sample_rate);
            hwp.set_buffer_size_near(frames as _)
                .map_err(|e| error_fmt::backend_param_error(BACKEND, dir, "buffer size", e))?;
            pcm.hw_params(&hwp)
                .map_err(|e| error_fmt::backend_param_error(BACKEND, dir, "hw params", e))?;
            let current = pcm
                .hw_params_current()
                .map_err(|e| error_fmt::backend_param_error(BACKEND, dir, "hw params", e))?;
            if dir == Direction::Playback {
                let period = current
                    .get_period_size()
                    .map_err(|e| error_fmt::backend_param_error(BACKEND, dir, "period", e))?;
                let swp = pcm
                    .sw_params_current()
                    .map_err(|e| error_fmt::backend_param_error(BACKEND, dir, "sw params", e))?;
                swp.set_start_threshold(period)
                    .map_err(|e| error_fmt::backend_param_error(BACKEND, dir, "sw params", e))?;
                pcm.sw_params(&swp)
                    .map_err(|e| error_fmt::backend_param_error(BACKEND, dir, "sw params", e))?;
            }
            current
                .get_rate()
                .map_err(|e| error_fmt::backend_param_error(BACKEND, dir, "rate", e))?
        };

        let channels = params.format.channels;
        let sample_size = pcm.frames_to_bytes(1).max(0) as usize / channels;
        debug!("{BACKEND} {dir} '{name}' open: {rate} Hz, {sample_size} bytes/sample");

        Ok(Box::new(AlsaStream {
            pcm: Some(pcm),
            direction: dir,
            rate: rate as f64,
            sample_size,
            pending_xrun: false,
        }))
    }
}

/// Blocking PCM handle for one direction.
pub struct AlsaStream {
    pcm: Option<PCM>,
    direction: Direction,
    rate: f64,
    sample_size: usize,
    pending_xrun: bool,
}

fn closed(direction: Direction) -> DeviceError {
    error_fmt::backend_state_error(BACKEND, direction, "access", "stream closed")
}

/// Bring a PCM back after an xrun; capture streams must be restarted.
fn recover(pcm: &PCM, direction: Direction, err: alsa::Error) {
    if let Err(e) = pcm.try_recover(err, true) {
        warn!("{BACKEND} {direction} recover failed: {e}");
        return;
    }
    if direction == Direction::Capture {
        if let Err(e) = pcm.start() {
            warn!("{BACKEND} {direction} restart failed: {e}");
        }
    }
}

fn is_xrun(pcm: &PCM, err: &alsa::Error) -> bool {
    err.errno() == libc::EPIPE || pcm.state() == State::XRun
}

impl AlsaStream {
    /// Turn a PCM transfer result into frames moved. An xrun seen by an
    /// earlier availability query is reported with the frames that moved
    /// after recovery.
    fn finish(
        &mut self,
        op: &str,
        result: alsa::Result<usize>,
        frames: usize,
    ) -> Result<usize, TransferError> {
        let direction = self.direction;
        let Some(pcm) = self.pcm.as_ref() else {
            return Err(TransferError::Io {
                code: libc::EBADF,
                message: closed(direction).to_string(),
            });
        };
        match result {
            Ok(moved) => {
                if moved < frames {
                    debug!("{BACKEND} {direction} short {op}: {moved}/{frames}");
                }
                if std::mem::take(&mut self.pending_xrun) {
                    return Err(TransferError::Xrun {
                        direction,
                        frames: moved,
                    });
                }
                Ok(moved)
            }
            Err(e) if is_xrun(pcm, &e) => {
                recover(pcm, direction, e);
                self.pending_xrun = false;
                Err(TransferError::Xrun {
                    direction,
                    frames: 0,
                })
            }
            Err(e) => Err(TransferError::Io {
                code: e.errno(),
                message: e.to_string(),
            }),
        }
    }
}

impl DeviceStream for AlsaStream {
    fn start(&mut self) -> Result<(), DeviceError> {
        let direction = self.direction;
        let pcm = self.pcm.as_ref().ok_or_else(|| closed(direction))?;
        if pcm.state() != State::Prepared {
            pcm.prepare()
                .map_err(|e| error_fmt::backend_state_error(BACKEND, direction, "prepare", e))?;
        }
        // Playback starts itself once a period has been written.
        if direction == Direction::Capture {
            pcm.start()
                .map_err(|e| error_fmt::backend_state_error(BACKEND, direction, "start", e))?;
        }
        self.pending_xrun = false;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        let direction = self.direction;
        let pcm = self.pcm.as_ref().ok_or_else(|| closed(direction))?;
        pcm.drop()
            .map_err(|e| error_fmt::backend_state_error(BACKEND, direction, "stop", e))
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        match self.pcm.take() {
            Some(_) => Ok(()),
            None => Err(closed(self.direction)),
        }
    }

    fn available(&mut self) -> i64 {
        let direction = self.direction;
        let Some(pcm) = self.pcm.as_ref() else {
            return -(libc::EBADF as i64);
        };
        match pcm.avail_update() {
            Ok(frames) => frames as i64,
            Err(e) if e.errno() == libc::EPIPE => {
                recover(pcm, direction, e);
                self.pending_xrun = true;
                0
            }
            Err(e) => -(e.errno() as i64),
        }
    }

    fn describe_error(&self, code: i64) -> String {
        Errno::from_raw(code.unsigned_abs() as i32).desc().to_string()
    }

    fn read(
        &mut self,
        buffers: CaptureBuffers<'_>,
        frames: usize,
    ) -> Result<usize, TransferError> {
        let result = match self.pcm.as_ref() {
            Some(pcm) => {
                let io = pcm.io_bytes();
                match buffers {
                    CaptureBuffers::Interleaved(buf) => io.readi(buf),
                    CaptureBuffers::PerChannel(mut bufs) => {
                        let mut ptrs: Vec<*mut u8> =
                            bufs.iter_mut().map(|b| b.as_mut_ptr()).collect();
                        // SAFETY: one pointer per channel, each into a slice
                        // checked to hold `frames` samples.
                        unsafe { io.readn(&mut ptrs, frames) }
                    }
                }
            }
            None => Ok(0),
        };
        self.finish("read", result, frames)
    }

    fn write(
        &mut self,
        buffers: PlaybackBuffers<'_>,
        frames: usize,
    ) -> Result<usize, TransferError> {
        let result = match self.pcm.as_ref() {
            Some(pcm) => {
                let io = pcm.io_bytes();
                match buffers {
                    PlaybackBuffers::Interleaved(buf) => io.writei(buf),
                    PlaybackBuffers::PerChannel(bufs) => {
                        let ptrs: Vec<*const u8> = bufs.iter().map(|b| b.as_ptr()).collect();
                        // SAFETY: as in `read`, every slice holds `frames` samples.
                        unsafe { io.writen(&ptrs, frames) }
                    }
                }
            }
            None => Ok(0),
        };
        self.finish("write", result, frames)
    }

    fn sample_rate(&self) -> f64 {
        self.rate
    }

    fn sample_size(&self) -> usize {
        self.sample_size
    }
}
