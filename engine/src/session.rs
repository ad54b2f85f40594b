use crate::buffer::{CaptureBuffers, PlaybackBuffers};
use crate::device::{DeviceBackend, DeviceInfo, DeviceStream, Direction, StreamParams};
use crate::error::{DeviceError, SetupError, TransferError, WorkError};
use crate::format::StreamFormat;
use tracing::{debug, error, info};

/// The one open hardware stream owned by a block.
pub struct DeviceSession {
    stream: Box<dyn DeviceStream>,
    params: StreamParams,
    device_name: String,
    closed: bool,
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("device_name", &self.device_name)
            .field("params", &self.params)
            .field("closed", &self.closed)
            .finish()
    }
}

impl DeviceSession {
    /// Check the format, open the stream, then verify the negotiated sample
    /// size. Nothing stays open when any step fails.
    pub fn open(
        backend: &dyn DeviceBackend,
        info: DeviceInfo,
        params: StreamParams,
    ) -> Result<Self, SetupError> {
        info!("Using {} through {}", info.name, backend.host_api());

        backend
            .is_format_supported(&params)
            .map_err(SetupError::FormatUnsupported)?;
        let mut stream = backend.open(&params).map_err(SetupError::DeviceOpen)?;

        let requested = params.format.sample_size();
        let negotiated = stream.sample_size();
        if negotiated != requested {
            if let Err(e) = stream.close() {
                error!("{e}");
            }
            return Err(SetupError::FormatMismatch {
                requested,
                negotiated,
            });
        }

        debug!(
            "{} stream open: {} x{} {} @ {} Hz, latency {:?}",
            params.direction,
            params.format.sample,
            params.format.channels,
            params.format.layout,
            stream.sample_rate(),
            params.suggested_latency
        );

        Ok(Self {
            stream,
            params,
            device_name: info.name,
            closed: false,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn params(&self) -> &StreamParams {
        &self.params
    }

    pub fn format(&self) -> &StreamFormat {
        &self.params.format
    }

    pub fn direction(&self) -> Direction {
        self.params.direction
    }

    /// Rate negotiated with the device.
    pub fn sample_rate(&self) -> f64 {
        self.stream.sample_rate()
    }

    pub fn start(&mut self) -> Result<(), DeviceError> {
        self.stream.start()
    }

    pub fn stop(&mut self) -> Result<(), DeviceError> {
        self.stream.stop()
    }

    /// Release the stream. Failures are logged, never returned.
    pub fn close(mut self) {
        self.close_stream();
    }

    fn close_stream(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.stream.close() {
            error!("{} close: {e}", self.device_name);
        }
    }

    /// Frames that can move without blocking in this session's direction.
    pub fn available_frames(&mut self) -> Result<usize, WorkError> {
        let available = self.stream.available();
        if available < 0 {
            let op = match self.params.direction {
                Direction::Capture => "read available",
                Direction::Playback => "write available",
            };
            return Err(WorkError::DeviceQuery {
                op,
                message: self.stream.describe_error(available),
            });
        }
        Ok(available as usize)
    }

    pub fn read(
        &mut self,
        buffers: CaptureBuffers<'_>,
        frames: usize,
    ) -> Result<usize, TransferError> {
        self.stream.read(buffers, frames)
    }

    pub fn write(
        &mut self,
        buffers: PlaybackBuffers<'_>,
        frames: usize,
    ) -> Result<usize, TransferError> {
        self.stream.write(buffers, frames)
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.close_stream();
    }
}
