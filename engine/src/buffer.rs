//! Mapping between scheduler port buffers and device transfers.
//!
//! Interleaved streams own a single port whose bytes go to the device as-is.
//! Per-channel streams hand the device one slice per port, in port order,
//! which must equal channel order.

use crate::error::WorkError;
use crate::format::{ChannelLayout, StreamFormat};

/// Frames requested from a capture device that reports nothing available,
/// so a stalled queue is still probed with a short blocking read.
pub const MIN_FRAMES_BLOCKING: usize = 256;

/// Frames to read this step.
pub fn capture_frames(device_available: usize, scheduler_available: usize) -> usize {
    let device = if device_available == 0 {
        MIN_FRAMES_BLOCKING
    } else {
        device_available
    };
    device.min(scheduler_available)
}

/// Frames to write this step. Zero writable means nothing to do.
pub fn playback_frames(device_available: usize, scheduler_available: usize) -> usize {
    device_available.min(scheduler_available)
}

/// Destination of a device read.
#[derive(Debug)]
pub enum CaptureBuffers<'a> {
    Interleaved(&'a mut [u8]),
    PerChannel(Vec<&'a mut [u8]>),
}

/// Source of a device write.
#[derive(Debug)]
pub enum PlaybackBuffers<'a> {
    Interleaved(&'a [u8]),
    PerChannel(Vec<&'a [u8]>),
}

fn check_ports(
    format: &StreamFormat,
    lens: impl ExactSizeIterator<Item = usize>,
    frames: usize,
) -> Result<usize, WorkError> {
    let expected = format.port_count();
    if lens.len() != expected {
        return Err(WorkError::PortCount {
            expected,
            got: lens.len(),
        });
    }
    let needed = frames * format.port_element_bytes();
    for (port, len) in lens.enumerate() {
        if len < needed {
            return Err(WorkError::ShortBuffer { port, len, needed });
        }
    }
    Ok(needed)
}

impl<'a> CaptureBuffers<'a> {
    /// Borrow exactly `frames` elements from every output port.
    pub fn from_ports(
        format: &StreamFormat,
        ports: &'a mut [&mut [u8]],
        frames: usize,
    ) -> Result<Self, WorkError> {
        let needed = check_ports(format, ports.iter().map(|p| p.len()), frames)?;
        match format.layout {
            ChannelLayout::Interleaved => Ok(CaptureBuffers::Interleaved(&mut ports[0][..needed])),
            ChannelLayout::PerChannel => Ok(CaptureBuffers::PerChannel(
                ports.iter_mut().map(|p| &mut p[..needed]).collect(),
            )),
        }
    }
}

impl<'a> PlaybackBuffers<'a> {
    /// Borrow exactly `frames` elements from every input port.
    pub fn from_ports(
        format: &StreamFormat,
        ports: &'a [&[u8]],
        frames: usize,
    ) -> Result<Self, WorkError> {
        let needed = check_ports(format, ports.iter().map(|p| p.len()), frames)?;
        match format.layout {
            ChannelLayout::Interleaved => Ok(PlaybackBuffers::Interleaved(&ports[0][..needed])),
            ChannelLayout::PerChannel => Ok(PlaybackBuffers::PerChannel(
                ports.iter().map(|p| &p[..needed]).collect(),
            )),
        }
    }
}
