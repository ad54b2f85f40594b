use crate::device::Direction;
use thiserror::Error;

/// Failure reported by a device backend for a single operation.
#[derive(Debug, Clone, Error)]
#[error("{op}: {message}")]
pub struct DeviceError {
    pub op: &'static str,
    pub message: String,
}

impl DeviceError {
    pub fn new(op: &'static str, message: impl Into<String>) -> Self {
        Self {
            op,
            message: message.into(),
        }
    }
}

/// Outcome of a failed read or write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// Capture overrun or playback underrun. `frames` still moved.
    #[error("{direction} xrun after {frames} frames")]
    Xrun { direction: Direction, frames: usize },
    #[error("device error {code}: {message}")]
    Io { code: i32, message: String },
}

/// Fatal errors raised while constructing or reconfiguring a block.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("device index {index} out of range ({count} devices)")]
    DeviceRange { index: usize, count: usize },

    #[error("no device named '{0}'")]
    DeviceNotFound(String),

    #[error("no default {0} device")]
    NoDefaultDevice(Direction),

    #[error("format not supported: {0}")]
    FormatUnsupported(#[source] DeviceError),

    #[error("failed to open device: {0}")]
    DeviceOpen(#[source] DeviceError),

    #[error("sample size mismatch: requested {requested} bytes, device negotiated {negotiated}")]
    FormatMismatch { requested: usize, negotiated: usize },

    #[error("failed to start stream: {0}")]
    Activate(#[source] DeviceError),

    #[error("invalid {name}: {value}")]
    InvalidArgument { name: &'static str, value: String },
}

impl SetupError {
    pub fn invalid(name: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            value: value.into(),
        }
    }
}

/// Errors that end a service step. Transfer conditions never show up here.
#[derive(Debug, Error)]
pub enum WorkError {
    /// A failed reconfiguration left the block without a stream.
    #[error("{0} has no open stream")]
    NoStream(&'static str),

    #[error("{op} failed: {message}")]
    DeviceQuery { op: &'static str, message: String },

    #[error("expected {expected} ports, got {got}")]
    PortCount { expected: usize, got: usize },

    #[error("port {port} holds {len} bytes, {needed} needed")]
    ShortBuffer {
        port: usize,
        len: usize,
        needed: usize,
    },
}
