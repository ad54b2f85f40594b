use crate::device::Direction;
use crate::error::DeviceError;
use std::fmt::Display;

pub fn backend_open_error(
    backend: &str,
    direction: Direction,
    device: &str,
    err: impl Display,
) -> DeviceError {
    DeviceError::new("open", format!("{backend} {direction} '{device}': {err}"))
}

pub fn backend_param_error(
    backend: &str,
    direction: Direction,
    param: &'static str,
    err: impl Display,
) -> DeviceError {
    DeviceError::new(param, format!("{backend} {direction}: {err}"))
}

pub fn backend_state_error(
    backend: &str,
    direction: Direction,
    op: &'static str,
    err: impl Display,
) -> DeviceError {
    DeviceError::new(op, format!("{backend} {direction} {op} failed: {err}"))
}
