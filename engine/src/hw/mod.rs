#[cfg(target_os = "linux")]
pub mod alsa;
pub mod error_fmt;
pub mod latency;
