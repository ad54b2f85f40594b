pub mod backoff;
pub mod block;
pub mod buffer;
pub mod capture;
pub mod clock;
pub mod config;
pub mod device;
pub mod error;
pub mod format;
pub mod hw;
pub mod playback;
pub mod report;
pub mod session;
pub mod work;

pub use block::AudioBlock;
pub use capture::AudioCapture;
pub use config::BlockConfig;
pub use device::{DeviceBackend, DeviceHandle, DeviceSelector, DeviceStream, Direction};
pub use error::{DeviceError, SetupError, TransferError, WorkError};
pub use format::{ChannelLayout, SampleType, StreamFormat};
pub use playback::AudioPlayback;
pub use report::ReportPolicy;
pub use work::{BlockStats, Label, WorkInfo, WorkOutcome};
