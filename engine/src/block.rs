//! Behaviour shared by the capture and playback blocks: device selection,
//! the session lifecycle, reporting and backoff bookkeeping.

use crate::backoff::BackoffController;
use crate::clock::Clock;
use crate::config::BlockConfig;
use crate::device::{
    DeviceBackend, DeviceHandle, DeviceSelector, Direction, StreamParams, resolve,
};
use crate::error::{DeviceError, SetupError, TransferError};
use crate::format::StreamFormat;
use crate::report::{ReportPolicy, Reporter};
use crate::session::DeviceSession;
use crate::work::BlockStats;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

pub struct AudioBlock<C: Clock> {
    pub(crate) name: &'static str,
    pub(crate) direction: Direction,
    backend: Arc<dyn DeviceBackend>,
    device: DeviceHandle,
    format: StreamFormat,
    pub(crate) session: Option<DeviceSession>,
    pub(crate) backoff: BackoffController,
    pub(crate) reporter: Reporter,
    pub(crate) clock: C,
    pub(crate) active: bool,
    pub(crate) stats: BlockStats,
}

impl<C: Clock> std::fmt::Debug for AudioBlock<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioBlock")
            .field("name", &self.name)
            .field("direction", &self.direction)
            .field("device", &self.device)
            .field("format", &self.format)
            .field("session", &self.session)
            .field("backoff", &self.backoff)
            .field("report", &self.reporter.policy())
            .field("active", &self.active)
            .finish()
    }
}

fn open_session(
    backend: &dyn DeviceBackend,
    device: DeviceHandle,
    direction: Direction,
    format: StreamFormat,
) -> Result<DeviceSession, SetupError> {
    let info = backend
        .device_info(device)
        .ok_or(SetupError::DeviceRange {
            index: device.0,
            count: backend.device_count(),
        })?;
    let params = StreamParams {
        device,
        direction,
        format,
        suggested_latency: info.suggested_latency(direction),
    };
    DeviceSession::open(backend, info, params)
}

impl<C: Clock> AudioBlock<C> {
    pub(crate) fn open(
        name: &'static str,
        direction: Direction,
        backend: Arc<dyn DeviceBackend>,
        config: &BlockConfig,
        clock: C,
    ) -> Result<Self, SetupError> {
        let format = config.format()?;
        let device = resolve(backend.as_ref(), &config.selector(), direction)?;
        let session = open_session(backend.as_ref(), device, direction, format)?;
        Ok(Self {
            name,
            direction,
            backend,
            device,
            format,
            session: Some(session),
            backoff: BackoffController::new(config.backoff()),
            reporter: Reporter::new(name, config.report_mode),
            clock,
            active: false,
            stats: BlockStats::default(),
        })
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn device(&self) -> DeviceHandle {
        self.device
    }

    pub fn format(&self) -> &StreamFormat {
        &self.format
    }

    pub fn port_count(&self) -> usize {
        self.format.port_count()
    }

    pub fn port_element_bytes(&self) -> usize {
        self.format.port_element_bytes()
    }

    /// Negotiated device rate, if a stream is open.
    pub fn sample_rate(&self) -> Option<f64> {
        self.session.as_ref().map(DeviceSession::sample_rate)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn stats(&self) -> BlockStats {
        self.stats
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn report_policy(&self) -> ReportPolicy {
        self.reporter.policy()
    }

    pub fn set_report_policy(&mut self, policy: ReportPolicy) {
        self.reporter.set_policy(policy);
    }

    pub fn set_report_mode(&mut self, mode: &str) -> Result<(), SetupError> {
        self.set_report_policy(mode.parse()?);
        Ok(())
    }

    pub fn backoff_time(&self) -> Duration {
        self.backoff.backoff()
    }

    pub fn set_backoff_time(&mut self, millis: u64) {
        self.backoff.set_backoff(Duration::from_millis(millis));
    }

    /// Re-resolve the device and reopen the stream on it. An active stream
    /// is restarted.
    pub(crate) fn setup_device(&mut self, selector: &DeviceSelector) -> Result<(), SetupError> {
        let device = resolve(self.backend.as_ref(), selector, self.direction)?;
        self.reopen(device, self.format)
    }

    /// Reopen the stream at a new sample rate.
    pub(crate) fn setup_stream(&mut self, sample_rate: f64) -> Result<(), SetupError> {
        let format = self.format.with_rate(sample_rate)?;
        self.reopen(self.device, format)
    }

    fn reopen(&mut self, device: DeviceHandle, format: StreamFormat) -> Result<(), SetupError> {
        let was_active = self.active;
        self.deactivate();
        if let Some(old) = self.session.take() {
            old.close();
        }
        let session = open_session(self.backend.as_ref(), device, self.direction, format)?;
        self.device = device;
        self.format = format;
        self.session = Some(session);
        if was_active {
            self.activate()?;
        }
        Ok(())
    }

    /// Start the stream and re-arm the backoff deadline.
    pub(crate) fn activate(&mut self) -> Result<(), SetupError> {
        if self.active {
            debug!("{} already active", self.name);
            return Ok(());
        }
        let session = self.session.as_mut().ok_or_else(|| {
            SetupError::Activate(DeviceError::new("start", "no open stream"))
        })?;
        session.start().map_err(SetupError::Activate)?;
        self.backoff.arm(self.clock.now());
        self.active = true;
        info!("{} active on {}", self.name, session.device_name());
        Ok(())
    }

    /// Stop the stream. Failures are logged only.
    pub(crate) fn deactivate(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(session) = self.session.as_mut() {
            if let Err(e) = session.stop() {
                error!("{} {e}", self.name);
            }
        }
        debug!("{} inactive", self.name);
    }

    /// Book-keep one transfer result and return the frames that moved,
    /// never more than `requested`.
    pub(crate) fn classify(
        &mut self,
        op: &str,
        requested: usize,
        result: &Result<usize, TransferError>,
    ) -> usize {
        self.stats.transfers += 1;
        let moved = match result {
            Ok(moved) => *moved,
            Err(TransferError::Xrun { direction, frames }) => {
                self.stats.xruns += 1;
                self.backoff.record_fault(self.clock.now());
                self.reporter.xrun(op, *direction);
                *frames
            }
            Err(e) => {
                self.stats.io_errors += 1;
                self.reporter.unexpected(op, e);
                0
            }
        };
        if moved < requested {
            debug!("{} {op}: {moved} of {requested} frames", self.name);
        }
        moved.min(requested)
    }
}

impl<C: Clock> Drop for AudioBlock<C> {
    fn drop(&mut self) {
        self.deactivate();
        if let Some(session) = self.session.take() {
            session.close();
        }
    }
}
