use std::fmt;
use std::time::Duration;

use super::SampleFormat;
use crate::error::HardwareFault;

/// PCM stream state as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcmState {
    Open,
    Setup,
    Prepared,
    Running,
    Xrun,
    Draining,
    Paused,
    Suspended,
    Disconnected,
}

impl fmt::Display for PcmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PcmState::Open => "OPEN",
            PcmState::Setup => "SETUP",
            PcmState::Prepared => "PREPARED",
            PcmState::Running => "RUNNING",
            PcmState::Xrun => "XRUN",
            PcmState::Draining => "DRAINING",
            PcmState::Paused => "PAUSED",
            PcmState::Suspended => "SUSPENDED",
            PcmState::Disconnected => "DISCONNECTED",
        };
        f.write_str(name)
    }
}

/// Snapshot returned by [`PcmDevice::status`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceStatus {
    pub state: PcmState,
    /// Time elapsed since the stream's last trigger event, when known
    pub since_trigger: Option<Duration>,
}

/// Convert a `timespec`-style stamp to a duration; negative fields clamp to 0.
pub fn stamp(sec: i64, nsec: i64) -> Duration {
    let nsec = nsec.clamp(0, 999_999_999) as u32;
    Duration::new(sec.max(0) as u64, nsec)
}

/// Time between the trigger stamp and `now`, both read from the same PCM
/// status snapshot so they share the stream's timestamp clock.
///
/// `None` when the stream was never triggered or the stamps run backwards.
pub fn since_trigger(now: Duration, trigger: Duration) -> Option<Duration> {
    if trigger.is_zero() {
        return None;
    }
    now.checked_sub(trigger)
}

/// Outcome of a failed interleaved read.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadError {
    /// No data available yet
    Again,
    /// Overrun (capture) / underrun (playback)
    Xrun,
    /// Device was suspended by power management
    Suspended,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResumeError {
    /// Suspend flag not yet released
    TryAgain,
    Failed(String),
}

/// Parameters requested from the device during negotiation.
#[derive(Debug, Clone, PartialEq)]
pub struct HwRequest {
    pub format: SampleFormat,
    pub channels: u32,
    pub rate: u32,
    pub period_frames: usize,
}

/// Parameters the device actually accepted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HwGrant {
    pub rate: u32,
    pub period_frames: usize,
    pub buffer_frames: usize,
}

/// A capture-capable PCM device.
///
/// Reads are interleaved and blocking; the frame count of a read is implied by
/// the byte length of the buffer handed in.
pub trait PcmDevice {
    /// Install interleaved access, format and channel count, and the rate and
    /// period size nearest to the request.
    fn negotiate(&mut self, request: &HwRequest) -> Result<HwGrant, String>;

    fn read_interleaved(&mut self, buf: &mut [u8]) -> Result<usize, ReadError>;

    /// Block until the device is ready or the timeout expires.
    fn wait(&mut self, timeout: Duration);

    fn status(&mut self) -> Result<DeviceStatus, HardwareFault>;

    /// Re-arm the stream after a fault.
    fn prepare(&mut self) -> Result<(), HardwareFault>;

    fn resume(&mut self) -> Result<(), ResumeError>;

    /// Human-readable dump of the PCM setup, if the backend can produce one.
    fn describe(&mut self) -> Option<String> {
        None
    }
}

impl<D: PcmDevice + ?Sized> PcmDevice for &mut D {
    fn negotiate(&mut self, request: &HwRequest) -> Result<HwGrant, String> {
        (**self).negotiate(request)
    }

    fn read_interleaved(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        (**self).read_interleaved(buf)
    }

    fn wait(&mut self, timeout: Duration) {
        (**self).wait(timeout)
    }

    fn status(&mut self) -> Result<DeviceStatus, HardwareFault> {
        (**self).status()
    }

    fn prepare(&mut self) -> Result<(), HardwareFault> {
        (**self).prepare()
    }

    fn resume(&mut self) -> Result<(), ResumeError> {
        (**self).resume()
    }

    fn describe(&mut self) -> Option<String> {
        (**self).describe()
    }
}
