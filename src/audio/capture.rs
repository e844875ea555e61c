use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use super::device::{HwRequest, PcmDevice, PcmState, ReadError, ResumeError};
use super::SampleFormat;
use crate::error::{CaptureError, ConfigError, HardwareFault};

/// Bounded wait used when the device has no data yet.
const POLL_TIMEOUT: Duration = Duration::from_millis(1000);
/// Sleep between resume attempts while the device stays suspended.
const RESUME_RETRY: Duration = Duration::from_secs(1);

/// Stream parameters as accepted by the device.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    pub device: String,
    pub format: SampleFormat,
    pub channels: u32,
    pub rate: u32,
    pub period_frames: usize,
    /// Hardware ring buffer size chosen by the device
    pub buffer_frames: usize,
}

impl StreamConfig {
    pub fn frame_bytes(&self) -> usize {
        self.format.physical_bytes() * self.channels as usize
    }

    pub fn period_bytes(&self) -> usize {
        self.period_frames * self.frame_bytes()
    }
}

/// Fault counters kept by the capture interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub xruns: u64,
    pub suspends: u64,
}

/// Negotiate `request` with `device` and validate what it accepted.
pub fn configure<D: PcmDevice>(
    device: &mut D,
    name: &str,
    request: &HwRequest,
) -> Result<StreamConfig, ConfigError> {
    let grant = device
        .negotiate(request)
        .map_err(ConfigError::Negotiation)?;

    if grant.rate != request.rate {
        return Err(ConfigError::RateMismatch {
            requested: request.rate,
            negotiated: grant.rate,
        });
    }
    if grant.period_frames == grant.buffer_frames {
        return Err(ConfigError::PeriodEqualsBuffer {
            period: grant.period_frames,
            buffer: grant.buffer_frames,
        });
    }
    if grant.period_frames < 2 || !grant.period_frames.is_power_of_two() {
        return Err(ConfigError::BadPeriod(grant.period_frames));
    }
    if grant.period_frames != request.period_frames {
        info!(
            "Period size adjusted from {} to {} frames",
            request.period_frames, grant.period_frames
        );
    }

    Ok(StreamConfig {
        device: name.to_string(),
        format: request.format,
        channels: request.channels,
        rate: grant.rate,
        period_frames: grant.period_frames,
        buffer_frames: grant.buffer_frames,
    })
}

/// Blocking period reader that absorbs xruns and suspends.
pub struct CaptureInterface<D> {
    device: D,
    stream: StreamConfig,
    stats: CaptureStats,
    resume_retry: Duration,
}

impl<D: PcmDevice> CaptureInterface<D> {
    pub fn new(device: D, stream: StreamConfig) -> Self {
        Self {
            device,
            stream,
            stats: CaptureStats::default(),
            resume_retry: RESUME_RETRY,
        }
    }

    #[cfg(test)]
    pub fn with_resume_retry(mut self, retry: Duration) -> Self {
        self.resume_retry = retry;
        self
    }

    pub fn stream(&self) -> &StreamConfig {
        &self.stream
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    #[cfg(test)]
    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Fill `buf` with exactly one period of interleaved frames.
    ///
    /// Returns the number of frames delivered. Faults that are not xruns or
    /// suspends are fatal.
    pub fn read_period(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError> {
        let frame_bytes = self.stream.frame_bytes();
        let mut remaining = self.stream.period_frames.min(buf.len() / frame_bytes);
        let mut offset = 0;
        let mut total = 0;

        while remaining > 0 {
            let chunk = &mut buf[offset..offset + remaining * frame_bytes];
            match self.device.read_interleaved(chunk) {
                Ok(frames) => {
                    let frames = frames.min(remaining);
                    if frames < remaining {
                        self.device.wait(POLL_TIMEOUT);
                    }
                    total += frames;
                    remaining -= frames;
                    offset += frames * frame_bytes;
                }
                Err(ReadError::Again) => self.device.wait(POLL_TIMEOUT),
                Err(ReadError::Xrun) => self.recover_xrun()?,
                Err(ReadError::Suspended) => self.resume_suspended()?,
                Err(ReadError::Failed(reason)) => return Err(HardwareFault::Read(reason).into()),
            }
        }

        Ok(total)
    }

    fn recover_xrun(&mut self) -> Result<(), HardwareFault> {
        let status = self.device.status()?;
        match status.state {
            PcmState::Xrun => {
                let millis = status
                    .since_trigger
                    .map(|d| d.as_secs_f64() * 1000.0)
                    .unwrap_or(0.0);
                warn!("overrun!!! (at least {:.3} ms long)", millis);
                self.stats.xruns += 1;
                self.device.prepare()
            }
            PcmState::Draining => {
                warn!("capture stream format change? attempting recover...");
                self.stats.xruns += 1;
                self.device.prepare()
            }
            other => Err(HardwareFault::UnexpectedState(other)),
        }
    }

    fn resume_suspended(&mut self) -> Result<(), HardwareFault> {
        warn!("Suspended. Trying resume.");
        self.stats.suspends += 1;
        loop {
            match self.device.resume() {
                Ok(()) => break,
                Err(ResumeError::TryAgain) => thread::sleep(self.resume_retry),
                Err(ResumeError::Failed(reason)) => {
                    warn!("Resume failed ({}). Restarting stream.", reason);
                    self.device.prepare()?;
                    break;
                }
            }
        }
        info!("Resumed capture");
        Ok(())
    }
}
