use alsa::pcm::{Access, Format, HwParams, State, PCM};
use alsa::{Direction, ValueOr};
use std::time::Duration;
use tracing::debug;

use super::device::{
    since_trigger, stamp, DeviceStatus, HwGrant, HwRequest, PcmDevice, PcmState, ReadError,
    ResumeError,
};
use super::SampleFormat;
use crate::error::{HardwareFault, ResourceError};

/// ALSA capture PCM opened in blocking mode.
pub struct AlsaDevice {
    pcm: PCM,
}

impl AlsaDevice {
    pub fn open(name: &str) -> Result<Self, ResourceError> {
        let pcm = PCM::new(name, Direction::Capture, false).map_err(|e| ResourceError::DeviceOpen {
            device: name.to_string(),
            reason: e.to_string(),
        })?;
        debug!("Opened ALSA capture device {}", name);
        Ok(Self { pcm })
    }

    pub fn state(&self) -> PcmState {
        map_state(self.pcm.state())
    }
}

fn alsa_format(format: SampleFormat) -> Format {
    match format {
        SampleFormat::S16Le => Format::S16LE,
        SampleFormat::S16Be => Format::S16BE,
        SampleFormat::S24Le => Format::S24LE,
        SampleFormat::S24Be => Format::S24BE,
        SampleFormat::S24Le3 => Format::S243LE,
        SampleFormat::S24Be3 => Format::S243BE,
        SampleFormat::S32Le => Format::S32LE,
        SampleFormat::S32Be => Format::S32BE,
    }
}

fn map_state(state: State) -> PcmState {
    match state {
        State::Open => PcmState::Open,
        State::Setup => PcmState::Setup,
        State::Prepared => PcmState::Prepared,
        State::Running => PcmState::Running,
        State::XRun => PcmState::Xrun,
        State::Draining => PcmState::Draining,
        State::Paused => PcmState::Paused,
        State::Suspended => PcmState::Suspended,
        State::Disconnected => PcmState::Disconnected,
        #[allow(unreachable_patterns)]
        _ => PcmState::Disconnected,
    }
}

impl PcmDevice for AlsaDevice {
    fn negotiate(&mut self, request: &HwRequest) -> Result<HwGrant, String> {
        let hwp = HwParams::any(&self.pcm).map_err(|e| e.to_string())?;
        hwp.set_access(Access::RWInterleaved)
            .map_err(|e| format!("access: {}", e))?;
        hwp.set_format(alsa_format(request.format))
            .map_err(|e| format!("format {}: {}", request.format, e))?;
        hwp.set_channels(request.channels)
            .map_err(|e| format!("channels {}: {}", request.channels, e))?;
        let rate = hwp
            .set_rate_near(request.rate, ValueOr::Nearest)
            .map_err(|e| format!("rate {}Hz not available for capture: {}", request.rate, e))?;
        let period = hwp
            .set_period_size_near(request.period_frames as alsa::pcm::Frames, ValueOr::Nearest)
            .map_err(|e| format!("period size {}: {}", request.period_frames, e))?;
        self.pcm.hw_params(&hwp).map_err(|e| e.to_string())?;

        // Ring buffer size is left to the ALSA runtime; read back what it chose
        let current = self.pcm.hw_params_current().map_err(|e| e.to_string())?;
        let buffer = current.get_buffer_size().map_err(|e| e.to_string())?;

        Ok(HwGrant {
            rate,
            period_frames: period as usize,
            buffer_frames: buffer as usize,
        })
    }

    fn read_interleaved(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        let io = self.pcm.io_bytes();
        io.readi(buf).map_err(|e| match e.errno() {
            libc::EAGAIN => ReadError::Again,
            libc::EPIPE => ReadError::Xrun,
            libc::ESTRPIPE => ReadError::Suspended,
            _ => ReadError::Failed(e.to_string()),
        })
    }

    fn wait(&mut self, timeout: Duration) {
        if let Err(e) = self.pcm.wait(Some(timeout.as_millis() as u32)) {
            debug!("snd_pcm_wait: {}", e);
        }
    }

    fn status(&mut self) -> Result<DeviceStatus, HardwareFault> {
        let status = self
            .pcm
            .status()
            .map_err(|e| HardwareFault::Status(e.to_string()))?;
        let now = status.get_htstamp();
        let trigger = status.get_trigger_htstamp();

        Ok(DeviceStatus {
            state: map_state(status.get_state()),
            since_trigger: since_trigger(
                stamp(now.tv_sec as i64, now.tv_nsec as i64),
                stamp(trigger.tv_sec as i64, trigger.tv_nsec as i64),
            ),
        })
    }

    fn prepare(&mut self) -> Result<(), HardwareFault> {
        self.pcm
            .prepare()
            .map_err(|e| HardwareFault::Prepare(e.to_string()))
    }

    fn resume(&mut self) -> Result<(), ResumeError> {
        self.pcm.resume().map_err(|e| match e.errno() {
            libc::EAGAIN => ResumeError::TryAgain,
            _ => ResumeError::Failed(e.to_string()),
        })
    }

    fn describe(&mut self) -> Option<String> {
        let mut output = alsa::Output::buffer_open().ok()?;
        self.pcm.dump(&mut output).ok()?;
        Some(output.to_string())
    }
}
