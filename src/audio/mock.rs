//! Scripted in-memory PCM device for exercising capture without hardware.

use std::collections::VecDeque;
use std::time::Duration;

use super::device::{DeviceStatus, HwGrant, HwRequest, PcmDevice, PcmState, ReadError, ResumeError};
use super::SampleFormat;
use crate::error::HardwareFault;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReadStep {
    /// Deliver up to this many frames
    Frames(usize),
    Again,
    Xrun,
    Suspend,
    Fail,
}

/// Replays a script of read outcomes, then delivers full reads forever.
///
/// Delivered frames are taken cyclically from `source`.
pub struct ScriptedDevice {
    frame_bytes: usize,
    grant: HwGrant,
    script: VecDeque<ReadStep>,
    resumes_script: VecDeque<Result<(), ResumeError>>,
    status_state: PcmState,
    source: Vec<u8>,
    cursor: usize,
    pub reads: usize,
    pub waits: usize,
    pub prepares: usize,
    pub resumes: usize,
    pub frames_delivered: usize,
    pub negotiated: Option<HwRequest>,
}

impl ScriptedDevice {
    pub fn new(format: SampleFormat, channels: usize) -> Self {
        let frame_bytes = format.physical_bytes() * channels;
        Self {
            frame_bytes,
            grant: HwGrant {
                rate: 44100,
                period_frames: 1024,
                buffer_frames: 4096,
            },
            script: VecDeque::new(),
            resumes_script: VecDeque::new(),
            status_state: PcmState::Xrun,
            source: vec![0; frame_bytes],
            cursor: 0,
            reads: 0,
            waits: 0,
            prepares: 0,
            resumes: 0,
            frames_delivered: 0,
            negotiated: None,
        }
    }

    pub fn granting(mut self, rate: u32, period_frames: usize, buffer_frames: usize) -> Self {
        self.grant = HwGrant {
            rate,
            period_frames,
            buffer_frames,
        };
        self
    }

    pub fn with_script(mut self, steps: impl IntoIterator<Item = ReadStep>) -> Self {
        self.script.extend(steps);
        self
    }

    pub fn with_resumes(mut self, outcomes: impl IntoIterator<Item = Result<(), ResumeError>>) -> Self {
        self.resumes_script.extend(outcomes);
        self
    }

    /// State reported by `status()` after an xrun.
    pub fn reporting(mut self, state: PcmState) -> Self {
        self.status_state = state;
        self
    }

    /// Interleaved bytes played back by successful reads.
    pub fn with_source(mut self, source: Vec<u8>) -> Self {
        assert!(!source.is_empty() && source.len() % self.frame_bytes == 0);
        self.source = source;
        self
    }

    fn deliver(&mut self, buf: &mut [u8], frames: usize) -> usize {
        let frames = frames.min(buf.len() / self.frame_bytes);
        for byte in buf[..frames * self.frame_bytes].iter_mut() {
            *byte = self.source[self.cursor];
            self.cursor = (self.cursor + 1) % self.source.len();
        }
        self.frames_delivered += frames;
        frames
    }
}

impl PcmDevice for ScriptedDevice {
    fn negotiate(&mut self, request: &HwRequest) -> Result<HwGrant, String> {
        self.negotiated = Some(request.clone());
        Ok(self.grant)
    }

    fn read_interleaved(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        self.reads += 1;
        match self.script.pop_front() {
            None => Ok(self.deliver(buf, usize::MAX)),
            Some(ReadStep::Frames(n)) => Ok(self.deliver(buf, n)),
            Some(ReadStep::Again) => Err(ReadError::Again),
            Some(ReadStep::Xrun) => Err(ReadError::Xrun),
            Some(ReadStep::Suspend) => Err(ReadError::Suspended),
            Some(ReadStep::Fail) => Err(ReadError::Failed("Input/output error".to_string())),
        }
    }

    fn wait(&mut self, _timeout: Duration) {
        self.waits += 1;
    }

    fn status(&mut self) -> Result<DeviceStatus, HardwareFault> {
        Ok(DeviceStatus {
            state: self.status_state,
            since_trigger: Some(Duration::from_millis(3)),
        })
    }

    fn prepare(&mut self) -> Result<(), HardwareFault> {
        self.prepares += 1;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), ResumeError> {
        self.resumes += 1;
        self.resumes_script.pop_front().unwrap_or(Ok(()))
    }
}
