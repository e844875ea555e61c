use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::audio::capture::{self, CaptureInterface, CaptureStats, StreamConfig};
use crate::audio::{
    calibrate, BandFrame, ChannelBuffer, PcmDevice, SampleDecoder, SmoothingState,
    SpectrumAnalyzer, BAND_COUNT,
};
use crate::config::{AnalysisConfig, Config};
use crate::error::{CaptureError, ResourceError};
use crate::publish::{Publish, ShmPublisher};
use crate::rt;

fn zeroed_period(len: usize) -> Result<Vec<u8>, ResourceError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| ResourceError::Allocation {
            what: "period buffer",
            bytes: len,
        })?;
    buf.resize(len, 0);
    Ok(buf)
}

/// Capture → decode → transform → calibrate → publish, once per period.
pub struct Engine<D, P> {
    capture: CaptureInterface<D>,
    decoder: SampleDecoder,
    analyzer: SpectrumAnalyzer,
    smoothing: SmoothingState,
    publisher: P,
    period: Vec<u8>,
    channels: ChannelBuffer,
    frames_published: u64,
}

impl<D: PcmDevice, P: Publish> Engine<D, P> {
    pub fn new(
        capture: CaptureInterface<D>,
        analysis: AnalysisConfig,
        publisher: P,
    ) -> Result<Self, ResourceError> {
        let stream = capture.stream();
        let channels = stream.channels as usize;
        let period = zeroed_period(stream.period_bytes())?;
        let analyzer = SpectrumAnalyzer::new(
            stream.period_frames,
            stream.rate,
            analysis.window,
            analysis.band_policy,
        );
        debug!(
            "{} bins of {:.2} Hz, {:?} window, {:?} band policy",
            analyzer.band_map().len(),
            analyzer.band_map().hz_per_bin(),
            analysis.window,
            analysis.band_policy
        );

        Ok(Self {
            decoder: SampleDecoder::new(stream.format, channels),
            analyzer,
            smoothing: SmoothingState::default(),
            channels: ChannelBuffer::new(stream.period_frames, channels),
            period,
            publisher,
            capture,
            frames_published: 0,
        })
    }

    pub fn capture_stats(&self) -> CaptureStats {
        self.capture.stats()
    }

    pub fn frames_published(&self) -> u64 {
        self.frames_published
    }

    #[cfg(test)]
    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Run one full cycle and return the frame that was published.
    pub fn cycle(&mut self) -> Result<BandFrame, CaptureError> {
        let expected = self.capture.stream().period_frames;
        let frames = self.capture.read_period(&mut self.period)?;
        if frames != expected {
            warn!("copied {} instead of {} frames", frames, expected);
        }

        let frame_bytes = self.capture.stream().frame_bytes();
        self.channels.clear();
        self.decoder.deinterleave(
            &self.period[..frames * frame_bytes],
            &mut self.channels,
            self.publisher.raw_samples(),
        );

        if self.frames_published == 0 {
            if let Ok(status) = self.capture.device_mut().status() {
                info!("PCM stream state: {}", status.state);
            }
        }

        let raw = self.analyzer.analyze(self.channels.channel(0));
        let (frame, smoothing) = calibrate(&raw, &self.smoothing);
        self.smoothing = smoothing;

        for band in 0..BAND_COUNT {
            debug!(
                band,
                bins = self.analyzer.band_map().bins(band).len(),
                display = frame.0[band],
                raw = raw[band],
                ln_raw = raw[band].ln(),
                "band level"
            );
        }

        self.publisher.publish(&frame);
        self.frames_published += 1;
        Ok(frame)
    }

    /// Cycle until `shutdown` is raised. The flag is checked once per period,
    /// so shutdown waits for the read in flight.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<u64, CaptureError> {
        while !shutdown.load(Ordering::SeqCst) {
            self.cycle()?;
        }
        Ok(self.frames_published)
    }
}

fn log_stream_summary(stream: &StreamConfig) {
    info!(
        "Accepted hardware parameters for {}: {}Hz, {}, {} channel(s), ring buffer {} frames, period {} frames",
        stream.device,
        stream.rate, stream.format, stream.channels, stream.buffer_frames, stream.period_frames
    );
    let sample_bits = stream.format.physical_bits();
    info!(
        "PCM data transfer: {} bits/sample, {} bits/frame, {} bytes/period",
        sample_bits,
        sample_bits * stream.channels,
        stream.period_bytes()
    );
}

/// Negotiate the stream, map the publish regions and run until shutdown.
///
/// Returns the number of frames published.
pub fn start<D: PcmDevice>(
    mut device: D,
    config: &Config,
    shutdown: &AtomicBool,
) -> Result<u64, CaptureError> {
    config.validate()?;

    let stream = capture::configure(&mut device, &config.capture.device, &config.hw_request())?;
    if let Ok(status) = device.status() {
        info!("PCM stream state: {}", status.state);
    }

    if config.verbose {
        match device.describe() {
            Some(dump) => info!("PCM setup:\n{}", dump),
            None => log_stream_summary(&stream),
        }
    } else {
        log_stream_summary(&stream);
    }

    let publisher = ShmPublisher::create(
        &config.publish.band_region,
        config.publish.raw_dump.as_deref(),
        stream.period_frames,
    )?;
    let mut engine = Engine::new(CaptureInterface::new(device, stream), config.analysis, publisher)?;

    if config.realtime.enabled {
        if let Err(e) = rt::go_realtime(config.realtime.priority) {
            warn!("failed to go firm realtime: {}", e);
        }
    }

    let published = engine.run(shutdown)?;
    let stats = engine.capture_stats();
    info!(
        "Capture stopped after {} frames ({} xruns, {} suspends)",
        published, stats.xruns, stats.suspends
    );
    Ok(published)
}
