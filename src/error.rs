//! Error taxonomy for the capture pipeline.
//!
//! Transient hardware faults (xrun, suspend) are absorbed inside
//! [`crate::audio::capture`] and never show up here.

use thiserror::Error;

use crate::audio::PcmState;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("hardware fault: {0}")]
    Hardware(#[from] HardwareFault),
}

/// Rejected before the capture loop is entered.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("unrecognized sample format '{0}' (recognized: S16_LE S16_BE S24_LE S24_BE S24_3LE S24_3BE S32_LE S32_BE)")]
    UnknownFormat(String),

    #[error("unsigned formats not supported: {0}")]
    UnsignedFormat(String),

    #[error("float formats not supported: {0}")]
    FloatFormat(String),

    #[error("invalid non-linear format: {0}")]
    NonLinearFormat(String),

    #[error("channel count must be at least 1")]
    NoChannels,

    #[error("period size must be a power of two of at least 2 frames (got {0})")]
    BadPeriod(usize),

    #[error("rate doesn't match (requested {requested}Hz, got {negotiated}Hz)")]
    RateMismatch { requested: u32, negotiated: u32 },

    #[error("can't use period equal to buffer size ({period} == {buffer})")]
    PeriodEqualsBuffer { period: usize, buffer: usize },

    #[error("raw dump needs samples narrower than 32 bits, {format} is {bits} bits wide")]
    RawDumpTooWide { format: &'static str, bits: u32 },

    #[error("device rejected hardware parameters: {0}")]
    Negotiation(String),
}

#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("failed to allocate {what} ({bytes} bytes)")]
    Allocation { what: &'static str, bytes: usize },

    #[error("shared memory region '{name}': {source}")]
    SharedMemory {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open PCM device '{device}': {reason}")]
    DeviceOpen { device: String, reason: String },
}

/// Any device condition outside the known transient set.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HardwareFault {
    #[error("read error: {0}")]
    Read(String),

    #[error("status error: {0}")]
    Status(String),

    #[error("prepare error: {0}")]
    Prepare(String),

    #[error("read/write error, state = {0}")]
    UnexpectedState(PcmState),
}
