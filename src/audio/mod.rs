#[cfg(feature = "alsa")]
mod alsa_device;
pub mod bands;
pub mod calibrate;
pub mod capture;
pub mod decode;
pub mod device;
pub mod fft;
mod format;
#[cfg(test)]
pub(crate) mod mock;

#[cfg(feature = "alsa")]
pub use alsa_device::AlsaDevice;
pub use bands::BAND_COUNT;
pub use calibrate::{calibrate, BandFrame, SmoothingState};
pub use decode::{ChannelBuffer, SampleDecoder};
pub use device::{HwRequest, PcmDevice, PcmState};
pub use fft::SpectrumAnalyzer;
pub use format::SampleFormat;
