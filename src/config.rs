use anyhow::Result;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::audio::{HwRequest, SampleFormat};
use crate::error::ConfigError;

/// Weighting applied to each period before the transform
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, ValueEnum, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    /// All-ones placeholder window
    #[default]
    Rectangular,
    Hann,
}

/// How the bins of a band collapse into one magnitude
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, ValueEnum, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum BandPolicy {
    /// Tallest bin in the band
    #[default]
    Peak,
    /// Mean bin magnitude across the band
    Average,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    /// Dump the PCM setup instead of the negotiated summary
    #[serde(skip)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub device: String,
    pub rate: u32,
    pub channels: u32,
    pub period_frames: usize,
    pub format: SampleFormat,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: "plughw:0,0".to_string(),
            rate: 44100,
            channels: 2,
            period_frames: 1024,
            format: SampleFormat::S16Le,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AnalysisConfig {
    pub window: WindowKind,
    pub band_policy: BandPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Shared memory name of the band magnitude region
    pub band_region: String,
    /// Shared memory name for the raw channel 0 dump (disabled when unset)
    pub raw_dump: Option<String>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            band_region: "bandscope_fband_data".to_string(),
            raw_dump: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    pub enabled: bool,
    /// SCHED_FIFO priority, 1 (lowest) to 99 (highest)
    pub priority: i32,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: 40,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Get the default XDG config path (~/.config/bandscope/config.toml)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("bandscope").join("config.toml"))
    }

    /// Load config from the default XDG path if it exists
    /// Returns None if file doesn't exist, logs warning on parse errors
    pub fn load_from_default_path() -> Option<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            match Self::load(&path) {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse config at {}: {}. Using defaults.",
                        path.display(),
                        e
                    );
                    None
                }
            }
        } else {
            None
        }
    }

    /// Initialize default config file at XDG path, returns the path
    pub fn init_default_config() -> Result<PathBuf> {
        let path = Self::default_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&path, Self::generate_config_template())?;

        Ok(path)
    }

    /// Generate a commented TOML config template
    pub fn generate_config_template() -> String {
        r#"# Bandscope Configuration
# This file is auto-generated. Edit as needed.

[capture]
# ALSA PCM device, e.g. "plughw:0,0" or "default"
device = "plughw:0,0"
# Sample rate in Hz; the device must accept it exactly
rate = 44100
# Channel count (only channel 0 is analyzed)
channels = 2
# Period size in frames, a power of two (nearest size the device accepts is used)
period_frames = 1024
# Sample format: S16_LE S16_BE S24_LE S24_BE S24_3LE S24_3BE S32_LE S32_BE
format = "S16_LE"

[analysis]
# Window applied before the FFT: "rectangular" or "hann"
window = "rectangular"
# Band magnitude: "peak" (tallest bin) or "average" (mean of bins)
band_policy = "peak"

[publish]
# POSIX shared memory name holding the 15 band magnitudes (f32)
band_region = "bandscope_fband_data"
# Shared memory name for raw channel 0 samples (i32); omit to disable
# raw_dump = "bandscope_raw"

[realtime]
# Request SCHED_FIFO and lock memory (failure is only a warning)
enabled = true
# SCHED_FIFO priority: 1 (lowest) to 99 (highest)
priority = 40
"#
        .to_string()
    }

    /// Merge CLI arguments into config (CLI takes priority)
    pub fn merge_args(&mut self, args: &crate::Args) {
        if let Some(ref device) = args.device {
            self.capture.device = device.clone();
        }
        if let Some(rate) = args.rate {
            self.capture.rate = rate;
        }
        if let Some(channels) = args.channels {
            self.capture.channels = channels;
        }
        if let Some(period) = args.period_size {
            self.capture.period_frames = period;
        }
        if let Some(format) = args.format {
            self.capture.format = format;
        }

        if let Some(window) = args.window {
            self.analysis.window = window;
        }
        if let Some(policy) = args.policy {
            self.analysis.band_policy = policy;
        }

        if let Some(ref name) = args.band_region {
            self.publish.band_region = name.clone();
        }
        if let Some(ref name) = args.dumpfile {
            self.publish.raw_dump = Some(name.clone());
        }

        if args.no_realtime {
            self.realtime.enabled = false;
        }
        if args.verbose {
            self.verbose = true;
        }
    }

    /// Checks that need no device: run before anything is opened or mapped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture.channels == 0 {
            return Err(ConfigError::NoChannels);
        }
        let period = self.capture.period_frames;
        if period < 2 || !period.is_power_of_two() {
            return Err(ConfigError::BadPeriod(period));
        }
        if self.publish.raw_dump.is_some() {
            let format = self.capture.format;
            // Raw dumps are refused for 32-bit-wide containers, including 24-in-4
            if format.physical_bits() >= 32 {
                return Err(ConfigError::RawDumpTooWide {
                    format: format.name(),
                    bits: format.physical_bits(),
                });
            }
        }
        Ok(())
    }

    pub fn hw_request(&self) -> HwRequest {
        HwRequest {
            format: self.capture.format,
            channels: self.capture.channels,
            rate: self.capture.rate,
            period_frames: self.capture.period_frames,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_template() {
        let parsed: Config = toml::from_str(&Config::generate_config_template()).unwrap();
        let defaults = Config::default();
        assert_eq!(parsed.capture.device, defaults.capture.device);
        assert_eq!(parsed.capture.rate, 44100);
        assert_eq!(parsed.capture.channels, 2);
        assert_eq!(parsed.capture.period_frames, 1024);
        assert_eq!(parsed.capture.format, SampleFormat::S16Le);
        assert_eq!(parsed.analysis.window, WindowKind::Rectangular);
        assert_eq!(parsed.analysis.band_policy, BandPolicy::Peak);
        assert_eq!(parsed.publish.band_region, defaults.publish.band_region);
        assert_eq!(parsed.publish.raw_dump, None);
        assert!(parsed.realtime.enabled);
        assert_eq!(parsed.realtime.priority, 40);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [capture]
            format = "s24_3le"
            rate = 48000

            [analysis]
            band_policy = "average"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.capture.format, SampleFormat::S24Le3);
        assert_eq!(parsed.capture.rate, 48000);
        assert_eq!(parsed.capture.channels, 2);
        assert_eq!(parsed.analysis.band_policy, BandPolicy::Average);
        assert_eq!(parsed.analysis.window, WindowKind::Rectangular);
    }

    #[test]
    fn unsupported_format_in_file_is_a_parse_error() {
        let err = toml::from_str::<Config>("[capture]\nformat = \"U8\"\n").unwrap_err();
        assert!(err.to_string().contains("unsigned"));
    }

    #[test]
    fn validate_rejects_bad_channels_and_periods() {
        let mut config = Config::default();
        config.capture.channels = 0;
        assert_eq!(config.validate(), Err(ConfigError::NoChannels));

        let mut config = Config::default();
        config.capture.period_frames = 1000;
        assert_eq!(config.validate(), Err(ConfigError::BadPeriod(1000)));
    }

    #[test]
    fn raw_dump_rejects_32_bit_wide_formats() {
        let mut config = Config::default();
        config.publish.raw_dump = Some("raw".to_string());

        for format in [SampleFormat::S32Le, SampleFormat::S32Be, SampleFormat::S24Le] {
            config.capture.format = format;
            assert!(matches!(
                config.validate(),
                Err(ConfigError::RawDumpTooWide { bits: 32, .. })
            ));
        }

        config.capture.format = SampleFormat::S24Be3;
        assert_eq!(config.validate(), Ok(()));
        config.capture.format = SampleFormat::S16Le;
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn wide_formats_are_fine_without_raw_dump() {
        let mut config = Config::default();
        config.capture.format = SampleFormat::S32Le;
        assert_eq!(config.validate(), Ok(()));
    }
}
