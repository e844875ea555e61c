use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Signed linear hardware sample formats.
///
/// Nominal width is the number of significant bits, physical width is the
/// size of the container the sample is transferred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleFormat {
    #[default]
    S16Le,
    S16Be,
    /// 24 significant bits in a 32-bit container
    S24Le,
    S24Be,
    /// 24 bits packed into 3 bytes
    S24Le3,
    S24Be3,
    S32Le,
    S32Be,
}

impl SampleFormat {
    pub const ALL: [SampleFormat; 8] = [
        SampleFormat::S16Le,
        SampleFormat::S16Be,
        SampleFormat::S24Le,
        SampleFormat::S24Be,
        SampleFormat::S24Le3,
        SampleFormat::S24Be3,
        SampleFormat::S32Le,
        SampleFormat::S32Be,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SampleFormat::S16Le => "S16_LE",
            SampleFormat::S16Be => "S16_BE",
            SampleFormat::S24Le => "S24_LE",
            SampleFormat::S24Be => "S24_BE",
            SampleFormat::S24Le3 => "S24_3LE",
            SampleFormat::S24Be3 => "S24_3BE",
            SampleFormat::S32Le => "S32_LE",
            SampleFormat::S32Be => "S32_BE",
        }
    }

    pub fn nominal_bits(&self) -> u32 {
        match self {
            SampleFormat::S16Le | SampleFormat::S16Be => 16,
            SampleFormat::S24Le
            | SampleFormat::S24Be
            | SampleFormat::S24Le3
            | SampleFormat::S24Be3 => 24,
            SampleFormat::S32Le | SampleFormat::S32Be => 32,
        }
    }

    pub fn physical_bits(&self) -> u32 {
        match self {
            SampleFormat::S16Le | SampleFormat::S16Be => 16,
            SampleFormat::S24Le3 | SampleFormat::S24Be3 => 24,
            SampleFormat::S24Le
            | SampleFormat::S24Be
            | SampleFormat::S32Le
            | SampleFormat::S32Be => 32,
        }
    }

    pub fn physical_bytes(&self) -> usize {
        (self.physical_bits() / 8) as usize
    }

    pub fn is_big_endian(&self) -> bool {
        matches!(
            self,
            SampleFormat::S16Be | SampleFormat::S24Be | SampleFormat::S24Be3 | SampleFormat::S32Be
        )
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SampleFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        if let Some(format) = Self::ALL.iter().find(|f| f.name() == wanted) {
            return Ok(*format);
        }

        // Name families the hardware knows about but the decoder does not
        if wanted.starts_with('U') && wanted[1..].starts_with(|c: char| c.is_ascii_digit()) {
            return Err(ConfigError::UnsignedFormat(s.to_string()));
        }
        if wanted.starts_with("FLOAT") {
            return Err(ConfigError::FloatFormat(s.to_string()));
        }
        if matches!(
            wanted.as_str(),
            "MU_LAW" | "A_LAW" | "IMA_ADPCM" | "MPEG" | "GSM" | "IEC958_SUBFRAME_LE" | "IEC958_SUBFRAME_BE"
        ) {
            return Err(ConfigError::NonLinearFormat(s.to_string()));
        }
        Err(ConfigError::UnknownFormat(s.to_string()))
    }
}

impl Serialize for SampleFormat {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for SampleFormat {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        SampleFormat::from_str(&s).map_err(serde::de::Error::custom)
    }
}
