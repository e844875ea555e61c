//! Deinterleaving of raw hardware periods into per-channel float samples.
//!
//! Sample words are assembled byte by byte so any container width up to 32
//! bits and either byte order decode the same way, independent of the host's
//! native integer layout.

use super::SampleFormat;

/// Per-channel sample storage for one period.
///
/// Channel `j` occupies `data[j * frames..(j + 1) * frames]`.
#[derive(Debug, Clone)]
pub struct ChannelBuffer {
    frames: usize,
    data: Vec<f32>,
}

impl ChannelBuffer {
    pub fn new(frames: usize, channels: usize) -> Self {
        Self {
            frames,
            data: vec![0.0; frames * channels],
        }
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.data[index * self.frames..(index + 1) * self.frames]
    }

    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }
}

/// Assemble one sample word and sign-extend it from the format's nominal width.
pub fn decode_word(bytes: &[u8], big_endian: bool, nominal_bits: u32) -> i32 {
    let width = bytes.len();
    let mut raw: u32 = 0;
    for k in 0..width {
        let byte = if big_endian {
            bytes[width - 1 - k]
        } else {
            bytes[k]
        };
        raw |= (byte as u32) << (k * 8);
    }

    if nominal_bits < 32 {
        let mask = (1u32 << nominal_bits) - 1;
        raw &= mask;
        if raw >= 1u32 << (nominal_bits - 1) {
            raw |= !mask;
        }
    }
    raw as i32
}

#[derive(Debug, Clone, Copy)]
pub struct SampleDecoder {
    format: SampleFormat,
    channels: usize,
}

impl SampleDecoder {
    pub fn new(format: SampleFormat, channels: usize) -> Self {
        Self { format, channels }
    }

    /// Decode an interleaved period into `out`, mirroring channel 0 into
    /// `raw_mirror` when one is supplied.
    ///
    /// Only whole frames present in `raw` are decoded; the rest of `out` keeps
    /// whatever it held, so callers clear it first.
    pub fn deinterleave(&self, raw: &[u8], out: &mut ChannelBuffer, mut raw_mirror: Option<&mut [i32]>) {
        let width = self.format.physical_bytes();
        let big_endian = self.format.is_big_endian();
        let nominal = self.format.nominal_bits();
        let frame_bytes = width * self.channels;
        let frames = out.frames.min(raw.len() / frame_bytes);

        for (i, frame) in raw.chunks_exact(frame_bytes).take(frames).enumerate() {
            for (j, word) in frame.chunks_exact(width).enumerate() {
                let value = decode_word(word, big_endian, nominal);
                out.data[j * out.frames + i] = value as f32;

                if j == 0 {
                    if let Some(mirror) = raw_mirror.as_deref_mut() {
                        if let Some(slot) = mirror.get_mut(i) {
                            *slot = value;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn encode_word(value: i32, format: SampleFormat) -> Vec<u8> {
    let width = format.physical_bytes();
    let le = (value as u32).to_le_bytes();
    let mut bytes = le[..width].to_vec();
    if format.is_big_endian() {
        bytes.reverse();
    }
    bytes
}
