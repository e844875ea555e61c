//! Log-scale calibration and fast-attack/slow-release smoothing of band levels.

use super::bands::BAND_COUNT;

const LOG_GAIN: f32 = 16.7;
const LEVEL_FLOOR: f32 = 172.0;
const LEVEL_GAIN: f32 = 3.2;
const LEVEL_CEILING: f32 = 250.0;
const DECAY_THRESHOLD: f32 = 2.0;
const DECAY_RATE: f32 = 2.0;

/// Display magnitudes for one cycle, in publish order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BandFrame(pub [f32; BAND_COUNT]);

impl BandFrame {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

/// Previous display value of every band.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SmoothingState {
    levels: [f32; BAND_COUNT],
}

impl SmoothingState {
    #[cfg(test)]
    pub fn levels(&self) -> &[f32; BAND_COUNT] {
        &self.levels
    }
}

/// Map a raw band magnitude onto the 0..=250 display scale.
pub fn display_level(magnitude: f32) -> f32 {
    let level = if magnitude > 0.0 {
        magnitude.ln() * LOG_GAIN
    } else {
        0.0
    };
    let level = if level > LEVEL_FLOOR {
        (level - LEVEL_FLOOR) * LEVEL_GAIN
    } else {
        0.0
    };
    level.min(LEVEL_CEILING)
}

fn decay(previous: f32) -> f32 {
    if previous > DECAY_THRESHOLD {
        previous - DECAY_RATE * previous.ln()
    } else {
        0.0
    }
}

/// Calibrate raw band magnitudes against the prior smoothing state.
///
/// Bands are independent: each new value is the larger of its fresh level and
/// its decayed previous value.
pub fn calibrate(raw: &[f32; BAND_COUNT], prior: &SmoothingState) -> (BandFrame, SmoothingState) {
    let mut next = SmoothingState::default();
    for band in 0..BAND_COUNT {
        next.levels[band] = display_level(raw[band]).max(decay(prior.levels[band]));
    }
    (BandFrame(next.levels), next)
}
