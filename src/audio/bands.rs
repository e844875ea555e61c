use std::ops::Range;

pub const BAND_COUNT: usize = 15;

/// Upper cutoffs of the display bands in Hz (mbeq-style spacing).
pub const BAND_EDGES_HZ: [f32; BAND_COUNT] = [
    50.00, 100.00, 155.56, 220.00, 311.13, 440.00, 622.25, 880.00, 1244.51, 1760.00, 2489.02,
    3519.95, 4978.04, 9956.08, 19912.16,
];

/// Assignment of FFT bins to display bands.
///
/// Bin 0 (DC) is never assigned. Band 0 collects every bin up to the first
/// edge, band `i` for `1 <= i < 14` collects the bins up to edge `i + 1`, and
/// the last band absorbs whatever is left below Nyquist.
#[derive(Debug, Clone)]
pub struct BinBandMap {
    bands: Vec<usize>,
    ranges: [Range<usize>; BAND_COUNT],
    hz_per_bin: f32,
}

impl BinBandMap {
    pub fn new(fft_size: usize, sample_rate: u32) -> Self {
        let half = fft_size / 2;
        let hz_per_bin = sample_rate as f32 / fft_size as f32;
        let nyquist = (sample_rate / 2) as f32;
        let mut bands = vec![0usize; half];

        let mut bin = 1;
        while bin < half && bin as f32 <= BAND_EDGES_HZ[0] / hz_per_bin {
            bands[bin] = 0;
            bin += 1;
        }

        let mut band = 1;
        while band < BAND_COUNT - 1
            && bin + 1 < half
            && BAND_EDGES_HZ[band + 1] < nyquist
        {
            let limit = BAND_EDGES_HZ[band + 1] / hz_per_bin;
            while bin < half && bin as f32 <= limit {
                bands[bin] = band;
                bin += 1;
            }
            band += 1;
        }

        while bin < half {
            bands[bin] = BAND_COUNT - 1;
            bin += 1;
        }

        let ranges = Self::contiguous_runs(&bands);
        Self {
            bands,
            ranges,
            hz_per_bin,
        }
    }

    fn contiguous_runs(bands: &[usize]) -> [Range<usize>; BAND_COUNT] {
        let mut ranges: [Range<usize>; BAND_COUNT] = std::array::from_fn(|_| 0..0);
        let mut bin = 1;
        for (band, range) in ranges.iter_mut().enumerate() {
            let start = bin;
            while bin < bands.len() && bands[bin] <= band {
                bin += 1;
            }
            *range = start..bin;
        }
        ranges
    }

    /// Band index of `bin`; `None` for DC and for bins at or above Nyquist.
    #[cfg(test)]
    pub fn band_of(&self, bin: usize) -> Option<usize> {
        if bin == 0 {
            return None;
        }
        self.bands.get(bin).copied()
    }

    /// Bins belonging to `band`, possibly empty.
    pub fn bins(&self, band: usize) -> Range<usize> {
        self.ranges[band].clone()
    }

    pub fn hz_per_bin(&self) -> f32 {
        self.hz_per_bin
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }
}
