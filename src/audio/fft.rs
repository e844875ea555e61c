use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use super::bands::{BinBandMap, BAND_COUNT};
use crate::config::{BandPolicy, WindowKind};

/// Windowed forward real transform of one channel period, reduced to the
/// display bands.
pub struct SpectrumAnalyzer {
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    window: Vec<f32>,
    /// Half-complex layout: `r0, r1, .., r(n/2), i(n/2-1), .., i1`
    spectrum: Vec<f32>,
    band_map: BinBandMap,
    policy: BandPolicy,
}

pub fn window_table(kind: WindowKind, size: usize) -> Vec<f32> {
    match kind {
        WindowKind::Rectangular => vec![1.0; size],
        WindowKind::Hann => (0..size)
            .map(|i| {
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
            })
            .collect(),
    }
}

impl SpectrumAnalyzer {
    pub fn new(fft_size: usize, sample_rate: u32, window: WindowKind, policy: BandPolicy) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Self {
            fft_size,
            fft,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch,
            window: window_table(window, fft_size),
            spectrum: vec![0.0; fft_size],
            band_map: BinBandMap::new(fft_size, sample_rate),
            policy,
        }
    }

    pub fn band_map(&self) -> &BinBandMap {
        &self.band_map
    }

    /// Window `samples` and transform them, returning the half-complex spectrum.
    ///
    /// Missing samples are treated as silence.
    pub fn transform(&mut self, samples: &[f32]) -> &[f32] {
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = samples.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let n = self.fft_size;
        for k in 0..=n / 2 {
            self.spectrum[k] = self.buffer[k].re;
        }
        for k in 1..(n + 1) / 2 {
            self.spectrum[n - k] = self.buffer[k].im;
        }
        &self.spectrum
    }

    /// Magnitude of bin `k` read from the half-complex spectrum.
    fn bin_magnitude(&self, bin: usize) -> f32 {
        let re = self.spectrum[bin];
        let im = self.spectrum[self.fft_size - bin];
        (re * re + im * im).sqrt()
    }

    /// Reduce the last transform to one raw magnitude per band.
    pub fn band_magnitudes(&self) -> [f32; BAND_COUNT] {
        let mut bands = [0.0; BAND_COUNT];
        for (band, value) in bands.iter_mut().enumerate() {
            let bins = self.band_map.bins(band);
            if bins.is_empty() {
                continue;
            }
            let count = bins.len();
            let magnitudes = bins.map(|bin| self.bin_magnitude(bin));
            *value = match self.policy {
                BandPolicy::Peak => magnitudes.fold(0.0, f32::max),
                BandPolicy::Average => magnitudes.sum::<f32>() / count as f32,
            };
        }
        bands
    }

    pub fn analyze(&mut self, samples: &[f32]) -> [f32; BAND_COUNT] {
        self.transform(samples);
        self.band_magnitudes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, rate: u32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin())
            .collect()
    }

    fn assert_approx(actual: f32, expected: f32, tolerance: f32) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected} +/- {tolerance}, got {actual}"
        );
    }

    #[test]
    fn half_complex_layout_matches_bin_centered_cosine() {
        let n = 64;
        let mut analyzer = SpectrumAnalyzer::new(n, 6400, WindowKind::Rectangular, BandPolicy::Peak);
        // Exactly bin 4, zero phase: all energy in r4
        let samples: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * 4.0 * i as f32 / n as f32).cos())
            .collect();

        let spectrum = analyzer.transform(&samples).to_vec();
        assert_eq!(spectrum.len(), n);
        assert_approx(spectrum[4], n as f32 / 2.0, 1e-3);
        assert_approx(spectrum[n - 4], 0.0, 1e-3);
        assert_approx(analyzer.bin_magnitude(4), n as f32 / 2.0, 1e-3);
        assert_approx(analyzer.bin_magnitude(5), 0.0, 1e-3);
    }

    #[test]
    fn imaginary_part_is_mirrored() {
        let n = 64;
        let mut analyzer = SpectrumAnalyzer::new(n, 6400, WindowKind::Rectangular, BandPolicy::Peak);
        let samples: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * 3.0 * i as f32 / n as f32).sin())
            .collect();

        let spectrum = analyzer.transform(&samples).to_vec();
        assert_approx(spectrum[3], 0.0, 1e-3);
        assert_approx(spectrum[n - 3].abs(), n as f32 / 2.0, 1e-3);
    }

    #[test]
    fn silence_reports_zero_in_every_band() {
        let mut analyzer = SpectrumAnalyzer::new(1024, 44100, WindowKind::Hann, BandPolicy::Peak);
        assert_eq!(analyzer.analyze(&[0.0; 1024]), [0.0; BAND_COUNT]);
    }

    #[test]
    fn sine_peaks_in_its_band() {
        let mut analyzer =
            SpectrumAnalyzer::new(1024, 44100, WindowKind::Rectangular, BandPolicy::Peak);
        let bands = analyzer.analyze(&sine(1000.0, 44100, 1024, 32767.0));
        let loudest = bands
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i);
        assert_eq!(loudest, Some(7));
    }

    #[test]
    fn average_policy_never_exceeds_peak() {
        let samples = sine(3000.0, 44100, 1024, 10000.0);
        let mut peak = SpectrumAnalyzer::new(1024, 44100, WindowKind::Hann, BandPolicy::Peak);
        let mut average = SpectrumAnalyzer::new(1024, 44100, WindowKind::Hann, BandPolicy::Average);
        let peak_bands = peak.analyze(&samples);
        let average_bands = average.analyze(&samples);

        for band in 0..BAND_COUNT {
            assert!(average_bands[band] <= peak_bands[band] + 1e-3);
        }
        // Multi-bin band: averaging spreads the tone across the run
        assert!(average_bands[10] < peak_bands[10]);
    }

    #[test]
    fn hann_window_is_symmetric_and_zero_at_edges() {
        let window = window_table(WindowKind::Hann, 16);
        assert_approx(window[0], 0.0, 1e-6);
        assert_approx(window[15], 0.0, 1e-6);
        for i in 0..8 {
            assert_approx(window[i], window[15 - i], 1e-5);
        }
        assert_eq!(window_table(WindowKind::Rectangular, 4), vec![1.0; 4]);
    }
}
