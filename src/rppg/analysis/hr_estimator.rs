use crate::rppg::config::{self, RppgConfig};
use crate::rppg::errors::ConfigError;
use crate::rppg::fft::{self, FftKernel};
use crate::rppg::types::SpectralPeak;
use rustfft::num_complex::Complex;
use std::cmp::Ordering;
use std::f64::consts::PI;

/// Spectral heart-rate estimator: Hann-windowed FFT over the processed
/// buffer, peak selection inside the cardiac band, octave correction and a
/// range-based rescue before the final BPM decision.
pub struct HrEstimator {
    sample_rate: f64,
    fft_size: usize,
    min_samples: usize,
    adaptive_threshold: f64,
    bpm_min: u32,
    bpm_max: u32,
    fft: FftKernel,
    hann: Vec<f64>,
    buffer: Vec<Complex<f64>>,
    magnitudes: Vec<f64>,
    peaks: Vec<SpectralPeak>,
}

impl HrEstimator {
    pub fn new(config: &RppgConfig) -> Result<Self, ConfigError> {
        let fft = FftKernel::new(config.fft_size)?;
        Ok(HrEstimator {
            sample_rate: config.sample_rate as f64,
            fft_size: config.fft_size,
            min_samples: config.min_estimate_len(),
            adaptive_threshold: config.adaptive_threshold,
            bpm_min: config.bpm_min,
            bpm_max: config.bpm_max,
            fft,
            hann: fft::hann_window(config.fft_size),
            buffer: vec![Complex { re: 0.0, im: 0.0 }; config.fft_size],
            magnitudes: vec![0.0; config.fft_size / 2],
            peaks: Vec::new(),
        })
    }

    /// BPM inside the configured range, or None when the signal is too short
    /// or no significant peak stands out.
    pub fn estimate(&mut self, signal: &[f64]) -> Option<u32> {
        if signal.len() < self.min_samples {
            return None;
        }
        self.load_window(signal);
        if let Err(err) = self.fft.forward(&mut self.buffer) {
            log::error!("HR Estimator: FFT failed: {}", err);
            return None;
        }
        let half = self.fft_size / 2;
        fft::magnitudes(&self.buffer[..half], &mut self.magnitudes);

        self.detect_peaks();
        if self.peaks.is_empty() {
            return None;
        }
        // Stable sort: equal scores keep the lower bin first.
        self.peaks.sort_by(|a, b| {
            b.score()
                .partial_cmp(&a.score())
                .unwrap_or(Ordering::Equal)
        });
        let best = self.peaks[0];

        let (band_mean, band_bins) = self.band_statistics();
        let required = band_mean
            * (config::PEAK_SIGNIFICANCE_BASE + self.adaptive_threshold)
            * noise_peak_ratio(band_bins);
        if best.magnitude < required {
            log::trace!(
                "HR Estimator: best peak {:.3} below significance {:.3}",
                best.magnitude,
                required
            );
            return None;
        }

        let selected = self.octave_corrected(&best);
        let bpm = rescue_range(60.0 * selected.frequency_hz);
        let rounded = bpm.round();
        if rounded >= self.bpm_min as f64 && rounded <= self.bpm_max as f64 {
            Some(rounded as u32)
        } else {
            log::trace!("HR Estimator: {} BPM outside accepted range", rounded);
            None
        }
    }

    /// Detected peaks of the last estimate, strongest first.
    pub fn peaks(&self) -> &[SpectralPeak] {
        &self.peaks
    }

    /// Copy the last `fft_size` samples (zero-padded when shorter) into the
    /// real input and apply the Hanning window.
    fn load_window(&mut self, signal: &[f64]) {
        let n = self.fft_size;
        let take = signal.len().min(n);
        let tail = &signal[signal.len() - take..];
        for i in 0..n {
            let re = if i < take { tail[i] } else { 0.0 };
            self.buffer[i] = Complex {
                re: re * self.hann[i],
                im: 0.0,
            };
        }
    }

    /// Strict local maxima of the magnitude spectrum inside the cardiac
    /// band, with a sharpness score over up to three bins on each side.
    fn detect_peaks(&mut self) {
        self.peaks.clear();
        let half = self.magnitudes.len();
        for bin in 1..half.saturating_sub(1) {
            let freq = fft::bin_frequency_hz(bin, self.fft_size, self.sample_rate);
            if !(config::BAND_LOW_HZ..=config::BAND_HIGH_HZ).contains(&freq) {
                continue;
            }
            let m = self.magnitudes[bin];
            if m <= self.magnitudes[bin - 1] || m <= self.magnitudes[bin + 1] {
                continue;
            }
            let sharpness = self.sharpness_at(bin);
            self.peaks.push(SpectralPeak {
                bin,
                magnitude: m,
                frequency_hz: freq,
                sharpness,
            });
        }
    }

    fn sharpness_at(&self, bin: usize) -> f64 {
        let m = self.magnitudes[bin];
        let mut sum = 0.0;
        let mut count = 0usize;
        for k in 1..=3usize {
            if bin >= k {
                sum += m - self.magnitudes[bin - k];
                count += 1;
            }
            if bin + k < self.magnitudes.len() {
                sum += m - self.magnitudes[bin + k];
                count += 1;
            }
        }
        if count == 0 {
            return 0.0;
        }
        sum / count as f64
    }

    /// Mean magnitude over the cardiac-band bins, and how many bins that is.
    fn band_statistics(&self) -> (f64, usize) {
        let mut sum = 0.0;
        let mut count = 0usize;
        for (bin, &m) in self.magnitudes.iter().enumerate() {
            let freq = fft::bin_frequency_hz(bin, self.fft_size, self.sample_rate);
            if (config::BAND_LOW_HZ..=config::BAND_HIGH_HZ).contains(&freq) {
                sum += m;
                count += 1;
            }
        }
        if count == 0 {
            return (f64::INFINITY, 0);
        }
        (sum / count as f64, count)
    }

    /// Prefer a strong double-frequency peak; otherwise, for implausibly fast
    /// picks with a plausible subharmonic, prefer the half-frequency peak.
    fn octave_corrected(&self, best: &SpectralPeak) -> SpectralPeak {
        let double_hz = 2.0 * best.frequency_hz;
        if let Some(harmonic) = self.strongest_near(
            double_hz,
            config::HARMONIC_MAGNITUDE_RATIO * best.magnitude,
            best.bin,
        ) {
            log::debug!(
                "HR Estimator: octave correction {:.2} Hz -> {:.2} Hz",
                best.frequency_hz,
                harmonic.frequency_hz
            );
            return harmonic;
        }

        let half_hz = best.frequency_hz / 2.0;
        let best_bpm = 60.0 * best.frequency_hz;
        let half_bpm = 60.0 * half_hz;
        if best_bpm > 120.0 && (50.0..=120.0).contains(&half_bpm) {
            if let Some(subharmonic) = self.strongest_near(
                half_hz,
                config::SUBHARMONIC_MAGNITUDE_RATIO * best.magnitude,
                best.bin,
            ) {
                log::debug!(
                    "HR Estimator: subharmonic correction {:.2} Hz -> {:.2} Hz",
                    best.frequency_hz,
                    subharmonic.frequency_hz
                );
                return subharmonic;
            }
        }
        *best
    }

    /// Strongest peak within the octave tolerance of `target_hz` at or above
    /// `min_magnitude`, excluding `skip_bin`. Magnitude ties go to the lower
    /// bin.
    fn strongest_near(
        &self,
        target_hz: f64,
        min_magnitude: f64,
        skip_bin: usize,
    ) -> Option<SpectralPeak> {
        let mut chosen: Option<SpectralPeak> = None;
        for p in &self.peaks {
            if p.bin == skip_bin
                || (p.frequency_hz - target_hz).abs() > config::OCTAVE_FREQ_TOLERANCE_HZ
                || p.magnitude < min_magnitude
            {
                continue;
            }
            let better = match &chosen {
                None => true,
                Some(c) => {
                    p.magnitude > c.magnitude || (p.magnitude == c.magnitude && p.bin < c.bin)
                }
            };
            if better {
                chosen = Some(*p);
            }
        }
        chosen
    }
}

/// Expected ratio between the strongest and the mean bin magnitude when the
/// band holds nothing but noise (`bins` independent Rayleigh-distributed
/// magnitudes). The significance threshold is weighted by this so that the
/// spurious maximum pure noise always produces stays below the gate, however
/// many bins the configured band spans.
fn noise_peak_ratio(bins: usize) -> f64 {
    if bins < 2 {
        return 1.0;
    }
    (4.0 * (bins as f64).ln() / PI).sqrt()
}

/// Fold implausible estimates back into range: double a sub-50 reading,
/// halve a post-exercise-fast reading.
fn rescue_range(bpm: f64) -> f64 {
    if (25.0..50.0).contains(&bpm) {
        let doubled = bpm * 2.0;
        if (50.0..=200.0).contains(&doubled) {
            return doubled;
        }
    } else if bpm > 150.0 && bpm <= 400.0 {
        let halved = bpm / 2.0;
        if (50.0..=150.0).contains(&halved) {
            return halved;
        }
    }
    bpm
}
