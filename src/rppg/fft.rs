use crate::rppg::errors::{ConfigError, FftError};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

/// Fixed-size forward FFT. The plan and scratch space are built once at
/// construction; `forward` allocates nothing.
pub struct FftKernel {
    size: usize,
    fft: Arc<dyn Fft<f64>>,
    scratch: Vec<Complex<f64>>,
}

impl FftKernel {
    pub fn new(size: usize) -> Result<Self, ConfigError> {
        if size < 2 || !size.is_power_of_two() {
            return Err(ConfigError::FftSizeNotPowerOfTwo(size));
        }
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let scratch = vec![Complex { re: 0.0, im: 0.0 }; fft.get_inplace_scratch_len()];
        Ok(FftKernel { size, fft, scratch })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// In-place forward transform. The buffer length must equal the size the
    /// kernel was planned for.
    pub fn forward(&mut self, buffer: &mut [Complex<f64>]) -> Result<(), FftError> {
        if buffer.len() != self.size {
            return Err(FftError::LengthMismatch {
                expected: self.size,
                got: buffer.len(),
            });
        }
        self.fft.process_with_scratch(buffer, &mut self.scratch);
        Ok(())
    }
}

/// Element-wise `sqrt(re^2 + im^2)` of `spectrum` into `out`.
pub fn magnitudes(spectrum: &[Complex<f64>], out: &mut [f64]) {
    for (m, c) in out.iter_mut().zip(spectrum.iter()) {
        *m = (c.re * c.re + c.im * c.im).sqrt();
    }
}

/// Hanning window: `0.5 * (1 - cos(2 pi i / (size - 1)))`.
pub fn hann_window(size: usize) -> Vec<f64> {
    if size < 2 {
        return vec![0.0; size];
    }
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / (size - 1) as f64).cos()))
        .collect()
}

pub fn bin_frequency_hz(bin: usize, fft_size: usize, sample_rate: f64) -> f64 {
    bin as f64 * sample_rate / fft_size as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    const N: usize = 512;

    #[test]
    fn test_non_power_of_two_rejected() {
        assert!(FftKernel::new(500).is_err());
        assert!(FftKernel::new(0).is_err());
        assert!(FftKernel::new(N).is_ok());
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let mut kernel = FftKernel::new(N).unwrap();
        let mut short = vec![Complex { re: 0.0, im: 0.0 }; N / 2];
        assert!(kernel.forward(&mut short).is_err());
    }

    #[test]
    fn test_round_trip_recovers_input() {
        let mut kernel = FftKernel::new(N).unwrap();
        let input: Vec<f64> = (0..N)
            .map(|i| (2.0 * PI * 3.0 * i as f64 / N as f64).sin() + 0.25 * (i as f64 * 0.7).cos())
            .collect();
        let mut buffer: Vec<Complex<f64>> =
            input.iter().map(|&re| Complex { re, im: 0.0 }).collect();
        kernel.forward(&mut buffer).unwrap();

        let mut planner = FftPlanner::new();
        let inverse = planner.plan_fft_inverse(N);
        inverse.process(&mut buffer);

        let peak_in = input.iter().fold(0.0f64, |acc, x| acc.max(x.abs()));
        let max_err = buffer
            .iter()
            .zip(input.iter())
            .fold(0.0f64, |acc, (c, &x)| {
                acc.max((c.re / N as f64 - x).abs())
            });
        assert!(max_err / peak_in < 1e-10, "round-trip error {}", max_err);
    }

    #[test]
    fn test_sine_peaks_at_expected_bin() {
        let mut kernel = FftKernel::new(N).unwrap();
        let sample_rate = 30.0;
        let freq = bin_frequency_hz(17, N, sample_rate);
        let mut buffer: Vec<Complex<f64>> = (0..N)
            .map(|i| Complex {
                re: (2.0 * PI * freq * i as f64 / sample_rate).sin(),
                im: 0.0,
            })
            .collect();
        kernel.forward(&mut buffer).unwrap();

        let mut mags = vec![0.0; N / 2];
        magnitudes(&buffer[..N / 2], &mut mags);
        let peak_bin = mags
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak_bin, 17);
    }

    #[test]
    fn test_windowed_dc_offset_leaves_band_untouched() {
        // A constant added to the signal moves bin 0 but, thanks to the
        // window, leaves every cardiac-band bin within one percent of the
        // oscillation's spectral amplitude.
        let mut kernel = FftKernel::new(N).unwrap();
        let window = hann_window(N);
        let signal: Vec<f64> = (0..N)
            .map(|i| (2.0 * PI * 1.0 * i as f64 / 30.0).sin())
            .collect();
        let mut spectrum = |offset: f64| -> Vec<f64> {
            let mut buffer: Vec<Complex<f64>> = signal
                .iter()
                .zip(window.iter())
                .map(|(&x, &w)| Complex {
                    re: (x + offset) * w,
                    im: 0.0,
                })
                .collect();
            kernel.forward(&mut buffer).unwrap();
            let mut mags = vec![0.0; N / 2];
            magnitudes(&buffer[..N / 2], &mut mags);
            mags
        };
        let base = spectrum(0.0);
        let shifted = spectrum(5.0);

        assert!(shifted[0] > base[0] + 1.0);
        let peak = base.iter().fold(0.0f64, |acc, &m| acc.max(m));
        // Bins at or above 0.7 Hz start at index 12 for a 30 Hz rate.
        for bin in 12..N / 2 {
            assert!(
                (shifted[bin] - base[bin]).abs() < 0.01 * peak,
                "bin {} moved by {}",
                bin,
                (shifted[bin] - base[bin]).abs()
            );
        }
    }

    #[test]
    fn test_hann_window_shape() {
        let window = hann_window(N);
        assert!(window[0].abs() < 1e-12);
        assert!(window[N - 1].abs() < 1e-12);
        // Symmetric with a maximum at the centre.
        for i in 0..N / 2 {
            assert!((window[i] - window[N - 1 - i]).abs() < 1e-12);
        }
        assert!((window[(N - 1) / 2] - 1.0).abs() < 1e-4);
    }
}
