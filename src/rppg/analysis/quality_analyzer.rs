use crate::rppg::config::{self, RppgConfig};
use crate::rppg::errors::ConfigError;
use crate::rppg::fft::{self, FftKernel};
use crate::rppg::signal::mean_and_variance;
use crate::rppg::types::{QualityReport, SignalQuality};
use rustfft::num_complex::Complex;

/// Scores the processed signal in `[0, 1]` from four sub-metrics: SNR,
/// motion level, window-to-window stability and spectral peak quality.
pub struct QualityAnalyzer {
    sample_rate: f64,
    fft_size: usize,
    stability_window: usize,
    fft: FftKernel,
    hann: Vec<f64>,
    buffer: Vec<Complex<f64>>,
    magnitudes: Vec<f64>,
    window_vars: Vec<f64>,
}

impl QualityAnalyzer {
    pub fn new(config: &RppgConfig) -> Result<Self, ConfigError> {
        let fft = FftKernel::new(config.fft_size)?;
        Ok(QualityAnalyzer {
            sample_rate: config.sample_rate as f64,
            fft_size: config.fft_size,
            stability_window: (config.sample_rate * config::QUALITY_STABILITY_WINDOW_SECONDS)
                as usize,
            fft,
            hann: fft::hann_window(config.fft_size),
            buffer: vec![Complex { re: 0.0, im: 0.0 }; config.fft_size],
            magnitudes: vec![0.0; config.fft_size / 2],
            window_vars: Vec::new(),
        })
    }

    pub fn assess(&mut self, processed: &[f64], motion_detected: bool) -> QualityReport {
        let snr = snr_metric(processed);
        let motion = if motion_detected {
            config::QUALITY_MOTION_PENALTY
        } else {
            1.0
        };
        let stability = self.stability_metric(processed);
        let peak = self.peak_quality(processed);
        let score = config::QUALITY_WEIGHT_SNR * snr
            + config::QUALITY_WEIGHT_MOTION * motion
            + config::QUALITY_WEIGHT_STABILITY * stability
            + config::QUALITY_WEIGHT_PEAK * peak;
        QualityReport {
            score,
            label: label_for(score),
        }
    }

    /// `v / (v + vv)` over two-second sub-windows; 0.5 when there are fewer
    /// than two windows to compare.
    fn stability_metric(&mut self, processed: &[f64]) -> f64 {
        let window = self.stability_window;
        let n_windows = processed.len() / window;
        if n_windows < 2 {
            return 0.5;
        }
        self.window_vars.clear();
        for chunk in processed.chunks_exact(window).take(n_windows) {
            let (_, variance) = mean_and_variance(chunk);
            self.window_vars.push(variance);
        }
        let (var_mean, var_var) = mean_and_variance(&self.window_vars);
        let denom = var_mean + var_var;
        if denom <= f64::EPSILON {
            return 1.0;
        }
        var_mean / denom
    }

    /// Fraction of spectral energy inside the cardiac band, doubled and
    /// capped at one. Fresh Hann-windowed FFT over the last `fft_size`
    /// samples.
    fn peak_quality(&mut self, processed: &[f64]) -> f64 {
        let n = self.fft_size;
        let take = processed.len().min(n);
        if take == 0 {
            return 0.0;
        }
        let tail = &processed[processed.len() - take..];
        for i in 0..n {
            let re = if i < take { tail[i] } else { 0.0 };
            self.buffer[i] = Complex {
                re: re * self.hann[i],
                im: 0.0,
            };
        }
        if let Err(err) = self.fft.forward(&mut self.buffer) {
            log::error!("Quality: FFT failed: {}", err);
            return 0.0;
        }
        let half = n / 2;
        fft::magnitudes(&self.buffer[..half], &mut self.magnitudes);

        let mut band_energy = 0.0;
        let mut total_energy = 0.0;
        for (bin, &m) in self.magnitudes.iter().enumerate() {
            let energy = m * m;
            total_energy += energy;
            let freq = fft::bin_frequency_hz(bin, n, self.sample_rate);
            if (config::BAND_LOW_HZ..=config::BAND_HIGH_HZ).contains(&freq) {
                band_energy += energy;
            }
        }
        if total_energy <= f64::EPSILON {
            return 0.0;
        }
        (2.0 * band_energy / total_energy).min(1.0)
    }
}

/// `min((|mean| / stddev) / 0.5, 1)` over the processed buffer.
fn snr_metric(processed: &[f64]) -> f64 {
    let (mean, variance) = mean_and_variance(processed);
    let stddev = variance.sqrt();
    if stddev <= f64::EPSILON {
        return if mean.abs() > f64::EPSILON { 1.0 } else { 0.0 };
    }
    ((mean.abs() / stddev) / config::QUALITY_SNR_REFERENCE).min(1.0)
}

fn label_for(score: f64) -> SignalQuality {
    if score > 0.7 {
        SignalQuality::Excellent
    } else if score > 0.5 {
        SignalQuality::Good
    } else if score > 0.3 {
        SignalQuality::Fair
    } else {
        SignalQuality::Poor
    }
}
