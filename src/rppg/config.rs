use crate::rppg::errors::ConfigError;
use crate::rppg::types::RoiKind;
use serde::{Deserialize, Serialize};

// --- Timing Constants ---
pub const DEFAULT_SAMPLE_RATE: u32 = 30;
pub const DEFAULT_BUFFER_SECONDS: u32 = 15;
pub const DEFAULT_MOTION_WINDOW_SECONDS: u32 = 15;
/// Seconds of buffered signal required before the processing pipeline runs.
pub const MIN_PROCESS_SECONDS: u32 = 1;
/// Seconds of buffered signal required before a spectral estimate is attempted.
pub const MIN_ESTIMATE_SECONDS: u32 = 3;

// --- Spectral Constants ---
pub const DEFAULT_FFT_SIZE: usize = 512;
/// Cardiac band: 42-210 BPM.
pub const BAND_LOW_HZ: f64 = 0.7;
pub const BAND_HIGH_HZ: f64 = 3.5;
/// Base multiple of the band-mean magnitude a peak must clear to count as
/// significant; `adaptive_threshold` is added on top, and the estimator
/// scales the sum by the expected noise-peak ratio of the band so that pure
/// noise stays below the gate.
pub const PEAK_SIGNIFICANCE_BASE: f64 = 1.5;
pub const DEFAULT_ADAPTIVE_THRESHOLD: f64 = 0.3;
/// Frequency tolerance when matching harmonic / subharmonic peak candidates.
pub const OCTAVE_FREQ_TOLERANCE_HZ: f64 = 0.1;
/// A double-frequency peak must reach this fraction of the best magnitude.
pub const HARMONIC_MAGNITUDE_RATIO: f64 = 0.7;
/// A half-frequency peak must reach this fraction of the best magnitude.
pub const SUBHARMONIC_MAGNITUDE_RATIO: f64 = 0.5;

// --- BPM Range Constants ---
pub const DEFAULT_BPM_MIN: u32 = 40;
pub const DEFAULT_BPM_MAX: u32 = 220;

// --- Sampler Constants ---
/// Pixels with an R+G+B sum at or below this are background and are skipped.
pub const MIN_RGB_SUM: u32 = 30;
/// R/G/B chrominance signature of the blood-volume pulse. Retained for a
/// future chrominance-projection sampler; the current sample is the weighted
/// green mean only.
pub const CHROMINANCE_SIGNATURE: [f64; 3] = [0.77, 0.51, 0.34];

// --- Filter Constants ---
pub const NOMINAL_ALPHA_LP: f64 = 0.15;
pub const NOMINAL_ALPHA_HP: f64 = 0.98;
pub const NOMINAL_SMOOTHING_WINDOW: usize = 5;
pub const MOTION_ALPHA_LP: f64 = 0.10;
pub const MOTION_ALPHA_HP: f64 = 0.99;
pub const MOTION_SMOOTHING_WINDOW: usize = 8;
/// Samples farther than this many standard deviations from the mean are
/// clipped back to the mean.
pub const OUTLIER_SIGMA: f64 = 2.0;
/// Motion is declared when the variance of per-second window variances
/// exceeds this multiple of their mean.
pub const MOTION_VARIANCE_RATIO: f64 = 1.5;

// --- Calibration Constants ---
pub const DEFAULT_CALIBRATION_PERIOD_MS: u64 = 15_000;
pub const DEFAULT_DISPLAY_DELAY_MS: u64 = 5_000;
/// Records farther than this from the delayed target time are excluded from
/// the displayed average.
pub const DISPLAY_WINDOW_MS: u64 = 2_000;
/// The displayed average is withheld when the window records spread wider
/// than this (standard deviation, BPM).
pub const DISPLAY_MAX_STDDEV: f64 = 15.0;

// --- Quality Constants ---
pub const QUALITY_WEIGHT_SNR: f64 = 0.4;
pub const QUALITY_WEIGHT_MOTION: f64 = 0.2;
pub const QUALITY_WEIGHT_STABILITY: f64 = 0.2;
pub const QUALITY_WEIGHT_PEAK: f64 = 0.2;
/// `|mean| / stddev` ratio that maps to a full SNR sub-score.
pub const QUALITY_SNR_REFERENCE: f64 = 0.5;
/// Motion sub-score while motion artefacts are detected.
pub const QUALITY_MOTION_PENALTY: f64 = 0.7;
pub const QUALITY_STABILITY_WINDOW_SECONDS: u32 = 2;

// --- UI Constants ---
/// Bounded ring of waveform samples kept for the UI overlay (about 5 s).
pub const WAVEFORM_RING_CAPACITY: usize = 150;

// --- ROI Weights ---

/// Combining weights for the facial regions. Renormalised over the regions
/// that actually survive sampling on a given frame.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoiWeights {
    pub forehead: f64,
    pub left_cheek: f64,
    pub right_cheek: f64,
}

impl Default for RoiWeights {
    fn default() -> Self {
        RoiWeights {
            forehead: 0.6,
            left_cheek: 0.2,
            right_cheek: 0.2,
        }
    }
}

impl RoiWeights {
    pub fn for_kind(&self, kind: RoiKind) -> f64 {
        match kind {
            RoiKind::Forehead => self.forehead,
            RoiKind::LeftCheek => self.left_cheek,
            RoiKind::RightCheek => self.right_cheek,
        }
    }

    fn is_valid(&self) -> bool {
        [self.forehead, self.left_cheek, self.right_cheek]
            .iter()
            .all(|w| w.is_finite() && *w > 0.0)
    }
}

// --- Runtime Configuration ---

/// Stable configuration surface of the estimation core. Validated once at
/// session construction; violations are fatal and the session never starts.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RppgConfig {
    /// Tick frequency in Hz. All window sizes scale with it.
    pub sample_rate: u32,
    /// Main ring capacity in seconds.
    pub buffer_seconds: u32,
    /// Motion-detection ring capacity in seconds, tunable independently.
    pub motion_window_seconds: u32,
    /// FFT length. Must be a power of two.
    pub fft_size: usize,
    /// Time before a numeric BPM is shown.
    pub calibration_period_ms: u64,
    /// Temporal offset of the shown BPM.
    pub display_delay_ms: u64,
    /// Peak-significance margin on top of `PEAK_SIGNIFICANCE_BASE`.
    pub adaptive_threshold: f64,
    pub roi_weights: RoiWeights,
    /// Acceptance range after octave correction and range rescue.
    pub bpm_min: u32,
    pub bpm_max: u32,
}

impl Default for RppgConfig {
    fn default() -> Self {
        RppgConfig {
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_seconds: DEFAULT_BUFFER_SECONDS,
            motion_window_seconds: DEFAULT_MOTION_WINDOW_SECONDS,
            fft_size: DEFAULT_FFT_SIZE,
            calibration_period_ms: DEFAULT_CALIBRATION_PERIOD_MS,
            display_delay_ms: DEFAULT_DISPLAY_DELAY_MS,
            adaptive_threshold: DEFAULT_ADAPTIVE_THRESHOLD,
            roi_weights: RoiWeights::default(),
            bpm_min: DEFAULT_BPM_MIN,
            bpm_max: DEFAULT_BPM_MAX,
        }
    }
}

impl RppgConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate));
        }
        if self.buffer_seconds == 0 {
            return Err(ConfigError::InvalidWindow {
                name: "buffer",
                seconds: self.buffer_seconds,
            });
        }
        if self.motion_window_seconds == 0 {
            return Err(ConfigError::InvalidWindow {
                name: "motion",
                seconds: self.motion_window_seconds,
            });
        }
        if self.fft_size < 2 || !self.fft_size.is_power_of_two() {
            return Err(ConfigError::FftSizeNotPowerOfTwo(self.fft_size));
        }
        if self.calibration_period_ms == 0 {
            return Err(ConfigError::InvalidCalibrationPeriod(
                self.calibration_period_ms,
            ));
        }
        if !self.roi_weights.is_valid() {
            return Err(ConfigError::InvalidRoiWeights {
                forehead: self.roi_weights.forehead,
                left_cheek: self.roi_weights.left_cheek,
                right_cheek: self.roi_weights.right_cheek,
            });
        }
        if !self.adaptive_threshold.is_finite() || self.adaptive_threshold < 0.0 {
            return Err(ConfigError::InvalidAdaptiveThreshold(
                self.adaptive_threshold,
            ));
        }
        if self.bpm_min == 0 || self.bpm_min >= self.bpm_max {
            return Err(ConfigError::InvalidBpmRange {
                min: self.bpm_min,
                max: self.bpm_max,
            });
        }
        Ok(())
    }

    /// Main ring capacity in samples.
    pub fn window_len(&self) -> usize {
        (self.sample_rate * self.buffer_seconds) as usize
    }

    /// Motion ring capacity in samples.
    pub fn motion_window_len(&self) -> usize {
        (self.sample_rate * self.motion_window_seconds) as usize
    }

    /// Samples required before processing produces output.
    pub fn min_process_len(&self) -> usize {
        (self.sample_rate * MIN_PROCESS_SECONDS) as usize
    }

    /// Samples required before a spectral estimate is attempted.
    pub fn min_estimate_len(&self) -> usize {
        (self.sample_rate * MIN_ESTIMATE_SECONDS) as usize
    }

    /// Nominal tick interval for a host driving the session.
    pub fn tick_interval_ms(&self) -> f64 {
        1000.0 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RppgConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window_len(), 450);
        assert_eq!(config.motion_window_len(), 450);
        assert_eq!(config.min_process_len(), 30);
        assert_eq!(config.min_estimate_len(), 90);
    }

    #[test]
    fn test_non_power_of_two_fft_size_rejected() {
        let config = RppgConfig {
            fft_size: 500,
            ..RppgConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::FftSizeNotPowerOfTwo(500))
        ));
    }

    #[test]
    fn test_zero_windows_rejected() {
        let config = RppgConfig {
            buffer_seconds: 0,
            ..RppgConfig::default()
        };
        assert!(config.validate().is_err());

        let config = RppgConfig {
            motion_window_seconds: 0,
            ..RppgConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_bpm_range_rejected() {
        let config = RppgConfig {
            bpm_min: 220,
            bpm_max: 220,
            ..RppgConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBpmRange { min: 220, max: 220 })
        ));
    }

    #[test]
    fn test_roi_weight_lookup() {
        let weights = RoiWeights::default();
        assert!((weights.for_kind(RoiKind::Forehead) - 0.6).abs() < 1e-12);
        assert!((weights.for_kind(RoiKind::LeftCheek) - 0.2).abs() < 1e-12);
        assert!((weights.for_kind(RoiKind::RightCheek) - 0.2).abs() < 1e-12);
    }
}
