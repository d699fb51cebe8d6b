use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("FFT size {0} is not a power of two")]
    FftSizeNotPowerOfTwo(usize),
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),
    #[error("Invalid {name} window: {seconds} s")]
    InvalidWindow { name: &'static str, seconds: u32 },
    #[error("Invalid calibration period: {0} ms")]
    InvalidCalibrationPeriod(u64),
    #[error(
        "ROI weights must be positive and finite (forehead {forehead}, left cheek {left_cheek}, right cheek {right_cheek})"
    )]
    InvalidRoiWeights {
        forehead: f64,
        left_cheek: f64,
        right_cheek: f64,
    },
    #[error("Adaptive threshold must be finite and non-negative (got {0})")]
    InvalidAdaptiveThreshold(f64),
    #[error("Invalid BPM range: min {min}, max {max}")]
    InvalidBpmRange { min: u32, max: u32 },
}

#[derive(Error, Debug)]
pub enum FftError {
    #[error("Buffer length {got} does not match FFT size {expected}")]
    LengthMismatch { expected: usize, got: usize },
}

/// Failures of the external face-detection capability. A missing capability is
/// surfaced once by the host; the session keeps running on default regions.
#[derive(Error, Debug)]
pub enum FaceSourceError {
    #[error("Face detection model assets unavailable: {0}")]
    AssetsUnavailable(String),
    #[error("Face detection failed: {0}")]
    DetectionFailure(String),
}

// Host boundaries that report errors as plain strings use this conversion.
impl From<ConfigError> for String {
    fn from(err: ConfigError) -> String {
        err.to_string()
    }
}

impl From<FaceSourceError> for String {
    fn from(err: FaceSourceError) -> String {
        err.to_string()
    }
}
