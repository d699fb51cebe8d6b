use serde::{Deserialize, Serialize};

// --- ROI Types ---

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RoiKind {
    Forehead,
    LeftCheek,
    RightCheek,
}

/// Rectangle in pixel coordinates, clamped to the frame it was derived for.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoiRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaggedRoi {
    pub kind: RoiKind,
    pub rect: RoiRect,
}

// --- Face Types ---

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
}

pub const LANDMARK_COUNT: usize = 68;

/// One detected face: the 68-point landmark set produced by common face
/// alignment models.
#[derive(Debug, Clone)]
pub struct FaceDetection {
    pub landmarks: [Landmark; LANDMARK_COUNT],
}

// --- Sampler Types ---

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelMeans {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

// --- Spectral Types ---

/// A local maximum of the magnitude spectrum inside the cardiac band.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpectralPeak {
    pub bin: usize,
    pub magnitude: f64,
    pub frequency_hz: f64,
    pub sharpness: f64,
}

impl SpectralPeak {
    /// Ranking score: sharp, tall peaks first.
    pub(crate) fn score(&self) -> f64 {
        self.magnitude * (1.0 + self.sharpness)
    }
}

// --- Display Types ---

/// What the UI shows for heart rate on a given tick.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum BpmDisplay {
    Calibrating { progress: u8 },
    Bpm { bpm: u32 },
    Unavailable,
}

impl BpmDisplay {
    pub fn is_numeric(&self) -> bool {
        matches!(self, BpmDisplay::Bpm { .. })
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum SignalQuality {
    Insufficient,
    Poor,
    Fair,
    Good,
    Excellent,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QualityReport {
    pub score: f64,
    pub label: SignalQuality,
}

// --- History Types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartRateRecord {
    pub bpm: u32,
    pub timestamp_ms: u64,
}

// --- Tick Output ---

/// Everything the UI needs after one tick.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TickOutput {
    pub display: BpmDisplay,
    pub quality: SignalQuality,
    pub waveform_sample: Option<f64>,
}
