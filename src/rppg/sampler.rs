use crate::rppg::config::{RoiWeights, MIN_RGB_SUM};
use crate::rppg::errors::FaceSourceError;
use crate::rppg::types::{ChannelMeans, FaceDetection, RoiRect, TaggedRoi};

// --- Capability Contracts ---

/// Read access to the current frame. RGBA8, row-major.
pub trait PixelSource {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Copy the pixel bytes of `rect` into `out` (cleared first). Rows that
    /// fall outside the frame are skipped.
    fn read_rect(&self, rect: RoiRect, out: &mut Vec<u8>);
}

/// Face detection capability. Detection is an I/O boundary owned by the
/// host; a failing or timed-out call degrades the current tick, never the
/// session.
pub trait FaceSource {
    fn detect(
        &mut self,
        frame: &dyn PixelSource,
    ) -> Result<Option<FaceDetection>, FaceSourceError>;
}

// --- Owned Frame ---

/// An owned RGBA frame, the simplest `PixelSource`.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), (width * height * 4) as usize);
        Frame {
            width,
            height,
            pixels,
        }
    }
}

impl PixelSource for Frame {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn read_rect(&self, rect: RoiRect, out: &mut Vec<u8>) {
        out.clear();
        let max_row = (rect.y + rect.h).min(self.height);
        let max_col = (rect.x + rect.w).min(self.width);
        if rect.x >= max_col {
            return;
        }
        for row in rect.y..max_row {
            let start = ((row * self.width + rect.x) * 4) as usize;
            let end = ((row * self.width + max_col) * 4) as usize;
            if end <= self.pixels.len() {
                out.extend_from_slice(&self.pixels[start..end]);
            }
        }
    }
}

// --- ROI Sampler ---

/// Reduces the face regions of one frame to a single scalar: the weighted
/// green-channel mean over the regions that contain usable skin pixels.
pub struct RoiSampler {
    weights: RoiWeights,
    scratch: Vec<u8>,
}

impl RoiSampler {
    pub fn new(weights: RoiWeights) -> Self {
        RoiSampler {
            weights,
            scratch: Vec::new(),
        }
    }

    /// One scalar for this frame, or None when no region had a qualifying
    /// pixel. Weights are renormalised over the surviving regions.
    pub fn sample<P: PixelSource + ?Sized>(&mut self, frame: &P, rois: &[TaggedRoi]) -> Option<f64> {
        let mut weighted_green = 0.0;
        let mut total_weight = 0.0;
        for roi in rois {
            frame.read_rect(roi.rect, &mut self.scratch);
            let Some(means) = channel_means(&self.scratch) else {
                log::trace!("Sampler: {:?} region empty, dropped", roi.kind);
                continue;
            };
            let weight = self.weights.for_kind(roi.kind);
            weighted_green += weight * means.g;
            total_weight += weight;
        }
        if total_weight <= 0.0 {
            return None;
        }
        let sample = weighted_green / total_weight;
        if !sample.is_finite() {
            log::warn!("Sampler: non-finite sample rejected");
            return None;
        }
        Some(sample)
    }
}

/// Channel means over the qualifying pixels of one region: opaque and
/// brighter than the background threshold.
fn channel_means(rgba: &[u8]) -> Option<ChannelMeans> {
    let mut r_sum = 0u64;
    let mut g_sum = 0u64;
    let mut b_sum = 0u64;
    let mut count = 0u64;
    for px in rgba.chunks_exact(4) {
        let brightness = px[0] as u32 + px[1] as u32 + px[2] as u32;
        if px[3] > 0 && brightness > MIN_RGB_SUM {
            r_sum += px[0] as u64;
            g_sum += px[1] as u64;
            b_sum += px[2] as u64;
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }
    let n = count as f64;
    Some(ChannelMeans {
        r: r_sum as f64 / n,
        g: g_sum as f64 / n,
        b: b_sum as f64 / n,
    })
}
