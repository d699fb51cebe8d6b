use crate::rppg::types::{FaceDetection, Landmark, RoiKind, RoiRect, TaggedRoi};

// --- Landmark Index Groups ---
// Indices into the 68-point layout: 19-24 span the brow line, 1-6 and 10-15
// the jaw sides, 31-35 the nostril base.
const FOREHEAD_LANDMARKS: [usize; 6] = [19, 20, 21, 22, 23, 24];
const LEFT_CHEEK_LANDMARKS: [usize; 11] = [1, 2, 3, 4, 5, 6, 31, 32, 33, 34, 35];
const RIGHT_CHEEK_LANDMARKS: [usize; 11] = [10, 11, 12, 13, 14, 15, 31, 32, 33, 34, 35];

const FOREHEAD_PAD_PX: f64 = 20.0;
const FOREHEAD_Y_SHIFT_PX: f64 = -20.0;
const CHEEK_PAD_PX: f64 = 10.0;

/// Regions derived from detected landmarks: bounding boxes of the index
/// groups, padded outward and clamped to the frame. Degenerate boxes are
/// dropped.
pub fn rois_from_landmarks(face: &FaceDetection, frame_w: u32, frame_h: u32) -> Vec<TaggedRoi> {
    let mut rois = Vec::with_capacity(3);
    let specs: [(RoiKind, &[usize], f64, f64); 3] = [
        (
            RoiKind::Forehead,
            &FOREHEAD_LANDMARKS,
            FOREHEAD_PAD_PX,
            FOREHEAD_Y_SHIFT_PX,
        ),
        (RoiKind::LeftCheek, &LEFT_CHEEK_LANDMARKS, CHEEK_PAD_PX, 0.0),
        (
            RoiKind::RightCheek,
            &RIGHT_CHEEK_LANDMARKS,
            CHEEK_PAD_PX,
            0.0,
        ),
    ];
    for (kind, indices, pad, y_shift) in specs {
        if let Some(rect) = landmark_rect(&face.landmarks, indices, pad, y_shift, frame_w, frame_h)
        {
            rois.push(TaggedRoi { kind, rect });
        }
    }
    rois
}

/// Fallback regions when no face is available, centred on the frame: a
/// forehead patch of about a third of the frame in the upper third, and two
/// symmetric cheek patches a sixth of the height below centre.
pub fn default_rois(frame_w: u32, frame_h: u32) -> Vec<TaggedRoi> {
    let w = frame_w as f64;
    let h = frame_h as f64;
    let mut rois = Vec::with_capacity(3);

    let forehead_w = w / 3.0;
    let forehead_h = h / 3.0;
    if let Some(rect) = clamp_rect(
        (w - forehead_w) / 2.0,
        0.0,
        forehead_w,
        forehead_h,
        frame_w,
        frame_h,
    ) {
        rois.push(TaggedRoi {
            kind: RoiKind::Forehead,
            rect,
        });
    }

    let cheek_w = w / 5.0;
    let cheek_h = h / 5.0;
    let cheek_y = h / 2.0 + h / 6.0 - cheek_h / 2.0;
    let cheek_specs = [
        (RoiKind::LeftCheek, w * 0.3 - cheek_w / 2.0),
        (RoiKind::RightCheek, w * 0.7 - cheek_w / 2.0),
    ];
    for (kind, x) in cheek_specs {
        if let Some(rect) = clamp_rect(x, cheek_y, cheek_w, cheek_h, frame_w, frame_h) {
            rois.push(TaggedRoi { kind, rect });
        }
    }
    rois
}

fn landmark_rect(
    landmarks: &[Landmark],
    indices: &[usize],
    pad: f64,
    y_shift: f64,
    frame_w: u32,
    frame_h: u32,
) -> Option<RoiRect> {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    let mut seen = 0usize;
    for &i in indices {
        let Some(p) = landmarks.get(i) else { continue };
        if !p.x.is_finite() || !p.y.is_finite() {
            continue;
        }
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
        seen += 1;
    }
    if seen == 0 {
        return None;
    }
    clamp_rect(
        min_x - pad,
        min_y - pad + y_shift,
        max_x - min_x + 2.0 * pad,
        max_y - min_y + 2.0 * pad,
        frame_w,
        frame_h,
    )
}

/// Intersect a candidate rectangle with the frame; None when nothing of at
/// least one pixel remains.
fn clamp_rect(x: f64, y: f64, w: f64, h: f64, frame_w: u32, frame_h: u32) -> Option<RoiRect> {
    let x0 = x.max(0.0);
    let y0 = y.max(0.0);
    let x1 = (x + w).min(frame_w as f64);
    let y1 = (y + h).min(frame_h as f64);
    if x1 - x0 < 1.0 || y1 - y0 < 1.0 {
        return None;
    }
    Some(RoiRect {
        x: x0 as u32,
        y: y0 as u32,
        w: (x1 - x0) as u32,
        h: (y1 - y0) as u32,
    })
}
