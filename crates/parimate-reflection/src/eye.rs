use parimate_types::{DetectionError, Frame, Rect};

use crate::landmarks::Point;
use crate::mask::Mask;

/// One eye cut out of a frame, with its landmarks in crop coordinates.
#[derive(Debug, Clone)]
pub struct EyeRegion {
    pub image: Frame,
    pub landmarks: Vec<Point>,
}

impl EyeRegion {
    /// The eye contour polygon as a corneal mask.
    pub fn cornea(&self) -> Result<Mask, DetectionError> {
        let mask = Mask::convex_fill(self.image.width, self.image.height, &self.landmarks);
        if mask.is_empty() {
            return Err(DetectionError::EmptyCornea);
        }
        Ok(mask)
    }
}

/// Crop the landmark bounding box, widened by `h_margin × width` on each
/// side and `v_margin × height` above and below, clamped to the frame.
pub fn crop_eye(
    frame: &Frame,
    landmarks: &[Point],
    h_margin: f64,
    v_margin: f64,
) -> Result<EyeRegion, DetectionError> {
    if landmarks.len() < 3 {
        return Err(DetectionError::DegenerateEye(format!(
            "{} landmarks",
            landmarks.len()
        )));
    }
    let min_x = landmarks.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let max_x = landmarks.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
    let min_y = landmarks.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    let max_y = landmarks.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
    let (w, h) = (max_x - min_x, max_y - min_y);
    if !(w > 0.0 && h > 0.0) {
        return Err(DetectionError::DegenerateEye(format!(
            "extent {w:.1}x{h:.1}"
        )));
    }

    let clamp_x = |v: f64| v.round().clamp(0.0, frame.width as f64) as usize;
    let clamp_y = |v: f64| v.round().clamp(0.0, frame.height as f64) as usize;
    let rect = Rect {
        x0: clamp_x(min_x - h_margin * w),
        y0: clamp_y(min_y - v_margin * h),
        x1: clamp_x(max_x + h_margin * w),
        y1: clamp_y(max_y + v_margin * h),
    };
    if rect.is_empty() {
        return Err(DetectionError::DegenerateEye("crop outside frame".to_string()));
    }

    let landmarks = landmarks
        .iter()
        .map(|p| Point::new(p.x - rect.x0 as f64, p.y - rect.y0 as f64))
        .collect();
    Ok(EyeRegion {
        image: frame.crop(rect),
        landmarks,
    })
}
