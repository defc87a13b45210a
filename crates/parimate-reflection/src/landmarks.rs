use serde::{Deserialize, Serialize};

use parimate_types::{DetectionError, Frame};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Eye contour landmarks of one detected face, in frame coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub left_eye: Vec<Point>,
    pub right_eye: Vec<Point>,
}

/// Face landmark detection capability.
///
/// Returns every face found; the analyzer decides how many it accepts.
/// Called from blocking worker threads.
pub trait FaceLandmarker: Send + Sync {
    fn detect(&self, frame: &Frame) -> Result<Vec<FaceLandmarks>, DetectionError>;
}

/// Require exactly one face.
pub fn single_face(mut faces: Vec<FaceLandmarks>) -> Result<FaceLandmarks, DetectionError> {
    match faces.len() {
        0 => Err(DetectionError::NoFace),
        1 => Ok(faces.remove(0)),
        n => Err(DetectionError::MultipleFaces(n)),
    }
}
