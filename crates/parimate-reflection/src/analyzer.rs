use std::sync::Arc;

use serde::{Deserialize, Serialize};

use parimate_types::{
    CheckOutcome, CheckResult, DetectionError, Evidence, Frame, ReflectionConfig,
};

use crate::alignment::{Alignment, best_alignment};
use crate::eye::{EyeRegion, crop_eye};
use crate::highlight::extract_reflection;
use crate::iris::segment_iris;
use crate::landmarks::{FaceLandmarker, single_face};
use crate::mask::Mask;

/// Per-frame breakdown, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameScore {
    pub alignment: Alignment,
    pub left_pixels: usize,
    pub right_pixels: usize,
}

/// Session-level reflection consistency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReflectionScore {
    Scored {
        mean_iou: f64,
        valid_frames: usize,
        skipped_frames: usize,
    },
    /// No frame produced a usable pair of reflections.
    Inconclusive {
        skipped_frames: usize,
        reasons: Vec<String>,
    },
}

impl ReflectionScore {
    pub fn to_result(&self, threshold: f64) -> CheckResult {
        match self {
            ReflectionScore::Scored {
                mean_iou,
                valid_frames,
                skipped_frames,
            } => {
                let result = CheckResult::scored(*mean_iou, threshold, *valid_frames);
                if *skipped_frames > 0 {
                    result.with_note(format!("{skipped_frames} frames skipped"))
                } else {
                    result
                }
            }
            ReflectionScore::Inconclusive {
                skipped_frames,
                reasons,
            } => {
                let mut notes = vec![format!(
                    "no usable eye reflections in {skipped_frames} frames"
                )];
                notes.extend(reasons.iter().cloned());
                CheckResult::new(
                    CheckOutcome::Inconclusive,
                    Evidence {
                        threshold: Some(threshold),
                        notes,
                        ..Evidence::default()
                    },
                )
            }
        }
    }
}

/// Compares the corneal reflections of both eyes frame by frame.
#[derive(Clone)]
pub struct ReflectionAnalyzer {
    landmarker: Arc<dyn FaceLandmarker>,
    config: ReflectionConfig,
}

impl ReflectionAnalyzer {
    pub fn new(landmarker: Arc<dyn FaceLandmarker>, config: ReflectionConfig) -> Self {
        Self { landmarker, config }
    }

    pub fn config(&self) -> &ReflectionConfig {
        &self.config
    }

    fn eye_reflection(&self, eye: &EyeRegion) -> Result<Mask, DetectionError> {
        let cornea = eye.cornea()?;
        let iris = segment_iris(&eye.image, &cornea, &self.config)?;
        let iris = iris.mask.erode(self.config.erosion_depth);
        let reflection = extract_reflection(&eye.image, &iris, &self.config);
        if reflection.is_empty() {
            return Err(DetectionError::EmptyReflection);
        }
        Ok(reflection)
    }

    /// Score one frame: the IOU of the two reflection masks at their best
    /// alignment.
    pub fn score_frame(&self, frame: &Frame) -> Result<FrameScore, DetectionError> {
        let face = single_face(self.landmarker.detect(frame)?)?;
        let cfg = &self.config;
        let left = crop_eye(frame, &face.left_eye, cfg.horizontal_margin, cfg.vertical_margin)?;
        let right = crop_eye(frame, &face.right_eye, cfg.horizontal_margin, cfg.vertical_margin)?;

        let left = self.eye_reflection(&left)?;
        let right = self.eye_reflection(&right)?;
        Ok(FrameScore {
            alignment: best_alignment(&left, &right),
            left_pixels: left.count(),
            right_pixels: right.count(),
        })
    }

    /// Mean IOU over frames that could be scored. Failing frames are left
    /// out of the mean rather than counted as zero.
    pub fn analyze(&self, frames: &[Frame]) -> ReflectionScore {
        let mut total = 0.0;
        let mut valid = 0usize;
        let mut reasons: Vec<String> = Vec::new();

        for (index, frame) in frames.iter().enumerate() {
            match self.score_frame(frame) {
                Ok(score) => {
                    total += score.alignment.iou;
                    valid += 1;
                }
                Err(e) => {
                    tracing::debug!(frame = index, error = %e, "Skipping frame");
                    let reason = e.to_string();
                    if !reasons.contains(&reason) {
                        reasons.push(reason);
                    }
                }
            }
        }

        let skipped = frames.len() - valid;
        if valid == 0 {
            return ReflectionScore::Inconclusive {
                skipped_frames: skipped,
                reasons,
            };
        }
        let mean_iou = total / valid as f64;
        tracing::debug!(mean_iou, valid, skipped, "Reflection consistency scored");
        ReflectionScore::Scored {
            mean_iou,
            valid_frames: valid,
            skipped_frames: skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{FaceLandmarks, Point};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn eye(cx: f64, cy: f64) -> Vec<Point> {
        vec![
            Point::new(cx - 14.0, cy),
            Point::new(cx - 7.0, cy - 7.0),
            Point::new(cx + 7.0, cy - 7.0),
            Point::new(cx + 14.0, cy),
            Point::new(cx + 7.0, cy + 7.0),
            Point::new(cx - 7.0, cy + 7.0),
        ]
    }

    /// A face whose irises are dark discs with a bright glint.
    fn face_frame(left_glint: (isize, isize), right_glint: (isize, isize)) -> Frame {
        let mut frame = Frame::filled(160, 80, [225, 200, 185]);
        for (cx, cy, glint) in [(50isize, 40isize, left_glint), (110, 40, right_glint)] {
            for y in 0..80isize {
                for x in 0..160isize {
                    let (dx, dy) = (x - cx, y - cy);
                    if dx * dx + dy * dy <= 36 {
                        frame.set_pixel(x as usize, y as usize, [90, 70, 60]);
                    }
                    let (gx, gy) = (dx - glint.0, dy - glint.1);
                    if (0..2).contains(&gx) && (0..2).contains(&gy) {
                        frame.set_pixel(x as usize, y as usize, [255, 255, 255]);
                    }
                }
            }
        }
        frame
    }

    struct Scripted {
        faces: Vec<FaceLandmarks>,
        calls: AtomicUsize,
    }

    impl FaceLandmarker for Scripted {
        fn detect(&self, _frame: &Frame) -> Result<Vec<FaceLandmarks>, DetectionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.faces.clone())
        }
    }

    fn analyzer(faces: Vec<FaceLandmarks>) -> ReflectionAnalyzer {
        ReflectionAnalyzer::new(
            Arc::new(Scripted {
                faces,
                calls: AtomicUsize::new(0),
            }),
            ReflectionConfig::default(),
        )
    }

    fn one_face() -> Vec<FaceLandmarks> {
        vec![FaceLandmarks {
            left_eye: eye(50.0, 40.0),
            right_eye: eye(110.0, 40.0),
        }]
    }

    #[test]
    fn test_matching_reflections_score_high() {
        let frame = face_frame((-1, -1), (-1, -1));
        let score = analyzer(one_face()).score_frame(&frame).unwrap();
        assert!(score.alignment.iou > 0.9, "{score:?}");
        assert!(score.left_pixels > 0 && score.right_pixels > 0);
    }

    #[test]
    fn test_no_face_and_crowd_are_detection_errors() {
        let frame = face_frame((0, 0), (0, 0));
        assert_eq!(
            analyzer(vec![]).score_frame(&frame).unwrap_err(),
            DetectionError::NoFace
        );
        let mut crowd = one_face();
        crowd.extend(one_face());
        assert_eq!(
            analyzer(crowd).score_frame(&frame).unwrap_err(),
            DetectionError::MultipleFaces(2)
        );
    }

    #[test]
    fn test_frames_without_faces_are_inconclusive() {
        let frames = vec![Frame::filled(20, 20, [0, 0, 0]); 3];
        let score = analyzer(vec![]).analyze(&frames);
        assert_eq!(
            score,
            ReflectionScore::Inconclusive {
                skipped_frames: 3,
                reasons: vec![DetectionError::NoFace.to_string()],
            }
        );
        assert_eq!(score.to_result(0.5).outcome, CheckOutcome::Inconclusive);
    }

    #[test]
    fn test_empty_input_is_inconclusive() {
        let score = analyzer(one_face()).analyze(&[]);
        assert!(matches!(
            score,
            ReflectionScore::Inconclusive {
                skipped_frames: 0,
                ..
            }
        ));
    }

    /// Finds the face only in lit frames.
    struct DarkBlind;

    impl FaceLandmarker for DarkBlind {
        fn detect(&self, frame: &Frame) -> Result<Vec<FaceLandmarks>, DetectionError> {
            if frame.pixel(0, 0) == [0, 0, 0] {
                return Err(DetectionError::NoFace);
            }
            Ok(one_face())
        }
    }

    #[test]
    fn test_mixed_batch_averages_only_scored_frames() {
        let lit = face_frame((-1, -1), (-1, -1));
        let dark = Frame::filled(160, 80, [0, 0, 0]);
        let frames: Vec<Frame> = (0..10)
            .map(|i| if i % 5 == 1 || i % 5 == 3 { dark.clone() } else { lit.clone() })
            .collect();

        let analyzer = ReflectionAnalyzer::new(Arc::new(DarkBlind), ReflectionConfig::default());
        let single = analyzer.score_frame(&lit).unwrap().alignment.iou;
        let score = analyzer.analyze(&frames);

        let ReflectionScore::Scored {
            mean_iou,
            valid_frames,
            skipped_frames,
        } = score
        else {
            panic!("expected a score, got {score:?}");
        };
        assert_eq!((valid_frames, skipped_frames), (6, 4));
        assert!((mean_iou - single).abs() < 1e-9, "{mean_iou} vs {single}");
        assert!(mean_iou > 0.9);

        let result = score.to_result(0.5);
        assert_eq!(result.outcome, CheckOutcome::Correct);
        assert_eq!(result.evidence.samples, 6);
        assert_eq!(result.evidence.notes, vec!["4 frames skipped".to_string()]);
    }

    #[test]
    fn test_mean_over_valid_frames_decides() {
        let passing = ReflectionScore::Scored {
            mean_iou: 0.72,
            valid_frames: 6,
            skipped_frames: 4,
        };
        let result = passing.to_result(0.5);
        assert_eq!(result.outcome, CheckOutcome::Correct);
        assert_eq!(result.evidence.samples, 6);
        assert_eq!(result.evidence.notes, vec!["4 frames skipped".to_string()]);

        let failing = ReflectionScore::Scored {
            mean_iou: 0.31,
            valid_frames: 8,
            skipped_frames: 0,
        };
        assert_eq!(failing.to_result(0.5).outcome, CheckOutcome::Fake);
    }
}
