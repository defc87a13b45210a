//! Corneal reflection consistency.
//!
//! Light sources seen by a real camera leave matching glints in both eyes.
//! Each frame is reduced to a pair of reflection masks, one per eye, and
//! scored by how well they overlap at their best alignment.

pub mod alignment;
pub mod analyzer;
pub mod eye;
pub mod highlight;
pub mod iris;
pub mod landmarks;
pub mod mask;
pub mod remote;

pub use alignment::*;
pub use analyzer::*;
pub use eye::*;
pub use highlight::*;
pub use iris::{IrisSegment, Plane, canny, gaussian_blur, hough_circle, lab_lightness, segment_iris};
pub use landmarks::*;
pub use mask::*;
pub use remote::*;
