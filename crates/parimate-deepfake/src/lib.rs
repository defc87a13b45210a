//! The composite deepfake check: metadata forensics, then eye reflection
//! consistency, then the learned classifier.

pub mod check;

pub use check::*;
