pub mod extractor;
pub mod forensics;
pub mod heuristics;
pub mod report;

pub use extractor::*;
pub use forensics::*;
pub use heuristics::{analyze, parse_duration, parse_timestamp};
pub use report::*;
