//! Runs every configured check against a submitted video concurrently and
//! collects their results into one verdict per session.

pub mod artifact;
pub mod orchestrator;
pub mod registry;

pub use artifact::*;
pub use orchestrator::*;
pub use registry::*;
