pub mod input;
pub mod model;
pub mod signal;

pub use input::*;
pub use model::*;
pub use signal::*;
