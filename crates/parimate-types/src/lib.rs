pub mod check;
pub mod config;
pub mod error;
pub mod frame;
pub mod session;
pub mod task;

pub use check::*;
pub use config::*;
pub use error::*;
pub use frame::*;
pub use session::*;
pub use task::*;
