//! Checks that the video matches the user and the task: the owner's face,
//! the spoken code phrase and the task description.

pub mod description;
pub mod fuzzy;
pub mod identity;
pub mod phrase;
pub mod phrase_check;
pub mod remote;
pub mod speech;
pub mod yandex;

pub use description::*;
pub use fuzzy::{bigram_jaccard, ratio};
pub use identity::*;
pub use phrase::*;
pub use phrase_check::*;
pub use remote::*;
pub use speech::*;
pub use yandex::*;
