pub mod audio;
pub mod decoder;
pub mod ffmpeg;
pub mod sampler;
pub mod sharpness;

pub use audio::*;
pub use decoder::*;
pub use ffmpeg::*;
pub use sampler::*;
pub use sharpness::*;
