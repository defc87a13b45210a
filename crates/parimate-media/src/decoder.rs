use std::path::Path;

use parimate_types::{Frame, ParimateError};

/// Stream properties known before decoding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub width: usize,
    pub height: usize,
    /// Frames per second; 0.0 when the container does not say.
    pub fps: f64,
    /// Frame count from the container header, if present.
    pub frame_count: Option<u64>,
}

/// An open video, yielding decoded frames in presentation order.
///
/// Dropping the stream releases the underlying decoder.
pub trait FrameStream: Send {
    fn info(&self) -> VideoInfo;

    /// Next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>, ParimateError>;
}

/// Opens videos for decoding.
pub trait VideoDecoder: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameStream>, ParimateError>;
}

/// In-memory decoder over a fixed frame list; every path opens the same video.
#[derive(Debug, Clone)]
pub struct MemoryDecoder {
    pub info: VideoInfo,
    pub frames: Vec<Frame>,
}

impl MemoryDecoder {
    pub fn new(fps: f64, frames: Vec<Frame>) -> Self {
        let (width, height) = frames
            .first()
            .map(|f| (f.width, f.height))
            .unwrap_or((0, 0));
        Self {
            info: VideoInfo {
                width,
                height,
                fps,
                frame_count: Some(frames.len() as u64),
            },
            frames,
        }
    }
}

struct MemoryStream {
    info: VideoInfo,
    frames: std::vec::IntoIter<Frame>,
}

impl FrameStream for MemoryStream {
    fn info(&self) -> VideoInfo {
        self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, ParimateError> {
        Ok(self.frames.next())
    }
}

impl VideoDecoder for MemoryDecoder {
    fn open(&self, _path: &Path) -> Result<Box<dyn FrameStream>, ParimateError> {
        Ok(Box::new(MemoryStream {
            info: self.info,
            frames: self.frames.clone().into_iter(),
        }))
    }
}
