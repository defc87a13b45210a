use std::path::Path;
use std::sync::Arc;

use parimate_types::{Frame, ParimateError, SamplingConfig, Stride};

use crate::decoder::{VideoDecoder, VideoInfo};
use crate::sharpness::keep_sharpest;

/// Pulls every Nth frame from a video, starting at frame 0.
///
/// Each call re-opens the video and returns a fully materialised list, so the
/// same sampler can be reused for any number of videos or passes.
#[derive(Clone)]
pub struct FrameSampler {
    decoder: Arc<dyn VideoDecoder>,
    config: SamplingConfig,
}

impl FrameSampler {
    pub fn new(decoder: Arc<dyn VideoDecoder>, config: SamplingConfig) -> Self {
        Self { decoder, config }
    }

    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }

    /// Frame step for a stream. Zero means nothing can be sampled.
    pub fn step_for(stride: Stride, info: &VideoInfo) -> usize {
        match stride {
            Stride::Frames(n) => n,
            Stride::Seconds(s) if s.is_finite() && s > 0.0 && info.fps > 0.0 => {
                (s * info.fps).floor() as usize
            }
            Stride::Seconds(_) => 0,
        }
    }

    fn frame_limit(&self, info: &VideoInfo) -> Option<usize> {
        self.config
            .max_seconds
            .filter(|_| info.fps > 0.0)
            .map(|secs| (secs * info.fps).floor() as usize)
    }

    pub fn sample(&self, path: &Path) -> Result<Vec<Frame>, ParimateError> {
        let mut stream = self.decoder.open(path)?;
        let info = stream.info();

        let step = Self::step_for(self.config.stride, &info);
        if step == 0 || info.frame_count == Some(0) {
            tracing::debug!(path = %path.display(), step, "Nothing to sample");
            return Ok(Vec::new());
        }
        let limit = self.frame_limit(&info);

        let mut frames = Vec::new();
        let mut index = 0usize;
        while let Some(frame) = stream.next_frame()? {
            if limit.is_some_and(|l| index >= l) {
                break;
            }
            if index % step == 0 {
                frames.push(frame);
                if self
                    .config
                    .max_frames
                    .is_some_and(|max| frames.len() >= max)
                {
                    break;
                }
            }
            index += 1;
        }
        drop(stream);

        let frames = match self.config.sharpness_keep {
            Some(fraction) => keep_sharpest(frames, fraction),
            None => frames,
        };

        tracing::debug!(
            path = %path.display(),
            step,
            decoded = index,
            sampled = frames.len(),
            "Sampled frames"
        );
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::MemoryDecoder;

    fn numbered(n: usize) -> Vec<Frame> {
        (0..n)
            .map(|i| Frame::filled(2, 2, [i as u8, 0, 0]))
            .collect()
    }

    fn sampler(fps: f64, frames: Vec<Frame>, config: SamplingConfig) -> FrameSampler {
        FrameSampler::new(Arc::new(MemoryDecoder::new(fps, frames)), config)
    }

    fn red(frames: &[Frame]) -> Vec<u8> {
        frames.iter().map(|f| f.pixel(0, 0)[0]).collect()
    }

    #[test]
    fn test_frame_stride_starts_at_zero() {
        let config = SamplingConfig {
            stride: Stride::Frames(3),
            ..SamplingConfig::default()
        };
        let frames = sampler(30.0, numbered(10), config)
            .sample(Path::new("v"))
            .unwrap();
        assert_eq!(red(&frames), vec![0, 3, 6, 9]);
    }

    #[test]
    fn test_time_stride_uses_fps() {
        let config = SamplingConfig {
            stride: Stride::Seconds(0.5),
            ..SamplingConfig::default()
        };
        let frames = sampler(10.0, numbered(12), config)
            .sample(Path::new("v"))
            .unwrap();
        assert_eq!(red(&frames), vec![0, 5, 10]);
    }

    #[test]
    fn test_zero_step_is_empty() {
        let config = SamplingConfig {
            stride: Stride::Frames(0),
            ..SamplingConfig::default()
        };
        assert!(
            sampler(30.0, numbered(5), config)
                .sample(Path::new("v"))
                .unwrap()
                .is_empty()
        );

        // Sub-frame time stride rounds down to zero.
        let config = SamplingConfig {
            stride: Stride::Seconds(0.01),
            ..SamplingConfig::default()
        };
        assert!(
            sampler(30.0, numbered(5), config)
                .sample(Path::new("v"))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_empty_video_is_empty() {
        let frames = sampler(30.0, Vec::new(), SamplingConfig::default())
            .sample(Path::new("v"))
            .unwrap();
        assert!(frames.is_empty());
    }

    #[test]
    fn test_limits() {
        let config = SamplingConfig {
            stride: Stride::Frames(1),
            max_frames: Some(3),
            ..SamplingConfig::default()
        };
        let frames = sampler(10.0, numbered(10), config)
            .sample(Path::new("v"))
            .unwrap();
        assert_eq!(red(&frames), vec![0, 1, 2]);

        let config = SamplingConfig {
            stride: Stride::Frames(2),
            max_seconds: Some(0.5),
            ..SamplingConfig::default()
        };
        let frames = sampler(10.0, numbered(10), config)
            .sample(Path::new("v"))
            .unwrap();
        assert_eq!(red(&frames), vec![0, 2, 4]);
    }

    #[test]
    fn test_sampling_is_restartable() {
        let config = SamplingConfig {
            stride: Stride::Frames(2),
            ..SamplingConfig::default()
        };
        let sampler = sampler(10.0, numbered(6), config);
        let first = sampler.sample(Path::new("v")).unwrap();
        let second = sampler.sample(Path::new("v")).unwrap();
        assert_eq!(first, second);
    }

    proptest::proptest! {
        #[test]
        fn prop_frame_stride_picks_multiples(n in 0usize..60, step in 1usize..10) {
            let config = SamplingConfig {
                stride: Stride::Frames(step),
                ..SamplingConfig::default()
            };
            let frames = sampler(25.0, numbered(n), config)
                .sample(Path::new("v"))
                .unwrap();
            let expected: Vec<u8> = (0..n).step_by(step).map(|i| i as u8).collect();
            proptest::prop_assert_eq!(red(&frames), expected);
        }
    }
}
