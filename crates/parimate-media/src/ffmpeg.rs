use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use serde::Deserialize;

use parimate_types::{Frame, ParimateError};

use crate::decoder::{FrameStream, VideoDecoder, VideoInfo};

/// Decoder that shells out to `ffprobe` for stream info and `ffmpeg` for
/// raw RGB frames.
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<usize>,
    height: Option<usize>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    #[serde(default)]
    side_data_list: Vec<SideData>,
    #[serde(default)]
    tags: StreamTags,
}

#[derive(Debug, Deserialize)]
struct SideData {
    rotation: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamTags {
    rotate: Option<String>,
}

impl ProbeStream {
    /// Display rotation in degrees, normalised to `0..360`. The display
    /// matrix wins over the legacy `rotate` tag.
    fn rotation(&self) -> i64 {
        let degrees = self
            .side_data_list
            .iter()
            .find_map(|d| d.rotation)
            .or_else(|| self.tags.rotate.as_deref().and_then(|r| r.trim().parse().ok()))
            .unwrap_or(0.0);
        (degrees.round() as i64).rem_euclid(360)
    }
}

/// Parse an ffprobe rational such as `30000/1001` or `25`.
pub(crate) fn parse_rate(rate: &str) -> Option<f64> {
    let rate = rate.trim();
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.parse().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}

fn parse_probe(path: &Path, stdout: &[u8]) -> Result<VideoInfo, ParimateError> {
    let probe: ProbeOutput = serde_json::from_slice(stdout)?;
    let stream = probe
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| ParimateError::io(path, "no video stream"))?;

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate))
        .unwrap_or(0.0);

    // ffmpeg applies the display rotation while decoding, so frames of a
    // portrait phone clip arrive with the coded sides swapped.
    let (mut width, mut height) = (stream.width.unwrap_or(0), stream.height.unwrap_or(0));
    if matches!(stream.rotation(), 90 | 270) {
        std::mem::swap(&mut width, &mut height);
    }

    Ok(VideoInfo {
        width,
        height,
        fps,
        frame_count: stream.nb_frames.and_then(|n| n.parse().ok()),
    })
}

impl FfmpegDecoder {
    pub fn probe(&self, path: &Path) -> Result<VideoInfo, ParimateError> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,r_frame_rate,avg_frame_rate,nb_frames\
                 :stream_tags=rotate:stream_side_data=rotation",
                "-of",
                "json",
            ])
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| ParimateError::io(path, format!("failed to spawn ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(ParimateError::io(
                path,
                format!(
                    "ffprobe exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        parse_probe(path, &output.stdout)
    }
}

impl VideoDecoder for FfmpegDecoder {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameStream>, ParimateError> {
        if !path.is_file() {
            return Err(ParimateError::io(path, "file does not exist"));
        }
        let info = self.probe(path)?;
        if info.width == 0 || info.height == 0 {
            return Err(ParimateError::io(path, "video stream has no dimensions"));
        }

        let mut child = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ParimateError::io(path, format!("failed to spawn ffmpeg: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ParimateError::io(path, "ffmpeg stdout unavailable"))?;
        let stderr = child.stderr.take().map(drain);

        tracing::debug!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            fps = info.fps,
            "Opened video"
        );

        Ok(Box::new(FfmpegStream {
            path: path.to_path_buf(),
            info,
            child,
            stdout: BufReader::new(stdout),
            stderr,
            finished: false,
        }))
    }
}

/// Collect ffmpeg's diagnostics on a side thread.
fn drain(mut stderr: ChildStderr) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut text = String::new();
        let _ = stderr.read_to_string(&mut text);
        text
    })
}

struct FfmpegStream {
    path: PathBuf,
    info: VideoInfo,
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
    finished: bool,
}

impl FfmpegStream {
    /// End of the frame pipe: a clean end only if ffmpeg exited cleanly.
    fn finish(&mut self) -> Result<Option<Frame>, ParimateError> {
        self.finished = true;
        let status = self
            .child
            .wait()
            .map_err(|e| ParimateError::io(&self.path, format!("waiting for ffmpeg: {e}")))?;
        let stderr = self
            .stderr
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        if status.success() {
            return Ok(None);
        }
        Err(ParimateError::io(
            &self.path,
            format!("ffmpeg exited with {status}: {}", stderr.trim()),
        ))
    }
}

impl FrameStream for FfmpegStream {
    fn info(&self) -> VideoInfo {
        self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, ParimateError> {
        if self.finished {
            return Ok(None);
        }
        let mut buf = vec![0u8; self.info.width * self.info.height * 3];
        match self.stdout.read_exact(&mut buf) {
            Ok(()) => Ok(Frame::from_rgb(self.info.width, self.info.height, buf)),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => self.finish(),
            Err(e) => Err(ParimateError::io(&self.path, e)),
        }
    }
}

impl Drop for FfmpegStream {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
