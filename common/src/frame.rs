use image::RgbaImage;
use std::path::{Path, PathBuf};

const FRAME_PREFIX: &str = "frame_";
const FRAME_EXT: &str = "jpg";

/// A captured screen frame waiting in the capture queue.
///
/// `captured_at` is seconds since the capture session started, taken from a
/// monotonic clock, so frames of one session always sort in capture order.
#[derive(Debug, Clone)]
pub struct Frame {
    pub pixels: RgbaImage,
    pub captured_at: f64,
    pub seq: u64,
}

impl Frame {
    pub fn new(pixels: RgbaImage, captured_at: f64, seq: u64) -> Self {
        Self {
            pixels,
            captured_at,
            seq,
        }
    }

    pub fn file_name(&self) -> String {
        frame_file_name(self.captured_at)
    }
}

/// A frame that the writer has persisted to the working directory.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedImage {
    pub path: PathBuf,
    pub captured_at: f64,
}

impl PersistedImage {
    /// Build from a path whose file name carries a frame timestamp.
    pub fn from_path(path: PathBuf) -> Result<Self, FrameError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| FrameError::BadFileName(path.display().to_string()))?;
        let captured_at = parse_frame_timestamp(name)?;
        Ok(Self { path, captured_at })
    }
}

/// File name for a frame captured `captured_at` seconds into the session,
/// with millisecond precision. e.g. `frame_12.345.jpg`
pub fn frame_file_name(captured_at: f64) -> String {
    format!("{FRAME_PREFIX}{captured_at:.3}.{FRAME_EXT}")
}

/// Recover the session-relative timestamp from a frame file name.
pub fn parse_frame_timestamp(file_name: &str) -> Result<f64, FrameError> {
    let stem = file_name
        .strip_prefix(FRAME_PREFIX)
        .and_then(|rest| rest.rsplit_once('.'))
        .map(|(stem, _ext)| stem)
        .ok_or_else(|| FrameError::BadFileName(file_name.to_string()))?;
    let ts: f64 = stem
        .parse()
        .map_err(|_| FrameError::BadTimestamp(file_name.to_string()))?;
    if !ts.is_finite() || ts < 0.0 {
        return Err(FrameError::BadTimestamp(file_name.to_string()));
    }
    Ok(ts)
}

pub fn identifier_for(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("not a frame file name: {0}")]
    BadFileName(String),
    #[error("frame file name has no valid timestamp: {0}")]
    BadTimestamp(String),
}
