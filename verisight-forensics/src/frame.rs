//! Representative frame extraction.
//!
//! A video is reduced to the frame at index `N / 2` (integer division), which
//! steers clear of intro and outro cards. The upload is staged in a scoped
//! temporary directory that is removed on every exit path, including when the
//! request future is dropped.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum FrameError {
    /// The container could not be opened or reports no frames.
    #[error("Failed to decode video: {0}")]
    Decode(String),
    /// The container opened but the selected frame could not be read.
    #[error("Failed to extract video frame: {0}")]
    FrameRead(String),
    #[error("Video staging failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Decoding backend used by [`FrameExtractor`].
#[async_trait]
pub trait VideoDecoder: Send + Sync {
    /// Total number of video frames in the container.
    async fn frame_count(&self, path: &Path) -> Result<u64, FrameError>;

    /// Decode frame `index` and return it JPEG-encoded.
    async fn read_frame_jpeg(&self, path: &Path, index: u64) -> Result<Vec<u8>, FrameError>;
}

/// Index of the frame that stands in for the whole clip.
pub fn representative_index(total_frames: u64) -> u64 {
    total_frames / 2
}

#[derive(Clone)]
pub struct FrameExtractor {
    decoder: Arc<dyn VideoDecoder>,
}

impl FrameExtractor {
    pub fn new(decoder: Arc<dyn VideoDecoder>) -> Self {
        Self { decoder }
    }

    /// Stage `video`, pick the middle frame, and return it as JPEG bytes.
    pub async fn extract_representative_frame(
        &self,
        video: &[u8],
        mime: &str,
    ) -> Result<Vec<u8>, FrameError> {
        let staging = tempfile::Builder::new()
            .prefix("verisight-frame-")
            .tempdir()?;
        let path = staging
            .path()
            .join(format!("upload.{}", extension_for(mime)));
        tokio::fs::write(&path, video).await?;

        let total = self.decoder.frame_count(&path).await?;
        if total == 0 {
            return Err(FrameError::Decode("container reports zero frames".into()));
        }

        let index = representative_index(total);
        debug!(total_frames = total, index, "frame.select");

        let jpeg = self.decoder.read_frame_jpeg(&path, index).await?;
        if jpeg.is_empty() {
            return Err(FrameError::FrameRead(format!("frame {index} decoded to no data")));
        }

        info!(
            total_frames = total,
            index,
            jpeg_bytes = jpeg.len(),
            "frame.extracted"
        );
        Ok(jpeg)
    }
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        "video/x-matroska" => "mkv",
        "video/x-msvideo" => "avi",
        _ => "bin",
    }
}

/// Decoder backed by the `ffprobe` and `ffmpeg` command-line tools.
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl FfmpegDecoder {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }
}

#[async_trait]
impl VideoDecoder for FfmpegDecoder {
    async fn frame_count(&self, path: &Path) -> Result<u64, FrameError> {
        let mut cmd = Command::new(&self.ffprobe);
        cmd.args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-count_packets",
            "-show_entries",
            "stream=nb_read_packets",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .kill_on_drop(true);

        debug!("ffprobe command: {:?}", cmd);

        let output = cmd
            .output()
            .await
            .map_err(|e| FrameError::Decode(format!("failed to run ffprobe: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FrameError::Decode(format!(
                "ffprobe failed: {}",
                stderr.trim()
            )));
        }

        parse_frame_count(&String::from_utf8_lossy(&output.stdout))
    }

    async fn read_frame_jpeg(&self, path: &Path, index: u64) -> Result<Vec<u8>, FrameError> {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-v", "error", "-i"])
            .arg(path)
            .args([
                "-vf",
                &format!("select=eq(n\\,{index})"),
                "-frames:v",
                "1",
                "-f",
                "image2pipe",
                "-vcodec",
                "mjpeg",
                "-q:v",
                "2",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .kill_on_drop(true);

        debug!("ffmpeg command: {:?}", cmd);

        let output = cmd
            .output()
            .await
            .map_err(|e| FrameError::FrameRead(format!("failed to run ffmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FrameError::FrameRead(format!(
                "ffmpeg failed: {}",
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }
}

fn parse_frame_count(stdout: &str) -> Result<u64, FrameError> {
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| FrameError::Decode("no video stream found".into()))?;
    line.parse::<u64>()
        .map_err(|_| FrameError::Decode(format!("unexpected frame count {line:?}")))
}
