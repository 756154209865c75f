//! Types for the transcode module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::TranscodeError;

/// Canonical clockwise rotation.
///
/// Serialized as the plain degree value (`0`, `90`, `180`, `270`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    /// Degrees clockwise.
    pub fn degrees(&self) -> u16 {
        match self {
            Self::None => 0,
            Self::Cw90 => 90,
            Self::Cw180 => 180,
            Self::Cw270 => 270,
        }
    }

    /// Whether width and height trade places on screen.
    pub fn swaps_axes(&self) -> bool {
        matches!(self, Self::Cw90 | Self::Cw270)
    }

    /// The rotation that undoes this one.
    pub fn inverse(&self) -> Self {
        match self {
            Self::None => Self::None,
            Self::Cw90 => Self::Cw270,
            Self::Cw180 => Self::Cw180,
            Self::Cw270 => Self::Cw90,
        }
    }

    /// This rotation followed by `next`.
    pub fn then(&self, next: Rotation) -> Self {
        match (self.degrees() + next.degrees()) % 360 {
            90 => Self::Cw90,
            180 => Self::Cw180,
            270 => Self::Cw270,
            _ => Self::None,
        }
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Self::None),
            90 => Ok(Self::Cw90),
            180 => Ok(Self::Cw180),
            270 => Ok(Self::Cw270),
            other => Err(format!("rotation must be 0, 90, 180 or 270, got {}", other)),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Encode dimensions. Both components are positive and even.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width and height exchanged.
    pub fn transposed(&self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Media kind a codec is selected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecKind {
    Video,
    Audio,
}

impl CodecKind {
    /// Codec used when nothing in the preference list is supported.
    pub fn last_resort(&self) -> &'static str {
        match self {
            Self::Video => "libx264",
            Self::Audio => "aac",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

/// Probed, untrusted data for one video stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStreamInfo {
    pub width: u32,
    pub height: u32,
    /// Stream duration in seconds, 0.0 when unknown.
    pub duration_secs: f64,
    /// Stream bitrate in bits per second.
    pub bitrate: Option<u64>,
    pub codec_name: String,
    /// Legacy `rotate` stream tag.
    pub rotate_tag: Option<i32>,
    /// Rotation derived from the display matrix side data.
    pub display_matrix_rotation: Option<f64>,
}

/// Everything the prober reports about one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawContainerInfo {
    pub path: PathBuf,
    /// First entry of ffprobe's `format_name` list.
    pub format_name: String,
    pub duration_secs: f64,
    /// Container bitrate in bits per second.
    pub bitrate: Option<u64>,
    pub size_bytes: u64,
    pub video: Option<RawStreamInfo>,
    pub audio_codec: Option<String>,
}

impl RawContainerInfo {
    /// Flattens the container into the fields a [`VideoMetadata`] side needs.
    ///
    /// Returns `None` when there is no video stream.
    pub fn snapshot(&self) -> Option<MediaSnapshot> {
        let video = self.video.as_ref()?;
        let duration_secs = if video.duration_secs > 0.0 {
            video.duration_secs
        } else {
            self.duration_secs
        };

        Some(MediaSnapshot {
            width: video.width,
            height: video.height,
            duration_secs,
            size_bytes: self.size_bytes,
            format: self.format_name.clone(),
            bitrate_kbps: video
                .bitrate
                .or(self.bitrate)
                .map(|b| (b / 1000) as u32),
            video_codec: video.codec_name.clone(),
        })
    }
}

/// One side (original or processed) of a [`VideoMetadata`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSnapshot {
    pub width: u32,
    pub height: u32,
    pub duration_secs: f64,
    pub size_bytes: u64,
    pub format: String,
    pub bitrate_kbps: Option<u32>,
    pub video_codec: String,
}

/// Durable metadata record for one processed asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub original_width: u32,
    pub original_height: u32,
    pub processed_width: u32,
    pub processed_height: u32,
    /// On-screen size of the processed video once `processed_rotation` is applied.
    pub display_width: u32,
    pub display_height: u32,
    pub original_duration_secs: f64,
    pub processed_duration_secs: f64,
    pub original_size_bytes: u64,
    pub processed_size_bytes: u64,
    pub original_format: String,
    pub processed_format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_bitrate_kbps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_bitrate_kbps: Option<u32>,
    pub original_video_codec: String,
    pub processed_video_codec: String,
    pub original_rotation: Rotation,
    pub processed_rotation: Rotation,
    pub compression_ratio: f64,
}

impl VideoMetadata {
    /// Builds the record from both sides of a run.
    pub fn from_snapshots(
        original: &MediaSnapshot,
        processed: &MediaSnapshot,
        original_rotation: Rotation,
        processed_rotation: Rotation,
    ) -> Self {
        let (display_width, display_height) = super::geometry::display_dimensions(
            processed.width,
            processed.height,
            processed_rotation,
        );

        Self {
            original_width: original.width,
            original_height: original.height,
            processed_width: processed.width,
            processed_height: processed.height,
            display_width,
            display_height,
            original_duration_secs: original.duration_secs,
            processed_duration_secs: processed.duration_secs,
            original_size_bytes: original.size_bytes,
            processed_size_bytes: processed.size_bytes,
            original_format: original.format.clone(),
            processed_format: processed.format.clone(),
            original_bitrate_kbps: original.bitrate_kbps,
            processed_bitrate_kbps: processed.bitrate_kbps,
            original_video_codec: original.video_codec.clone(),
            processed_video_codec: processed.video_codec.clone(),
            original_rotation,
            processed_rotation,
            compression_ratio: compression_ratio(original.size_bytes, processed.size_bytes),
        }
    }

    /// Metadata for a file that has not been processed: both sides are the same file.
    pub fn unprocessed(snapshot: &MediaSnapshot, rotation: Rotation) -> Self {
        Self::from_snapshots(snapshot, snapshot, rotation, rotation)
    }
}

/// `processed / original`, or 1.0 when the original size is unknown.
pub fn compression_ratio(original_size: u64, processed_size: u64) -> f64 {
    if original_size > 0 {
        processed_size as f64 / original_size as f64
    } else {
        1.0
    }
}

/// Stages of a processing run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStage {
    Validating,
    Probing,
    ResolvingGeometry,
    SelectingCodecs,
    Encoding,
    ExtractingThumbnail,
    ReprobingOutput,
    Done,
    Failed,
}

impl ProcessingStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Probing => "probing",
            Self::ResolvingGeometry => "resolving_geometry",
            Self::SelectingCodecs => "selecting_codecs",
            Self::Encoding => "encoding",
            Self::ExtractingThumbnail => "extracting_thumbnail",
            Self::ReprobingOutput => "reprobing_output",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single processing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRequest {
    /// The uploaded file.
    pub input_path: PathBuf,
    /// Where the transcoded video is published.
    pub output_path: PathBuf,
    /// Where the thumbnail image is published.
    pub thumbnail_path: PathBuf,
}

impl ProcessRequest {
    pub fn new(
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        thumbnail_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            thumbnail_path: thumbnail_path.into(),
        }
    }
}

/// Outcome of one processing run.
///
/// Either fully populated with `success == true`, or carrying only the
/// error message and failed stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoProcessingResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<ProcessingStage>,
    /// Backend that produced this result.
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<VideoMetadata>,
    pub elapsed_ms: u64,
}

impl VideoProcessingResult {
    /// A successful run.
    pub fn succeeded(
        backend: &str,
        request: &ProcessRequest,
        metadata: VideoMetadata,
        elapsed: Duration,
    ) -> Self {
        Self {
            success: true,
            error_message: None,
            failed_stage: None,
            backend: backend.to_string(),
            video_file_name: file_name(&request.output_path),
            thumbnail_file_name: file_name(&request.thumbnail_path),
            metadata: Some(metadata),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// A failed run.
    pub fn failed(backend: &str, error: &TranscodeError, elapsed: Duration) -> Self {
        Self {
            success: false,
            error_message: Some(error.to_string()),
            failed_stage: Some(error.stage()),
            backend: backend.to_string(),
            video_file_name: None,
            thumbnail_file_name: None,
            metadata: None,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().to_string())
}
