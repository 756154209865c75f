//! Configuration for the transcode module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which backend implements [`VideoProcessor`](super::VideoProcessor).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Hand-built ffmpeg argument vectors, rotation baked into pixels.
    #[default]
    DirectProcess,
    /// Commands assembled through the ffmpeg-sidecar builder, rotation left to the player.
    EncoderCli,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectProcess => "direct_process",
            Self::EncoderCli => "encoder_cli",
        }
    }
}

/// What happens to the container rotation field when pixels are not rotated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationMetadataPolicy {
    /// Write the resolved rotation back so players can apply it.
    #[default]
    Preserve,
    /// Write an explicit zero.
    Zero,
}

/// Transcoder binaries and process settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscoderConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Backend selected at construction time.
    #[serde(default)]
    pub backend: BackendKind,

    /// Timeout for a single subprocess in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,

    /// Rotation field policy for the encoder CLI backend.
    #[serde(default)]
    pub rotation_metadata: RotationMetadataPolicy,

    /// Additional ffmpeg output arguments, inserted before the output path.
    #[serde(default)]
    pub extra_ffmpeg_args: Vec<String>,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_timeout() -> u64 {
    1800 // 30 minutes
}

fn default_log_level() -> String {
    "error".to_string()
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            backend: BackendKind::default(),
            timeout_secs: default_timeout(),
            ffmpeg_log_level: default_log_level(),
            rotation_metadata: RotationMetadataPolicy::default(),
            extra_ffmpeg_args: Vec::new(),
        }
    }
}

impl TranscoderConfig {
    /// Creates a new config with custom ffmpeg/ffprobe paths.
    pub fn with_paths(ffmpeg_path: PathBuf, ffprobe_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
            ..Default::default()
        }
    }

    /// Sets the backend.
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Sets the timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Caller-supplied encode settings, read-only for one processing call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoProcessingConfig {
    #[serde(default = "default_max_width")]
    pub max_width: u32,

    #[serde(default = "default_max_height")]
    pub max_height: u32,

    #[serde(default = "default_thumbnail_max")]
    pub thumbnail_max_width: u32,

    #[serde(default = "default_thumbnail_max")]
    pub thumbnail_max_height: u32,

    /// Where the thumbnail frame is taken, in seconds.
    #[serde(default = "default_thumbnail_offset")]
    pub thumbnail_offset_secs: f64,

    /// Target video bitrate in kbps. `maxrate` and `bufsize` derive from it.
    #[serde(default = "default_video_bitrate")]
    pub target_bitrate_kbps: u32,

    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate_kbps: u32,

    #[serde(default = "default_video_codec")]
    pub preferred_video_codec: String,

    #[serde(default = "default_audio_codec")]
    pub preferred_audio_codec: String,

    /// Tried in order when the preferred video codec is unavailable.
    #[serde(default = "default_video_fallbacks")]
    pub video_codec_fallbacks: Vec<String>,

    /// Tried in order when the preferred audio codec is unavailable.
    #[serde(default = "default_audio_fallbacks")]
    pub audio_codec_fallbacks: Vec<String>,
}

fn default_max_width() -> u32 {
    1280
}

fn default_max_height() -> u32 {
    1280
}

fn default_thumbnail_max() -> u32 {
    480
}

fn default_thumbnail_offset() -> f64 {
    1.0
}

fn default_video_bitrate() -> u32 {
    2500
}

fn default_audio_bitrate() -> u32 {
    128
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_video_fallbacks() -> Vec<String> {
    ["libopenh264", "h264_videotoolbox", "libx265", "mpeg4"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_audio_fallbacks() -> Vec<String> {
    ["libfdk_aac", "aac_at", "libmp3lame"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for VideoProcessingConfig {
    fn default() -> Self {
        Self {
            max_width: default_max_width(),
            max_height: default_max_height(),
            thumbnail_max_width: default_thumbnail_max(),
            thumbnail_max_height: default_thumbnail_max(),
            thumbnail_offset_secs: default_thumbnail_offset(),
            target_bitrate_kbps: default_video_bitrate(),
            audio_bitrate_kbps: default_audio_bitrate(),
            preferred_video_codec: default_video_codec(),
            preferred_audio_codec: default_audio_codec(),
            video_codec_fallbacks: default_video_fallbacks(),
            audio_codec_fallbacks: default_audio_fallbacks(),
        }
    }
}

impl VideoProcessingConfig {
    /// Sets the output bounds.
    pub fn with_max_dimensions(mut self, max_width: u32, max_height: u32) -> Self {
        self.max_width = max_width;
        self.max_height = max_height;
        self
    }

    /// Sets the thumbnail bounds.
    pub fn with_thumbnail_dimensions(mut self, max_width: u32, max_height: u32) -> Self {
        self.thumbnail_max_width = max_width;
        self.thumbnail_max_height = max_height;
        self
    }

    /// Offset actually used for a clip of `duration_secs`.
    ///
    /// Falls back to the middle of the clip when the configured offset is not
    /// strictly inside it.
    pub fn thumbnail_offset_for(&self, duration_secs: f64) -> f64 {
        if duration_secs > 0.0 && self.thumbnail_offset_secs >= duration_secs {
            duration_secs / 2.0
        } else {
            self.thumbnail_offset_secs.max(0.0)
        }
    }
}
