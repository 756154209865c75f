//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the subprocess seams, so the
//! whole pipeline can be exercised without ffmpeg installed.
//!
//! # Example
//!
//! ```rust,ignore
//! use vidingest_core::testing::{fixtures, MockMediaProber, MockProcessRunner, MockResponse};
//!
//! let runner = MockProcessRunner::new();
//! let prober = MockMediaProber::new();
//!
//! // Configure mock responses
//! runner.on_args_containing("-encoders", MockResponse::ok_stdout(fixtures::ENCODER_LIST)).await;
//! prober.set_probe_result("/uploads/clip.mov", fixtures::video_container(1920, 1080, 12.0)).await;
//!
//! // Use with build_processor...
//! ```

mod mock_process;
mod mock_processor;
mod mock_prober;

pub use mock_process::{MockProcessRunner, MockResponse, RecordedCall};
pub use mock_processor::MockVideoProcessor;
pub use mock_prober::MockMediaProber;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::PathBuf;

    use crate::transcode::{RawContainerInfo, RawStreamInfo};

    /// `ffmpeg -encoders` output for a typical build.
    pub const ENCODER_LIST: &str = "Encoders:
 V..... = Video
 A..... = Audio
 S..... = Subtitle
 .F.... = Frame-level multithreading
 ..S... = Slice-level multithreading
 ...X.. = Codec is experimental
 ....B. = Supports draw_horiz_band
 .....D = Supports direct rendering method 1
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC / MPEG-4 part 10 (codec h264)
 V....D libx265              libx265 H.265 / HEVC (codec hevc)
 V.S... mpeg4                MPEG-4 part 2
 A....D aac                  AAC (Advanced Audio Coding)
 A....D libmp3lame           libmp3lame MP3 (MPEG audio layer 3) (codec mp3)
 S..... mov_text             3GPP Timed Text subtitle
";

    /// An MP4 with one unrotated H.264 stream and AAC audio.
    pub fn video_container(width: u32, height: u32, duration_secs: f64) -> RawContainerInfo {
        RawContainerInfo {
            path: PathBuf::from("clip.mp4"),
            format_name: "mov".to_string(),
            duration_secs,
            bitrate: Some(4_000_000),
            size_bytes: 8 * 1024 * 1024,
            video: Some(RawStreamInfo {
                width,
                height,
                duration_secs,
                bitrate: Some(3_800_000),
                codec_name: "h264".to_string(),
                rotate_tag: None,
                display_matrix_rotation: None,
            }),
            audio_codec: Some("aac".to_string()),
        }
    }

    /// A phone recording: landscape sensor pixels with rotation signals.
    pub fn phone_recording(
        width: u32,
        height: u32,
        rotate_tag: Option<i32>,
        display_matrix_rotation: Option<f64>,
    ) -> RawContainerInfo {
        let mut info = video_container(width, height, 12.0);
        info.format_name = "mov".to_string();
        info.size_bytes = 40 * 1024 * 1024;
        if let Some(video) = info.video.as_mut() {
            video.codec_name = "hevc".to_string();
            video.rotate_tag = rotate_tag;
            video.display_matrix_rotation = display_matrix_rotation;
        }
        info
    }

    /// A container with audio only.
    pub fn audio_only() -> RawContainerInfo {
        RawContainerInfo {
            video: None,
            format_name: "mp3".to_string(),
            ..video_container(0, 0, 180.0)
        }
    }

    /// What the encoder produced: `width` x `height` H.264, smaller than the input.
    pub fn encoded_output(width: u32, height: u32, duration_secs: f64) -> RawContainerInfo {
        let mut info = video_container(width, height, duration_secs);
        info.size_bytes = 2 * 1024 * 1024;
        info.bitrate = Some(2_400_000);
        if let Some(video) = info.video.as_mut() {
            video.bitrate = Some(2_300_000);
        }
        info
    }

    /// [`encoded_output`] whose stream signals `rotate_tag` to players.
    pub fn rotated_output(
        width: u32,
        height: u32,
        duration_secs: f64,
        rotate_tag: i32,
    ) -> RawContainerInfo {
        let mut info = encoded_output(width, height, duration_secs);
        if let Some(video) = info.video.as_mut() {
            video.rotate_tag = Some(rotate_tag);
        }
        info
    }
}
