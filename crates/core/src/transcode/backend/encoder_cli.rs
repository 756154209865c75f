//! Backend built on the ffmpeg-sidecar command builder.
//!
//! Rotation is never applied to the encoded pixels here. The encode keeps
//! the sensor orientation and records the rotation in the container so
//! players can correct it; the result reports the original rotation as the
//! processed one. Thumbnails are images with no rotation field, so they are
//! always turned upright.

use async_trait::async_trait;
use ffmpeg_sidecar::command::FfmpegCommand;
use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::sync::Arc;

use crate::transcode::capabilities::CapabilityProber;
use crate::transcode::config::{
    BackendKind, RotationMetadataPolicy, TranscoderConfig, VideoProcessingConfig,
};
use crate::transcode::error::TranscodeError;
use crate::transcode::filters;
use crate::transcode::pipeline::{CommandComposer, EncodePlan, TranscodePipeline};
use crate::transcode::probe::MediaProber;
use crate::transcode::process::{path_arg, ProcessRunner};
use crate::transcode::traits::VideoProcessor;
use crate::transcode::types::{ProcessRequest, Rotation, VideoMetadata, VideoProcessingResult};

/// Argument builder for [`EncoderCliBackend`].
#[derive(Debug, Clone)]
pub struct SidecarCommands {
    ffmpeg_path: std::path::PathBuf,
    log_level: String,
    rotation_metadata: RotationMetadataPolicy,
    extra_args: Vec<String>,
}

impl SidecarCommands {
    pub fn new(config: &TranscoderConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            log_level: config.ffmpeg_log_level.clone(),
            rotation_metadata: config.rotation_metadata,
            extra_args: config.extra_ffmpeg_args.clone(),
        }
    }

    fn command(&self) -> FfmpegCommand {
        let mut cmd = FfmpegCommand::new_with_path(&self.ffmpeg_path);
        cmd.hide_banner().args(["-loglevel", self.log_level.as_str()]);
        cmd
    }

    /// The argument vector the builder produced, run through our own process runner.
    fn into_args(mut cmd: FfmpegCommand) -> Vec<OsString> {
        cmd.as_inner()
            .get_args()
            .map(OsStr::to_os_string)
            .collect()
    }
}

impl CommandComposer for SidecarCommands {
    fn backend(&self) -> BackendKind {
        BackendKind::EncoderCli
    }

    fn processed_rotation(&self, original: Rotation) -> Rotation {
        original
    }

    fn signalled_rotation(&self, original: Rotation) -> Rotation {
        match self.rotation_metadata {
            RotationMetadataPolicy::Preserve => original,
            RotationMetadataPolicy::Zero => Rotation::None,
        }
    }

    fn encode_args(&self, plan: &EncodePlan, output: &Path) -> Vec<OsString> {
        let orientation = plan.orientation(self.signalled_rotation(plan.rotation));
        let transform = filters::build_transform(
            plan.rotation,
            orientation.applied(),
            plan.target,
            false,
            self.rotation_metadata,
        );

        let mut cmd = self.command();
        cmd.args(orientation.decoder_args())
            .input(path_arg(&plan.input))
            .args(["-vf".to_string(), transform.filter_graph()])
            .codec_video(&plan.video_codec)
            .args(filters::video_rate_args(&plan.video_codec, plan.video_bitrate_kbps))
            .codec_audio(&plan.audio_codec)
            .args(filters::audio_rate_args(plan.audio_bitrate_kbps))
            .args(transform.metadata_args())
            .args(filters::container_args(output))
            .args(&self.extra_args)
            .overwrite()
            .output(path_arg(output));

        Self::into_args(cmd)
    }

    fn thumbnail_args(&self, plan: &EncodePlan, output: &Path) -> Vec<OsString> {
        let orientation = plan.orientation(Rotation::None);
        let transform = filters::build_transform(
            plan.rotation,
            orientation.applied(),
            plan.thumbnail_target,
            true,
            self.rotation_metadata,
        );

        let mut cmd = self.command();
        cmd.args(["-ss".to_string(), filters::seek_position(plan.thumbnail_offset_secs)])
            .args(orientation.decoder_args())
            .input(path_arg(&plan.input))
            .args(["-vf".to_string(), transform.filter_graph()])
            .args(filters::still_frame_args())
            .overwrite()
            .output(path_arg(output));

        Self::into_args(cmd)
    }
}

/// [`VideoProcessor`] that defers rotation to the player.
pub struct EncoderCliBackend {
    pipeline: TranscodePipeline<SidecarCommands>,
}

impl EncoderCliBackend {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        prober: Arc<dyn MediaProber>,
        capabilities: CapabilityProber,
        transcoder: &TranscoderConfig,
        processing: VideoProcessingConfig,
    ) -> Self {
        Self {
            pipeline: TranscodePipeline::new(
                SidecarCommands::new(transcoder),
                runner,
                prober,
                capabilities,
                transcoder,
                processing,
            ),
        }
    }
}

#[async_trait]
impl VideoProcessor for EncoderCliBackend {
    fn name(&self) -> &str {
        self.pipeline.backend().as_str()
    }

    async fn process_video(&self, request: &ProcessRequest) -> VideoProcessingResult {
        self.pipeline.run(request).await
    }

    async fn get_metadata(&self, path: &Path) -> Result<VideoMetadata, TranscodeError> {
        self.pipeline.metadata(path).await
    }
}
