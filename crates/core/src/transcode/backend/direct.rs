//! Backend that hand-assembles ffmpeg arguments and bakes rotation into pixels.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;

use crate::transcode::capabilities::CapabilityProber;
use crate::transcode::config::{BackendKind, TranscoderConfig, VideoProcessingConfig};
use crate::transcode::error::TranscodeError;
use crate::transcode::filters;
use crate::transcode::pipeline::{CommandComposer, EncodePlan, TranscodePipeline};
use crate::transcode::probe::MediaProber;
use crate::transcode::process::{path_arg, ProcessRunner};
use crate::transcode::traits::VideoProcessor;
use crate::transcode::types::{ProcessRequest, Rotation, VideoMetadata, VideoProcessingResult};

/// Argument builder for [`DirectProcessBackend`].
#[derive(Debug, Clone)]
pub struct DirectCommands {
    log_level: String,
    extra_args: Vec<String>,
}

impl DirectCommands {
    pub fn new(config: &TranscoderConfig) -> Self {
        Self {
            log_level: config.ffmpeg_log_level.clone(),
            extra_args: config.extra_ffmpeg_args.clone(),
        }
    }

    fn global_args(&self) -> Vec<OsString> {
        vec!["-hide_banner".into(), "-loglevel".into(), self.log_level.clone().into()]
    }
}

fn os(args: Vec<String>) -> impl Iterator<Item = OsString> {
    args.into_iter().map(OsString::from)
}

impl CommandComposer for DirectCommands {
    fn backend(&self) -> BackendKind {
        BackendKind::DirectProcess
    }

    fn processed_rotation(&self, _original: Rotation) -> Rotation {
        Rotation::None
    }

    fn signalled_rotation(&self, _original: Rotation) -> Rotation {
        Rotation::None
    }

    fn encode_args(&self, plan: &EncodePlan, output: &Path) -> Vec<OsString> {
        let orientation = plan.orientation(Rotation::None);
        // Policy is irrelevant once pixels are rotated: the field is always zeroed.
        let transform = filters::build_transform(
            plan.rotation,
            orientation.applied(),
            plan.target,
            true,
            Default::default(),
        );

        let mut args = self.global_args();
        args.extend(os(orientation.decoder_args()));
        args.push("-i".into());
        args.push(path_arg(&plan.input));

        args.push("-vf".into());
        args.push(transform.filter_graph().into());
        args.push("-c:v".into());
        args.push(plan.video_codec.clone().into());
        args.extend(os(filters::video_rate_args(&plan.video_codec, plan.video_bitrate_kbps)));

        args.push("-c:a".into());
        args.push(plan.audio_codec.clone().into());
        args.extend(os(filters::audio_rate_args(plan.audio_bitrate_kbps)));

        args.extend(os(transform.metadata_args()));
        args.extend(os(filters::container_args(output)));
        args.extend(self.extra_args.iter().map(OsString::from));

        args.push("-y".into());
        args.push(path_arg(output));
        args
    }

    fn thumbnail_args(&self, plan: &EncodePlan, output: &Path) -> Vec<OsString> {
        let orientation = plan.orientation(Rotation::None);
        let transform = filters::build_transform(
            plan.rotation,
            orientation.applied(),
            plan.thumbnail_target,
            true,
            Default::default(),
        );

        let mut args = self.global_args();
        // Input seek: jumps to the nearest keyframe before decoding.
        args.push("-ss".into());
        args.push(filters::seek_position(plan.thumbnail_offset_secs).into());
        args.extend(os(orientation.decoder_args()));
        args.push("-i".into());
        args.push(path_arg(&plan.input));

        args.push("-vf".into());
        args.push(transform.filter_graph().into());
        args.extend(os(filters::still_frame_args()));

        args.push("-y".into());
        args.push(path_arg(output));
        args
    }
}

/// [`VideoProcessor`] that produces upright pixels with a zero rotation field.
pub struct DirectProcessBackend {
    pipeline: TranscodePipeline<DirectCommands>,
}

impl DirectProcessBackend {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        prober: Arc<dyn MediaProber>,
        capabilities: CapabilityProber,
        transcoder: &TranscoderConfig,
        processing: VideoProcessingConfig,
    ) -> Self {
        Self {
            pipeline: TranscodePipeline::new(
                DirectCommands::new(transcoder),
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
impl VideoProcessor for DirectProcessBackend {
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
