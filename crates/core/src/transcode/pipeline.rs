//! The processing state machine shared by every backend.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, Instrument};

use super::capabilities::CapabilityProber;
use super::config::{BackendKind, TranscoderConfig, VideoProcessingConfig};
use super::error::TranscodeError;
use super::filters::InputOrientation;
use super::geometry;
use super::probe::MediaProber;
use super::process::ProcessRunner;
use super::rotation;
use super::staging::StagingGuard;
use super::types::{
    CodecKind, Dimensions, ProcessRequest, ProcessingStage, Rotation, VideoMetadata,
    VideoProcessingResult,
};
use crate::metrics;

/// Everything resolved about one input before any encoder runs.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodePlan {
    pub input: PathBuf,
    pub rotation: Rotation,
    /// Turn the decoder gives the frames when autorotation is on, `None` without a display matrix.
    pub decoder_rotation: Option<Rotation>,
    /// The binary accepts `-display_rotation` on inputs.
    pub display_override: bool,
    /// Encode size, display-oriented.
    pub target: Dimensions,
    /// Thumbnail size, display-oriented.
    pub thumbnail_target: Dimensions,
    pub video_codec: String,
    pub audio_codec: String,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
    pub thumbnail_offset_secs: f64,
}

impl EncodePlan {
    /// Decoder strategy for an output that should signal `signal`.
    pub fn orientation(&self, signal: Rotation) -> InputOrientation {
        InputOrientation::choose(self.decoder_rotation, self.display_override, signal)
    }
}

/// Backend-specific part of the pipeline: turning a plan into ffmpeg arguments.
pub trait CommandComposer: Send + Sync {
    fn backend(&self) -> BackendKind;

    /// Rotation recorded for the produced file, given the resolved input rotation.
    fn processed_rotation(&self, original: Rotation) -> Rotation;

    /// Rotation the encoded container itself signals to players.
    ///
    /// The reprobe rejects an output whose stream says anything else.
    fn signalled_rotation(&self, original: Rotation) -> Rotation;

    /// Arguments for the full encode, writing to `output`.
    fn encode_args(&self, plan: &EncodePlan, output: &Path) -> Vec<OsString>;

    /// Arguments for the single-frame thumbnail, writing to `output`.
    fn thumbnail_args(&self, plan: &EncodePlan, output: &Path) -> Vec<OsString>;
}

/// Validate, probe, plan, encode, extract a thumbnail, reprobe, publish.
pub struct TranscodePipeline<C> {
    composer: C,
    runner: Arc<dyn ProcessRunner>,
    prober: Arc<dyn MediaProber>,
    capabilities: CapabilityProber,
    ffmpeg_path: PathBuf,
    processing: VideoProcessingConfig,
}

impl<C: CommandComposer> TranscodePipeline<C> {
    pub fn new(
        composer: C,
        runner: Arc<dyn ProcessRunner>,
        prober: Arc<dyn MediaProber>,
        capabilities: CapabilityProber,
        transcoder: &TranscoderConfig,
        processing: VideoProcessingConfig,
    ) -> Self {
        Self {
            composer,
            runner,
            prober,
            capabilities,
            ffmpeg_path: transcoder.ffmpeg_path.clone(),
            processing,
        }
    }

    pub fn backend(&self) -> BackendKind {
        self.composer.backend()
    }

    /// Runs one request to completion and reports the outcome.
    pub async fn run(&self, request: &ProcessRequest) -> VideoProcessingResult {
        let backend = self.composer.backend().as_str();
        let span = info_span!(
            "process_video",
            backend,
            input = %request.input_path.display()
        );

        async move {
            let start = Instant::now();
            info!(output = %request.output_path.display(), "Processing started");

            let outcome = self.execute(request).await;
            let elapsed = start.elapsed();
            metrics::PROCESSING_DURATION
                .with_label_values(&[backend])
                .observe(elapsed.as_secs_f64());

            match outcome {
                Ok(metadata) => {
                    metrics::PROCESSING_RUNS
                        .with_label_values(&[backend, "success"])
                        .inc();
                    info!(
                        elapsed_ms = elapsed.as_millis() as u64,
                        width = metadata.processed_width,
                        height = metadata.processed_height,
                        compression_ratio = metadata.compression_ratio,
                        "Processing finished"
                    );
                    VideoProcessingResult::succeeded(backend, request, metadata, elapsed)
                }
                Err(e) => {
                    let stage = e.stage();
                    metrics::PROCESSING_RUNS
                        .with_label_values(&[backend, "failed"])
                        .inc();
                    metrics::STAGE_FAILURES
                        .with_label_values(&[stage.as_str()])
                        .inc();
                    error!(stage = %stage, error = %e, "Processing failed");
                    VideoProcessingResult::failed(backend, &e, elapsed)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Probes one file and describes it as-is.
    pub async fn metadata(&self, path: &Path) -> Result<VideoMetadata, TranscodeError> {
        ensure_exists(path).await?;
        let info = self.prober.probe(path).await?;
        let stream = info
            .video
            .as_ref()
            .ok_or_else(|| TranscodeError::NoVideoStream {
                path: path.to_path_buf(),
            })?;
        let rotation = rotation::resolve_stream(stream);
        let snapshot = info.snapshot().ok_or_else(|| TranscodeError::NoVideoStream {
            path: path.to_path_buf(),
        })?;
        Ok(VideoMetadata::unprocessed(&snapshot, rotation))
    }

    async fn execute(&self, request: &ProcessRequest) -> Result<VideoMetadata, TranscodeError> {
        enter(ProcessingStage::Validating);
        ensure_exists(&request.input_path).await?;

        enter(ProcessingStage::Probing);
        let input = self.prober.probe(&request.input_path).await?;
        let (stream, original) = match (input.video.as_ref(), input.snapshot()) {
            (Some(stream), Some(snapshot)) => (stream, snapshot),
            _ => {
                return Err(TranscodeError::NoVideoStream {
                    path: request.input_path.clone(),
                })
            }
        };

        enter(ProcessingStage::ResolvingGeometry);
        let rotation = rotation::resolve_stream(stream);
        let (display_width, display_height) =
            geometry::display_dimensions(original.width, original.height, rotation);
        let p = &self.processing;
        let target =
            geometry::target_dimensions(display_width, display_height, p.max_width, p.max_height);
        let thumbnail_target = geometry::target_dimensions(
            display_width,
            display_height,
            p.thumbnail_max_width,
            p.thumbnail_max_height,
        );
        debug!(
            %rotation,
            source = %Dimensions::new(original.width, original.height),
            %target,
            %thumbnail_target,
            "Resolved geometry"
        );

        enter(ProcessingStage::SelectingCodecs);
        let video_codec = self
            .capabilities
            .best_codec(CodecKind::Video, &p.preferred_video_codec, &p.video_codec_fallbacks)
            .await;
        let audio_codec = self
            .capabilities
            .best_codec(CodecKind::Audio, &p.preferred_audio_codec, &p.audio_codec_fallbacks)
            .await;
        let display_override = self.capabilities.display_rotation().await;

        let plan = EncodePlan {
            input: request.input_path.clone(),
            rotation,
            decoder_rotation: rotation::decoder_rotation(stream),
            display_override,
            target,
            thumbnail_target,
            video_codec,
            audio_codec,
            video_bitrate_kbps: p.target_bitrate_kbps,
            audio_bitrate_kbps: p.audio_bitrate_kbps,
            thumbnail_offset_secs: p.thumbnail_offset_for(original.duration_secs),
        };

        let mut staging = StagingGuard::new();
        staging.create_parent(&request.output_path).await?;
        staging.create_parent(&request.thumbnail_path).await?;
        let staged_video = staging.stage(&request.output_path);
        let staged_thumbnail = staging.stage(&request.thumbnail_path);

        enter(ProcessingStage::Encoding);
        let args = self.composer.encode_args(&plan, &staged_video);
        self.run_ffmpeg(&args)
            .await
            .map_err(|stderr| TranscodeError::EncodeFailed { stderr })?;

        enter(ProcessingStage::ExtractingThumbnail);
        let args = self.composer.thumbnail_args(&plan, &staged_thumbnail);
        self.run_ffmpeg(&args)
            .await
            .map_err(|stderr| TranscodeError::ThumbnailFailed { stderr })?;

        enter(ProcessingStage::ReprobingOutput);
        let output = self
            .prober
            .probe(&staged_video)
            .await
            .map_err(|e| TranscodeError::reprobe_failed(e.to_string()))?;
        let processed = output
            .snapshot()
            .ok_or_else(|| TranscodeError::reprobe_failed("no video stream in processed output"))?;
        let expected = self.composer.signalled_rotation(rotation);
        let signalled = output
            .video
            .as_ref()
            .map(rotation::resolve_stream)
            .unwrap_or_default();
        if signalled != expected {
            return Err(TranscodeError::reprobe_failed(format!(
                "processed output signals {} rotation, expected {}",
                signalled, expected
            )));
        }
        staging.commit().await?;

        enter(ProcessingStage::Done);
        Ok(VideoMetadata::from_snapshots(
            &original,
            &processed,
            rotation,
            self.composer.processed_rotation(rotation),
        ))
    }

    /// Runs ffmpeg, returning the captured stderr on failure.
    async fn run_ffmpeg(&self, args: &[OsString]) -> Result<(), String> {
        debug!(?args, "Running ffmpeg");
        match self.runner.run(&self.ffmpeg_path, args).await {
            Ok(outcome) if outcome.success() => Ok(()),
            Ok(outcome) => Err(outcome.failure_output()),
            Err(e) => Err(e.to_string()),
        }
    }
}

fn enter(stage: ProcessingStage) {
    debug!(stage = %stage, "Entering stage");
}

async fn ensure_exists(path: &Path) -> Result<(), TranscodeError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        _ => Err(TranscodeError::InputNotFound {
            path: path.to_path_buf(),
        }),
    }
}
