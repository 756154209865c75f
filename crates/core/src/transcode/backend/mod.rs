//! Interchangeable [`VideoProcessor`] implementations.

mod direct;
mod encoder_cli;

pub use direct::{DirectCommands, DirectProcessBackend};
pub use encoder_cli::{EncoderCliBackend, SidecarCommands};

use std::sync::Arc;
use tracing::info;

use super::capabilities::{CapabilityProber, CodecProbeCache};
use super::config::{BackendKind, TranscoderConfig, VideoProcessingConfig};
use super::probe::{FfprobeProber, MediaProber};
use super::process::{ProcessRunner, TokioProcessRunner};
use super::traits::VideoProcessor;

/// Builds the backend selected by `transcoder.backend` on real subprocesses.
pub fn create_processor(
    transcoder: &TranscoderConfig,
    processing: VideoProcessingConfig,
) -> Arc<dyn VideoProcessor> {
    let runner: Arc<dyn ProcessRunner> = Arc::new(TokioProcessRunner::new(transcoder.timeout_secs));
    let prober: Arc<dyn MediaProber> = Arc::new(FfprobeProber::new(
        runner.clone(),
        transcoder.ffprobe_path.clone(),
    ));
    build_processor(runner, prober, CodecProbeCache::global(), transcoder, processing)
}

/// Builds the selected backend from explicit collaborators.
pub fn build_processor(
    runner: Arc<dyn ProcessRunner>,
    prober: Arc<dyn MediaProber>,
    cache: Arc<CodecProbeCache>,
    transcoder: &TranscoderConfig,
    processing: VideoProcessingConfig,
) -> Arc<dyn VideoProcessor> {
    let capabilities =
        CapabilityProber::new(runner.clone(), transcoder.ffmpeg_path.clone(), cache);

    info!(backend = transcoder.backend.as_str(), "Creating video processor");
    match transcoder.backend {
        BackendKind::DirectProcess => Arc::new(DirectProcessBackend::new(
            runner,
            prober,
            capabilities,
            transcoder,
            processing,
        )),
        BackendKind::EncoderCli => Arc::new(EncoderCliBackend::new(
            runner,
            prober,
            capabilities,
            transcoder,
            processing,
        )),
    }
}
