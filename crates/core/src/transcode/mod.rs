//! Transcode module for turning uploaded videos into web-ready assets.
//!
//! This module provides the `VideoProcessor` trait and two backends that run
//! ffmpeg/ffprobe as subprocesses.
//!
//! # Features
//!
//! - Rotation resolution across the legacy `rotate` tag and the display matrix
//! - Aspect-preserving downscale to even dimensions
//! - Encoder capability probing with ordered codec fallbacks
//! - Thumbnail extraction
//! - Atomic publish of outputs, with cleanup on failure or cancellation
//!
//! # Example
//!
//! ```ignore
//! use vidingest_core::transcode::{create_processor, ProcessRequest, TranscoderConfig, VideoProcessingConfig};
//!
//! let processor = create_processor(&TranscoderConfig::default(), VideoProcessingConfig::default());
//!
//! let request = ProcessRequest::new(
//!     "/uploads/IMG_0001.MOV",
//!     "/media/IMG_0001.mp4",
//!     "/media/IMG_0001.jpg",
//! );
//!
//! let result = processor.process_video(&request).await;
//! if result.success {
//!     let metadata = result.metadata.unwrap();
//!     println!("{}x{} rotated {}", metadata.display_width, metadata.display_height, metadata.processed_rotation);
//! }
//! ```

mod backend;
mod capabilities;
mod config;
mod error;
mod filters;
mod pipeline;
mod probe;
mod process;
mod staging;
mod traits;
mod types;

pub mod geometry;
pub mod rotation;

pub use backend::{
    build_processor, create_processor, DirectCommands, DirectProcessBackend, EncoderCliBackend,
    SidecarCommands,
};
pub use capabilities::{CapabilityProber, CodecProbeCache, SupportedCodecs};
pub use config::{BackendKind, RotationMetadataPolicy, TranscoderConfig, VideoProcessingConfig};
pub use error::{ProcessError, TranscodeError};
pub use filters::{build_transform, FilterSpec, InputOrientation};
pub use pipeline::{CommandComposer, EncodePlan, TranscodePipeline};
pub use probe::{parse_probe_output, FfprobeProber, MediaProber};
pub use process::{path_arg, ProcessOutcome, ProcessRunner, TokioProcessRunner};
pub use staging::StagingGuard;
pub use traits::VideoProcessor;
pub use types::{
    compression_ratio, CodecKind, Dimensions, MediaSnapshot, ProcessRequest, ProcessingStage,
    RawContainerInfo, RawStreamInfo, Rotation, VideoMetadata, VideoProcessingResult,
};
