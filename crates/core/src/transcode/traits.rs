//! Trait definitions for the transcode module.

use async_trait::async_trait;
use std::path::Path;

use super::error::TranscodeError;
use super::types::{ProcessRequest, VideoMetadata, VideoProcessingResult};

/// A backend that turns an uploaded video into a web-ready video and thumbnail.
#[async_trait]
pub trait VideoProcessor: Send + Sync {
    /// Returns the name of this backend.
    fn name(&self) -> &str;

    /// Runs the whole pipeline for one request.
    ///
    /// Never returns an error: failures are reported through
    /// [`VideoProcessingResult::success`]. Dropping the future cancels the run
    /// and leaves nothing at the requested output paths.
    async fn process_video(&self, request: &ProcessRequest) -> VideoProcessingResult;

    /// Probes a single file without processing it.
    async fn get_metadata(&self, path: &Path) -> Result<VideoMetadata, TranscodeError>;
}
