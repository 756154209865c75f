//! Error types for the transcode module.

use std::path::PathBuf;
use thiserror::Error;

use super::types::ProcessingStage;

/// Errors that terminate a processing run.
///
/// None of these are retried by the pipeline; retry policy belongs to the
/// caller. Codec selection is deliberately absent: it always degrades to a
/// default instead of failing.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// Input file does not exist.
    #[error("Input file not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    /// The container has no video stream.
    #[error("No video stream found in {}", path.display())]
    NoVideoStream { path: PathBuf },

    /// The prober could not read the input.
    #[error("Failed to probe media file: {reason}")]
    ProbeFailed { reason: String },

    /// The encode subprocess failed.
    #[error("Encoding failed: {stderr}")]
    EncodeFailed { stderr: String },

    /// The thumbnail subprocess failed.
    #[error("Thumbnail extraction failed: {stderr}")]
    ThumbnailFailed { stderr: String },

    /// The produced video could not be probed.
    #[error("Failed to probe processed output: {reason}")]
    ReprobeFailed { reason: String },

    /// The directory an output goes into could not be created.
    #[error("Failed to create output directory {}: {source}", path.display())]
    OutputDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Moving a finished artifact onto its final path failed.
    #[error("Failed to publish output {}: {source}", path.display())]
    OutputCommitFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TranscodeError {
    /// Creates a new probe failed error.
    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }

    /// Creates a new reprobe failed error.
    pub fn reprobe_failed(reason: impl Into<String>) -> Self {
        Self::ReprobeFailed {
            reason: reason.into(),
        }
    }

    /// The pipeline stage this error terminates.
    pub fn stage(&self) -> ProcessingStage {
        match self {
            Self::InputNotFound { .. } => ProcessingStage::Validating,
            Self::NoVideoStream { .. } | Self::ProbeFailed { .. } => ProcessingStage::Probing,
            Self::EncodeFailed { .. } | Self::OutputDirectoryFailed { .. } => {
                ProcessingStage::Encoding
            }
            Self::ThumbnailFailed { .. } => ProcessingStage::ExtractingThumbnail,
            Self::ReprobeFailed { .. } | Self::OutputCommitFailed { .. } => {
                ProcessingStage::ReprobingOutput
            }
        }
    }
}

/// Errors raised while running an external binary.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Binary not found.
    #[error("Executable not found: {}", binary.display())]
    NotFound { binary: PathBuf },

    /// I/O error while spawning or talking to the child.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Child did not finish in time and was killed.
    #[error("Process timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },
}
