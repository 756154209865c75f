pub mod config;
pub mod jobs;
pub mod metrics;
pub mod testing;
pub mod transcode;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, JobsConfig,
    LogFormat, LoggingConfig, ServerConfig, StorageConfig,
};
pub use jobs::{JobError, JobManager, JobRecord, JobStatus};
pub use transcode::{
    build_processor, create_processor, BackendKind, CodecProbeCache, ProcessRequest,
    TranscodeError, TranscoderConfig, VideoMetadata, VideoProcessingConfig,
    VideoProcessingResult, VideoProcessor,
};
