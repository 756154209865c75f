use std::sync::Arc;
use std::time::Duration;

use vidingest_core::transcode::CapabilityProber;
use vidingest_core::{Config, JobManager, VideoProcessor};

/// Shared application state
pub struct AppState {
    config: Config,
    processor: Arc<dyn VideoProcessor>,
    jobs: JobManager,
    capabilities: CapabilityProber,
}

impl AppState {
    pub fn new(
        config: Config,
        processor: Arc<dyn VideoProcessor>,
        capabilities: CapabilityProber,
    ) -> Self {
        let jobs = JobManager::new(processor.clone(), config.jobs.max_parallel_jobs)
            .with_retention(
                config.jobs.max_retained_jobs,
                Duration::from_secs(config.jobs.retention_secs),
            );
        Self {
            config,
            processor,
            jobs,
            capabilities,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn processor(&self) -> &dyn VideoProcessor {
        self.processor.as_ref()
    }

    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    pub fn capabilities(&self) -> &CapabilityProber {
        &self.capabilities
    }
}
