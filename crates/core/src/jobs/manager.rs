use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, RwLock, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::types::{JobError, JobRecord, JobStatus};
use crate::config::JobsConfig;
use crate::metrics;
use crate::transcode::{ProcessRequest, VideoProcessingResult, VideoProcessor};

struct JobEntry {
    record: JobRecord,
    handle: Option<JoinHandle<()>>,
    status_tx: watch::Sender<JobStatus>,
}

type JobTable = Arc<RwLock<HashMap<String, JobEntry>>>;

/// How long finished jobs stay in the table, and how many of them.
#[derive(Debug, Clone, Copy)]
struct Retention {
    max_finished: usize,
    max_age: Duration,
}

impl Default for Retention {
    fn default() -> Self {
        let config = JobsConfig::default();
        Self {
            max_finished: config.max_retained_jobs,
            max_age: Duration::from_secs(config.retention_secs),
        }
    }
}

/// Runs processing requests as background tasks.
pub struct JobManager {
    processor: Arc<dyn VideoProcessor>,
    permits: Arc<Semaphore>,
    jobs: JobTable,
    retention: Retention,
}

impl JobManager {
    pub fn new(processor: Arc<dyn VideoProcessor>, max_parallel_jobs: usize) -> Self {
        Self {
            processor,
            permits: Arc::new(Semaphore::new(max_parallel_jobs.max(1))),
            jobs: Arc::new(RwLock::new(HashMap::new())),
            retention: Retention::default(),
        }
    }

    /// Bounds the finished jobs kept for lookup.
    ///
    /// Queued and running jobs are never evicted.
    pub fn with_retention(mut self, max_finished: usize, max_age: Duration) -> Self {
        self.retention = Retention {
            max_finished: max_finished.max(1),
            max_age,
        };
        self
    }

    /// Name of the backend jobs run on.
    pub fn backend(&self) -> &str {
        self.processor.name()
    }

    /// Queues `request` and returns immediately.
    pub async fn submit(&self, request: ProcessRequest) -> JobRecord {
        let id = Uuid::new_v4().to_string();
        let record = JobRecord::queued(id.clone(), request.clone());
        let (status_tx, _) = watch::channel(JobStatus::Queued);

        // The task needs this lock to start, so it sees its entry with the handle set.
        let mut jobs = self.jobs.write().await;
        prune(&mut jobs, self.retention);
        let handle = tokio::spawn(run_job(
            id.clone(),
            request,
            self.processor.clone(),
            self.permits.clone(),
            self.jobs.clone(),
            self.retention,
        ));
        jobs.insert(
            id.clone(),
            JobEntry {
                record: record.clone(),
                handle: Some(handle),
                status_tx,
            },
        );
        drop(jobs);

        info!(job_id = %id, input = %record.request.input_path.display(), "Job submitted");
        record
    }

    /// Get a job by ID.
    pub async fn get(&self, id: &str) -> Result<JobRecord, JobError> {
        self.jobs
            .read()
            .await
            .get(id)
            .map(|entry| entry.record.clone())
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    /// All jobs, newest first.
    pub async fn list(&self) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self
            .jobs
            .read()
            .await
            .values()
            .map(|entry| entry.record.clone())
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    /// Cancels a queued or running job.
    ///
    /// Returns once the task is gone: its subprocess has been killed and its
    /// temporary files removed.
    pub async fn cancel(&self, id: &str) -> Result<JobRecord, JobError> {
        let (handle, mut status_rx) = {
            let mut jobs = self.jobs.write().await;
            let entry = jobs
                .get_mut(id)
                .ok_or_else(|| JobError::NotFound(id.to_string()))?;
            if entry.record.status.is_terminal() {
                return Err(JobError::AlreadyFinished {
                    id: id.to_string(),
                    status: entry.record.status,
                });
            }
            (entry.handle.take(), entry.status_tx.subscribe())
        };

        let Some(handle) = handle else {
            // Another cancel holds the handle; report whatever it settles on.
            if status_rx.wait_for(|status| status.is_terminal()).await.is_err() {
                return Err(JobError::NotFound(id.to_string()));
            }
            return self.get(id).await;
        };

        handle.abort();
        let aborted = matches!(handle.await, Err(e) if e.is_cancelled());

        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(id)
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;

        if aborted && !entry.record.status.is_terminal() {
            entry.record.status = JobStatus::Cancelled;
            entry.record.finished_at = Some(Utc::now());
            entry.status_tx.send_replace(JobStatus::Cancelled);
            metrics::JOBS_FINISHED
                .with_label_values(&[JobStatus::Cancelled.as_str()])
                .inc();
            info!(job_id = %id, "Job cancelled");
        } else if !aborted {
            debug!(job_id = %id, status = %entry.record.status, "Job finished before cancellation");
        }

        let record = entry.record.clone();
        prune(&mut jobs, self.retention);
        Ok(record)
    }

    /// Waits until the job reaches a terminal status.
    pub async fn wait(&self, id: &str) -> Result<JobRecord, JobError> {
        let mut status_rx = {
            let jobs = self.jobs.read().await;
            let entry = jobs
                .get(id)
                .ok_or_else(|| JobError::NotFound(id.to_string()))?;
            entry.status_tx.subscribe()
        };

        // The sender lives in the table, so the channel only closes if the entry is gone.
        let reached = status_rx.wait_for(|status| status.is_terminal()).await.is_ok();
        if !reached {
            return Err(JobError::NotFound(id.to_string()));
        }
        self.get(id).await
    }
}

/// Decrements the running gauge however the job ends, abort included.
struct RunningGuard;

impl RunningGuard {
    fn start() -> Self {
        metrics::JOBS_RUNNING.inc();
        Self
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        metrics::JOBS_RUNNING.dec();
    }
}

async fn run_job(
    id: String,
    request: ProcessRequest,
    processor: Arc<dyn VideoProcessor>,
    permits: Arc<Semaphore>,
    jobs: JobTable,
    retention: Retention,
) {
    let _permit = match permits.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            warn!(job_id = %id, "Job queue closed before the job could start");
            return;
        }
    };

    {
        let mut jobs = jobs.write().await;
        let Some(entry) = jobs.get_mut(&id) else {
            return;
        };
        if entry.record.status.is_terminal() {
            return;
        }
        entry.record.status = JobStatus::Running;
        entry.record.started_at = Some(Utc::now());
        entry.status_tx.send_replace(JobStatus::Running);
    }
    debug!(job_id = %id, "Job started");

    let result = {
        let _running = RunningGuard::start();
        processor.process_video(&request).await
    };

    finish(&jobs, &id, result, retention).await;
}

async fn finish(jobs: &JobTable, id: &str, result: VideoProcessingResult, retention: Retention) {
    let status = if result.success {
        JobStatus::Completed
    } else {
        JobStatus::Failed
    };

    let mut jobs = jobs.write().await;
    let Some(entry) = jobs.get_mut(id) else {
        return;
    };
    if entry.record.status.is_terminal() {
        debug!(job_id = %id, status = %entry.record.status, "Dropping result of a settled job");
        return;
    }
    entry.record.status = status;
    entry.record.finished_at = Some(Utc::now());
    entry.record.result = Some(result);
    entry.status_tx.send_replace(status);

    metrics::JOBS_FINISHED
        .with_label_values(&[status.as_str()])
        .inc();
    info!(job_id = %id, status = %status, "Job finished");
    prune(&mut jobs, retention);
}

/// Drops finished jobs older than the retention window, then the oldest
/// finished jobs beyond the count limit.
fn prune(jobs: &mut HashMap<String, JobEntry>, retention: Retention) {
    let now = Utc::now();
    let before = jobs.len();

    jobs.retain(|_, entry| match entry.record.finished_at {
        Some(finished_at) if entry.record.status.is_terminal() => (now - finished_at)
            .to_std()
            .map(|age| age <= retention.max_age)
            .unwrap_or(true),
        _ => true,
    });

    let mut finished: Vec<(chrono::DateTime<Utc>, String)> = jobs
        .iter()
        .filter(|(_, entry)| entry.record.status.is_terminal())
        .filter_map(|(id, entry)| entry.record.finished_at.map(|at| (at, id.clone())))
        .collect();
    if finished.len() > retention.max_finished {
        finished.sort();
        let excess = finished.len() - retention.max_finished;
        for (_, id) in finished.into_iter().take(excess) {
            jobs.remove(&id);
        }
    }

    let evicted = before - jobs.len();
    if evicted > 0 {
        debug!(evicted, remaining = jobs.len(), "Evicted finished jobs");
    }
}
