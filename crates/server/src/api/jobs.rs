//! Job API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use vidingest_core::{JobError, JobRecord, JobStatus, ProcessRequest, VideoProcessingResult};

use super::paths::{confine, PathError};
use crate::state::AppState;

/// Maximum allowed limit for job listings
const MAX_LIMIT: usize = 1000;

/// Default limit for job listings
const DEFAULT_LIMIT: usize = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for submitting a job
#[derive(Debug, Deserialize)]
pub struct CreateJobBody {
    /// The uploaded file to process
    pub input_path: String,
    /// Where the transcoded video is published
    pub output_path: String,
    /// Where the thumbnail is published
    pub thumbnail_path: String,
}

/// Query parameters for listing jobs
#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    /// Filter by status
    pub status: Option<JobStatus>,
    /// Maximum number of jobs to return
    pub limit: Option<usize>,
    /// Pagination offset
    pub offset: Option<usize>,
}

/// Response for job operations
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: String,
    pub status: JobStatus,
    pub request: ProcessRequest,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<VideoProcessingResult>,
}

impl From<JobRecord> for JobResponse {
    fn from(job: JobRecord) -> Self {
        Self {
            id: job.id,
            status: job.status,
            request: job.request,
            created_at: job.created_at.to_rfc3339(),
            started_at: job.started_at.map(|t| t.to_rfc3339()),
            finished_at: job.finished_at.map(|t| t.to_rfc3339()),
            result: job.result,
        }
    }
}

/// Response for listing jobs
#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<JobResponse>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct JobErrorResponse {
    pub error: String,
}

fn job_error(status: StatusCode, error: String) -> (StatusCode, Json<JobErrorResponse>) {
    (status, Json(JobErrorResponse { error }))
}

fn job_error_status(e: &JobError) -> StatusCode {
    match e {
        JobError::NotFound(_) => StatusCode::NOT_FOUND,
        JobError::AlreadyFinished { .. } => StatusCode::CONFLICT,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Submit a processing job. Returns as soon as the job is queued.
///
/// The input must lie under the input root, both outputs under the output root.
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateJobBody>,
) -> Result<(StatusCode, Json<JobResponse>), impl IntoResponse> {
    let storage = &state.config().storage;
    let confined = async {
        Ok::<_, PathError>((
            confine(&storage.input_root, &body.input_path, "input_path").await?,
            confine(&storage.output_root, &body.output_path, "output_path").await?,
            confine(&storage.output_root, &body.thumbnail_path, "thumbnail_path").await?,
        ))
    };
    let (input_path, output_path, thumbnail_path) = match confined.await {
        Ok(paths) => paths,
        Err(e) => return Err(job_error(e.status(), e.to_string())),
    };

    if output_path == thumbnail_path {
        return Err(job_error(
            StatusCode::BAD_REQUEST,
            "output_path and thumbnail_path must differ".to_string(),
        ));
    }

    let request = ProcessRequest::new(input_path, output_path, thumbnail_path);
    let job = state.jobs().submit(request).await;

    Ok((StatusCode::ACCEPTED, Json(JobResponse::from(job))))
}

/// Get a job by ID
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>, impl IntoResponse> {
    match state.jobs().get(&id).await {
        Ok(job) => Ok(Json(JobResponse::from(job))),
        Err(e) => Err(job_error(job_error_status(&e), e.to_string())),
    }
}

/// List jobs, newest first
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListJobsParams>,
) -> Json<ListJobsResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0);

    let jobs: Vec<JobRecord> = state
        .jobs()
        .list()
        .await
        .into_iter()
        .filter(|job| params.status.is_none_or(|status| job.status == status))
        .collect();
    let total = jobs.len();

    Json(ListJobsResponse {
        jobs: jobs
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(JobResponse::from)
            .collect(),
        total,
        limit,
        offset,
    })
}

/// Cancel a job (DELETE endpoint)
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>, impl IntoResponse> {
    match state.jobs().cancel(&id).await {
        Ok(job) => Ok(Json(JobResponse::from(job))),
        Err(e) => Err(job_error(job_error_status(&e), e.to_string())),
    }
}
