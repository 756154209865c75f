//! Background processing jobs.
//!
//! Processing a video takes from seconds to many minutes, so callers submit a
//! request and poll for the result instead of awaiting it inline. Jobs run as
//! tokio tasks; a semaphore caps how many run at once and the rest wait in
//! `Queued`.

mod manager;
mod types;

pub use manager::JobManager;
pub use types::{JobError, JobRecord, JobStatus};
