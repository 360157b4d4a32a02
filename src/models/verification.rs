use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::check::Check;
use crate::models::job::{JobOutcome, JobStatus};

/// Request to enqueue a verification run for a plugin.
#[derive(Debug, Deserialize, Validate)]
pub struct EnqueueRequest {
    /// Higher priority jobs are claimed sooner.
    #[garde(range(min = 0, max = 1000))]
    #[serde(default)]
    pub priority: i32,
}

/// Response after enqueueing a verification run.
#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub job_id: Uuid,
    pub status: String,
    pub message: String,
}

/// Response for one batch-processing invocation.
#[derive(Debug, Serialize)]
pub struct ProcessBatchResponse {
    pub processed: usize,
    pub outcomes: Vec<JobOutcome>,
}

/// Response for querying a plugin's newest job state.
#[derive(Debug, Serialize)]
pub struct QueueStatusResponse {
    pub plugin_id: Uuid,
    pub status: Option<JobStatus>,
}

/// Response listing a plugin's check history, newest first.
#[derive(Debug, Serialize)]
pub struct CheckListResponse {
    pub plugin_id: Uuid,
    pub checks: Vec<Check>,
}
