use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Retries recorded before a job is considered dead; re-running after that
/// is an explicit external action that creates a new job.
pub const DEFAULT_MAX_RETRIES: i32 = 3;

/// Status of a verification job in the persisted queue.
///
/// Only advances queued -> processing -> {completed, failed}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

/// One scheduled run of the verification pipeline for a plugin.
///
/// Rows are append-only: the processor mutates status fields but nothing
/// ever deletes or re-creates a row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationJob {
    pub id: Uuid,
    pub plugin_id: Uuid,
    pub priority: i32,
    pub status: JobStatus,
    pub retry_count: i32,
    pub max_retries: i32,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-job result of one batch-processing pass.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub job_id: Uuid,
    pub plugin_id: Uuid,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
