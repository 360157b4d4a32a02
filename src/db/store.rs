use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::analysis::Classification;
use crate::models::check::{Check, CheckOutcome, CheckStatus, CheckType};
use crate::models::job::{JobStatus, VerificationJob, DEFAULT_MAX_RETRIES};
use crate::models::subscription::{Subscription, SubscriptionType};

/// Persistence surface of the verification pipeline: the job queue, check
/// rows, and subscription reads. The processor only ever talks to this
/// trait; `PgStore` is the production implementation.
#[async_trait]
pub trait VerificationStore: Send + Sync {
    /// Append a new queued job. Re-running a verification always creates a
    /// new row; history is never overwritten.
    async fn enqueue_job(
        &self,
        plugin_id: Uuid,
        priority: i32,
    ) -> Result<VerificationJob, StoreError>;

    /// Queued jobs ordered by priority desc, then age asc.
    async fn queued_jobs(&self, limit: i64) -> Result<Vec<VerificationJob>, StoreError>;

    /// Atomically claim one queued job for processing. Returns false when
    /// the job was no longer in the queued state (claimed elsewhere).
    async fn claim_job(&self, job_id: Uuid) -> Result<bool, StoreError>;

    async fn complete_job(&self, job_id: Uuid) -> Result<(), StoreError>;

    /// Terminal failure: records the message and increments retry_count.
    async fn fail_job(&self, job_id: Uuid, error: &str) -> Result<(), StoreError>;

    /// Insert a check row in the running state, returning its id.
    async fn insert_running_check(
        &self,
        plugin_id: Uuid,
        check_type: CheckType,
    ) -> Result<Uuid, StoreError>;

    /// Move a running check to its terminal passed/failed state.
    async fn finish_check(&self, check_id: Uuid, outcome: &CheckOutcome)
        -> Result<(), StoreError>;

    /// Move a running check to the error state.
    async fn mark_check_error(
        &self,
        check_id: Uuid,
        error: &str,
        execution_time_ms: i64,
    ) -> Result<(), StoreError>;

    /// All checks for a plugin, newest first within each check type.
    async fn checks_for_plugin(&self, plugin_id: Uuid) -> Result<Vec<Check>, StoreError>;

    /// Status of the plugin's most recent job, if any.
    async fn latest_job_status(&self, plugin_id: Uuid) -> Result<Option<JobStatus>, StoreError>;

    async fn active_subscriptions(
        &self,
        plugin_id: Uuid,
        subscription_type: SubscriptionType,
    ) -> Result<Vec<Subscription>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// PostgreSQL-backed store.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const JOB_COLUMNS: &str = "id, plugin_id, priority, status, retry_count, max_retries, \
                           scheduled_at, started_at, completed_at, error, created_at";

const CHECK_COLUMNS: &str = "id, plugin_id, check_type, status, score, classification, \
                             details, error, execution_time_ms, created_at, completed_at";

fn map_job(row: &PgRow) -> Result<VerificationJob, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(VerificationJob {
        id: row.try_get("id")?,
        plugin_id: row.try_get("plugin_id")?,
        priority: row.try_get("priority")?,
        status: status.parse().unwrap_or(JobStatus::Queued),
        retry_count: row.try_get("retry_count")?,
        max_retries: row.try_get("max_retries")?,
        scheduled_at: row.try_get("scheduled_at")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        error: row.try_get("error")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_check(row: &PgRow) -> Result<Check, sqlx::Error> {
    let check_type: String = row.try_get("check_type")?;
    let status: String = row.try_get("status")?;
    let classification: Option<String> = row.try_get("classification")?;
    Ok(Check {
        id: row.try_get("id")?,
        plugin_id: row.try_get("plugin_id")?,
        check_type: check_type.parse().unwrap_or(CheckType::Security),
        status: status.parse().unwrap_or(CheckStatus::Pending),
        score: row.try_get("score")?,
        classification: classification.and_then(|c| c.parse::<Classification>().ok()),
        details: row.try_get("details")?,
        error: row.try_get("error")?,
        execution_time_ms: row.try_get("execution_time_ms")?,
        created_at: row.try_get("created_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

#[async_trait]
impl VerificationStore for PgStore {
    async fn enqueue_job(
        &self,
        plugin_id: Uuid,
        priority: i32,
    ) -> Result<VerificationJob, StoreError> {
        let sql = format!(
            "INSERT INTO verification_jobs (plugin_id, priority, status, max_retries) \
             VALUES ($1, $2, 'queued', $3) \
             RETURNING {JOB_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(plugin_id)
            .bind(priority)
            .bind(DEFAULT_MAX_RETRIES)
            .fetch_one(&self.pool)
            .await?;
        Ok(map_job(&row)?)
    }

    async fn queued_jobs(&self, limit: i64) -> Result<Vec<VerificationJob>, StoreError> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM verification_jobs \
             WHERE status = 'queued' \
             ORDER BY priority DESC, created_at ASC \
             LIMIT $1"
        );
        let rows = sqlx::query(&sql).bind(limit).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| map_job(row).map_err(StoreError::Database))
            .collect()
    }

    async fn claim_job(&self, job_id: Uuid) -> Result<bool, StoreError> {
        // Conditional update so two processors can never claim the same job.
        let result = sqlx::query(
            "UPDATE verification_jobs \
             SET status = 'processing', started_at = NOW() \
             WHERE id = $1 AND status = 'queued'",
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn complete_job(&self, job_id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE verification_jobs \
             SET status = 'completed', completed_at = NOW() \
             WHERE id = $1",
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fail_job(&self, job_id: Uuid, error: &str) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE verification_jobs \
             SET status = 'failed', error = $2, completed_at = NOW(), \
                 retry_count = retry_count + 1 \
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_running_check(
        &self,
        plugin_id: Uuid,
        check_type: CheckType,
    ) -> Result<Uuid, StoreError> {
        let row = sqlx::query(
            "INSERT INTO plugin_checks (plugin_id, check_type, status) \
             VALUES ($1, $2, 'running') \
             RETURNING id",
        )
        .bind(plugin_id)
        .bind(check_type.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("id").map_err(StoreError::Database)?)
    }

    async fn finish_check(
        &self,
        check_id: Uuid,
        outcome: &CheckOutcome,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE plugin_checks \
             SET status = $2, score = $3, classification = $4, details = $5, \
                 execution_time_ms = $6, completed_at = NOW() \
             WHERE id = $1",
        )
        .bind(check_id)
        .bind(outcome.status.to_string())
        .bind(outcome.score)
        .bind(outcome.classification.to_string())
        .bind(&outcome.details)
        .bind(outcome.execution_time_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_check_error(
        &self,
        check_id: Uuid,
        error: &str,
        execution_time_ms: i64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE plugin_checks \
             SET status = 'error', error = $2, execution_time_ms = $3, completed_at = NOW() \
             WHERE id = $1",
        )
        .bind(check_id)
        .bind(error)
        .bind(execution_time_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn checks_for_plugin(&self, plugin_id: Uuid) -> Result<Vec<Check>, StoreError> {
        let sql = format!(
            "SELECT {CHECK_COLUMNS} FROM plugin_checks \
             WHERE plugin_id = $1 \
             ORDER BY check_type ASC, created_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(plugin_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| map_check(row).map_err(StoreError::Database))
            .collect()
    }

    async fn latest_job_status(&self, plugin_id: Uuid) -> Result<Option<JobStatus>, StoreError> {
        let row = sqlx::query(
            "SELECT status FROM verification_jobs \
             WHERE plugin_id = $1 \
             ORDER BY created_at DESC \
             LIMIT 1",
        )
        .bind(plugin_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => {
                let status: String = row.try_get("status").map_err(StoreError::Database)?;
                Some(status.parse().unwrap_or(JobStatus::Queued))
            }
            None => None,
        })
    }

    async fn active_subscriptions(
        &self,
        plugin_id: Uuid,
        subscription_type: SubscriptionType,
    ) -> Result<Vec<Subscription>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, plugin_id, subscription_type, is_active \
             FROM plugin_subscriptions \
             WHERE plugin_id = $1 AND subscription_type = $2 AND is_active = TRUE",
        )
        .bind(plugin_id)
        .bind(subscription_type.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let sub_type: String = row.try_get("subscription_type")?;
                Ok(Subscription {
                    id: row.try_get("id")?,
                    user_id: row.try_get("user_id")?,
                    plugin_id: row.try_get("plugin_id")?,
                    subscription_type: sub_type.parse().unwrap_or(SubscriptionType::Updates),
                    is_active: row.try_get("is_active")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(StoreError::Database)
    }
}
