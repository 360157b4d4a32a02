use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::db::store::{StoreError, VerificationStore};
use crate::models::check::{
    score_for, status_for_score, CheckOutcome, CheckStatus, CheckType, CONFIGURED_CHECKS,
};
use crate::models::job::{JobOutcome, JobStatus, VerificationJob};
use crate::models::subscription::SubscriptionType;
use crate::services::analyzer::Analyzer;
use crate::services::chunker::Chunker;
use crate::services::merger::merge_chunk_results;
use crate::services::notifier::{CheckCompletedEvent, NotificationFanout};
use crate::services::source::{SourceError, SourceStore};

/// Drives queued verification jobs through the chunk/analyze/merge pipeline
/// and writes job and check state.
///
/// One instance per process; invoked per batch by the worker loop or the
/// admin endpoint, never from a background task of its own.
pub struct VerificationProcessor {
    store: Arc<dyn VerificationStore>,
    sources: Arc<dyn SourceStore>,
    analyzer: Analyzer,
    chunker: Chunker,
    fanout: Option<NotificationFanout>,
}

impl VerificationProcessor {
    pub fn new(
        store: Arc<dyn VerificationStore>,
        sources: Arc<dyn SourceStore>,
        analyzer: Analyzer,
        chunker: Chunker,
        fanout: Option<NotificationFanout>,
    ) -> Self {
        Self {
            store,
            sources,
            analyzer,
            chunker,
            fanout,
        }
    }

    /// Process one batch of queued jobs: claim up to `limit` jobs by
    /// priority desc / age asc and run each to a terminal state. Returns an
    /// outcome per job claimed in this pass.
    pub async fn process_batch(&self, limit: i64) -> Result<Vec<JobOutcome>, StoreError> {
        let jobs = self.store.queued_jobs(limit).await?;
        let mut outcomes = Vec::with_capacity(jobs.len());

        for job in jobs {
            match self.store.claim_job(job.id).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(job_id = %job.id, "job no longer queued, skipping");
                    continue;
                }
                Err(e) => {
                    // A failed claim drops this job from the batch, not the pass.
                    tracing::warn!(job_id = %job.id, error = %e, "claim failed, skipping job");
                    continue;
                }
            }
            outcomes.push(self.process_job(&job).await);
        }

        Ok(outcomes)
    }

    async fn process_job(&self, job: &VerificationJob) -> JobOutcome {
        tracing::info!(
            job_id = %job.id,
            plugin_id = %job.plugin_id,
            priority = job.priority,
            "processing verification job"
        );
        let started = Instant::now();

        match self.run_job(job).await {
            Ok(events) => {
                metrics::counter!("verification_jobs_completed").increment(1);
                metrics::histogram!("verification_processing_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(
                    job_id = %job.id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    checks = events.len(),
                    "verification job completed"
                );

                self.notify_subscribers(job.plugin_id, &events).await;

                JobOutcome {
                    job_id: job.id,
                    plugin_id: job.plugin_id,
                    status: JobStatus::Completed,
                    error: None,
                }
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(job_id = %job.id, error = %message, "verification job failed");
                metrics::counter!("verification_jobs_failed").increment(1);

                if let Err(store_err) = self.store.fail_job(job.id, &message).await {
                    tracing::error!(
                        job_id = %job.id,
                        error = %store_err,
                        "failed to record job failure"
                    );
                }

                JobOutcome {
                    job_id: job.id,
                    plugin_id: job.plugin_id,
                    status: JobStatus::Failed,
                    error: Some(message),
                }
            }
        }
    }

    /// Orchestration whose errors escalate to job failure: resolving the
    /// source text and recording job completion. Everything inside one
    /// check type stays contained in `run_check`.
    async fn run_job(&self, job: &VerificationJob) -> Result<Vec<CheckCompletedEvent>, JobError> {
        let source = self
            .sources
            .fetch(job.plugin_id, None)
            .await
            .map_err(|e| JobError::SourceUnavailable {
                plugin_id: job.plugin_id,
                source: e,
            })?;

        let mut events = Vec::with_capacity(CONFIGURED_CHECKS.len());
        for check_type in CONFIGURED_CHECKS {
            // Fault isolation: a failure here degrades this check type to
            // its error state and the loop moves on to the next one.
            match self.run_check(job, check_type, &source).await {
                Ok(event) => events.push(event),
                Err(e) => {
                    tracing::warn!(
                        job_id = %job.id,
                        check_type = %check_type,
                        error = %e,
                        "check degraded to error state"
                    );
                    metrics::counter!("verification_checks_errored").increment(1);
                    events.push(CheckCompletedEvent {
                        plugin_id: job.plugin_id,
                        check_type,
                        status: CheckStatus::Error,
                        classification: None,
                    });
                }
            }
        }

        self.store.complete_job(job.id).await?;
        Ok(events)
    }

    async fn run_check(
        &self,
        job: &VerificationJob,
        check_type: CheckType,
        source: &str,
    ) -> Result<CheckCompletedEvent, CheckError> {
        let check_id = self
            .store
            .insert_running_check(job.plugin_id, check_type)
            .await?;
        let started = Instant::now();

        match self
            .execute_check(job.plugin_id, check_type, source, check_id, started)
            .await
        {
            Ok(event) => Ok(event),
            Err(e) => {
                // The row must not stay in the running state.
                let elapsed = started.elapsed().as_millis() as i64;
                if let Err(store_err) = self
                    .store
                    .mark_check_error(check_id, &e.to_string(), elapsed)
                    .await
                {
                    tracing::error!(
                        check_id = %check_id,
                        error = %store_err,
                        "failed to record check error state"
                    );
                }
                Err(e)
            }
        }
    }

    async fn execute_check(
        &self,
        plugin_id: Uuid,
        check_type: CheckType,
        source: &str,
        check_id: Uuid,
        started: Instant,
    ) -> Result<CheckCompletedEvent, CheckError> {
        let chunks = self.chunker.split(source);
        let total = chunks.len();
        tracing::debug!(
            plugin_id = %plugin_id,
            check_type = %check_type,
            chunks = total,
            source_bytes = source.len(),
            "analyzing source"
        );

        let plugin_name = plugin_id.to_string();
        let mut results = Vec::with_capacity(total);
        for (index, chunk) in chunks.iter().enumerate() {
            let result = self
                .analyzer
                .analyze_chunk(&plugin_name, check_type, chunk, index + 1, total)
                .await;
            results.push(result);
        }

        let merged = merge_chunk_results(results);
        let score = score_for(&merged);
        let status = status_for_score(score);
        let classification = merged.classification;
        let execution_time_ms = started.elapsed().as_millis() as i64;

        let outcome = CheckOutcome {
            status,
            score,
            classification,
            details: serde_json::to_value(&merged)?,
            execution_time_ms,
        };
        self.store.finish_check(check_id, &outcome).await?;

        tracing::info!(
            plugin_id = %plugin_id,
            check_type = %check_type,
            status = %status,
            score,
            classification = %classification,
            execution_time_ms,
            "check finished"
        );

        Ok(CheckCompletedEvent {
            plugin_id,
            check_type,
            status,
            classification: Some(classification),
        })
    }

    /// Peripheral: deliver completion events to active security-alert
    /// subscribers. Failures are logged, never escalated.
    async fn notify_subscribers(&self, plugin_id: Uuid, events: &[CheckCompletedEvent]) {
        let Some(fanout) = &self.fanout else {
            return;
        };

        match self
            .store
            .active_subscriptions(plugin_id, SubscriptionType::SecurityAlerts)
            .await
        {
            Ok(subscribers) if !subscribers.is_empty() => {
                fanout.broadcast(&subscribers, events).await;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    plugin_id = %plugin_id,
                    error = %e,
                    "could not load subscriptions, skipping notifications"
                );
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum JobError {
    #[error("could not resolve source text for plugin {plugin_id}: {source}")]
    SourceUnavailable {
        plugin_id: Uuid,
        #[source]
        source: SourceError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
enum CheckError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to encode check details: {0}")]
    Encode(#[from] serde_json::Error),
}
