//! Test doubles for exercising the verification pipeline without external
//! services: an in-memory store, a scripted chat model, and a map-backed
//! source store.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use plugin_verify::db::store::{StoreError, VerificationStore};
use plugin_verify::models::check::{Check, CheckOutcome, CheckStatus, CheckType};
use plugin_verify::models::job::{JobStatus, VerificationJob, DEFAULT_MAX_RETRIES};
use plugin_verify::models::subscription::{Subscription, SubscriptionType};
use plugin_verify::services::llm::{ChatModel, LlmError};
use plugin_verify::services::notifier::{CheckCompletedEvent, NotificationSink, NotifyError};
use plugin_verify::services::source::{SourceError, SourceStore};

pub const SAFE_RESPONSE: &str =
    r#"{"status":"safe","classification":"safe","shortDescription":"ok","issues":[]}"#;

pub const UNSAFE_RESPONSE: &str = r#"{"status":"warning","classification":"unsafe","shortDescription":"Raw network call bypassing the gateway.","issues":[{"type":"raw_network","severity":"high","description":"Direct socket connection to a hardcoded address.","recommendation":"Route the request through api.http.request."}]}"#;

/// In-memory [`VerificationStore`] with optional injected infrastructure
/// failures.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    jobs: Vec<VerificationJob>,
    checks: Vec<Check>,
    subscriptions: Vec<Subscription>,
    fail_finish_check: HashSet<CheckType>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `finish_check` fail for the given check type, simulating an
    /// infrastructure error escaping the per-check pipeline.
    pub fn fail_finish_check_for(&self, check_type: CheckType) {
        self.state
            .lock()
            .unwrap()
            .fail_finish_check
            .insert(check_type);
    }

    pub fn add_subscription(&self, user_id: Uuid, plugin_id: Uuid) {
        self.state.lock().unwrap().subscriptions.push(Subscription {
            id: Uuid::new_v4(),
            user_id,
            plugin_id,
            subscription_type: SubscriptionType::SecurityAlerts,
            is_active: true,
        });
    }

    pub fn jobs(&self) -> Vec<VerificationJob> {
        self.state.lock().unwrap().jobs.clone()
    }

    pub fn checks(&self) -> Vec<Check> {
        self.state.lock().unwrap().checks.clone()
    }
}

#[async_trait]
impl VerificationStore for MemoryStore {
    async fn enqueue_job(
        &self,
        plugin_id: Uuid,
        priority: i32,
    ) -> Result<VerificationJob, StoreError> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        let job = VerificationJob {
            id: Uuid::new_v4(),
            plugin_id,
            priority,
            status: JobStatus::Queued,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            scheduled_at: now,
            started_at: None,
            completed_at: None,
            error: None,
            created_at: now,
        };
        state.jobs.push(job.clone());
        Ok(job)
    }

    async fn queued_jobs(&self, limit: i64) -> Result<Vec<VerificationJob>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut queued: Vec<_> = state
            .jobs
            .iter()
            .filter(|job| job.status == JobStatus::Queued)
            .cloned()
            .collect();
        // Stable sort: equal priorities keep insertion (creation) order.
        queued.sort_by_key(|job| std::cmp::Reverse(job.priority));
        queued.truncate(limit as usize);
        Ok(queued)
    }

    async fn claim_job(&self, job_id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.lock().unwrap();
        match state
            .jobs
            .iter_mut()
            .find(|job| job.id == job_id && job.status == JobStatus::Queued)
        {
            Some(job) => {
                job.status = JobStatus::Processing;
                job.started_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn complete_job(&self, job_id: Uuid) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(job) = state.jobs.iter_mut().find(|job| job.id == job_id) {
            job.status = JobStatus::Completed;
            job.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn fail_job(&self, job_id: Uuid, error: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(job) = state.jobs.iter_mut().find(|job| job.id == job_id) {
            job.status = JobStatus::Failed;
            job.error = Some(error.to_string());
            job.completed_at = Some(Utc::now());
            job.retry_count += 1;
        }
        Ok(())
    }

    async fn insert_running_check(
        &self,
        plugin_id: Uuid,
        check_type: CheckType,
    ) -> Result<Uuid, StoreError> {
        let mut state = self.state.lock().unwrap();
        let id = Uuid::new_v4();
        state.checks.push(Check {
            id,
            plugin_id,
            check_type,
            status: CheckStatus::Running,
            score: None,
            classification: None,
            details: None,
            error: None,
            execution_time_ms: None,
            created_at: Utc::now(),
            completed_at: None,
        });
        Ok(id)
    }

    async fn finish_check(
        &self,
        check_id: Uuid,
        outcome: &CheckOutcome,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let check_type = state
            .checks
            .iter()
            .find(|check| check.id == check_id)
            .map(|check| check.check_type);
        if let Some(check_type) = check_type {
            if state.fail_finish_check.contains(&check_type) {
                return Err(StoreError::Unavailable(
                    "injected finish_check failure".to_string(),
                ));
            }
        }
        if let Some(check) = state.checks.iter_mut().find(|check| check.id == check_id) {
            check.status = outcome.status;
            check.score = Some(outcome.score);
            check.classification = Some(outcome.classification);
            check.details = Some(outcome.details.clone());
            check.execution_time_ms = Some(outcome.execution_time_ms);
            check.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn mark_check_error(
        &self,
        check_id: Uuid,
        error: &str,
        execution_time_ms: i64,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(check) = state.checks.iter_mut().find(|check| check.id == check_id) {
            check.status = CheckStatus::Error;
            check.error = Some(error.to_string());
            check.execution_time_ms = Some(execution_time_ms);
            check.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn checks_for_plugin(&self, plugin_id: Uuid) -> Result<Vec<Check>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .checks
            .iter()
            .filter(|check| check.plugin_id == plugin_id)
            .cloned()
            .collect())
    }

    async fn latest_job_status(&self, plugin_id: Uuid) -> Result<Option<JobStatus>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .jobs
            .iter()
            .filter(|job| job.plugin_id == plugin_id)
            .next_back()
            .map(|job| job.status))
    }

    async fn active_subscriptions(
        &self,
        plugin_id: Uuid,
        subscription_type: SubscriptionType,
    ) -> Result<Vec<Subscription>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .subscriptions
            .iter()
            .filter(|sub| {
                sub.plugin_id == plugin_id
                    && sub.subscription_type == subscription_type
                    && sub.is_active
            })
            .cloned()
            .collect())
    }
}

/// Chat model replaying a script of responses, then a default.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<String>>,
    default: String,
}

impl ScriptedModel {
    pub fn always(response: &str) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            default: response.to_string(),
        }
    }

    pub fn with_script(responses: Vec<String>, default: &str) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            default: default.to_string(),
        }
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
        let next = self.responses.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.default.clone()))
    }
}

/// Sink recording every delivered event.
#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<(Uuid, CheckCompletedEvent)>>,
}

impl RecordingSink {
    pub fn delivered(&self) -> Vec<(Uuid, CheckCompletedEvent)> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(
        &self,
        user_id: Uuid,
        event: &CheckCompletedEvent,
    ) -> Result<(), NotifyError> {
        self.delivered.lock().unwrap().push((user_id, event.clone()));
        Ok(())
    }
}

/// Source store backed by a plain map; fetch misses report the object key
/// the way the real store would.
#[derive(Default)]
pub struct MapSourceStore {
    sources: Mutex<HashMap<Uuid, String>>,
}

impl MapSourceStore {
    pub fn insert(&self, plugin_id: Uuid, text: String) {
        self.sources.lock().unwrap().insert(plugin_id, text);
    }
}

#[async_trait]
impl SourceStore for MapSourceStore {
    async fn fetch(&self, plugin_id: Uuid, version: Option<&str>) -> Result<String, SourceError> {
        self.sources
            .lock()
            .unwrap()
            .get(&plugin_id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound {
                key: format!("plugins/{}/{}.src", plugin_id, version.unwrap_or("current")),
            })
    }
}
