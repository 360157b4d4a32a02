use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use serde::Deserialize;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::store::VerificationStore;
use crate::models::verification::{
    CheckListResponse, EnqueueRequest, EnqueueResponse, ProcessBatchResponse, QueueStatusResponse,
};

/// POST /api/v1/plugins/{plugin_id}/verify — enqueue a verification run.
///
/// Authorization happens in the gateway in front of this service; requests
/// arriving here are already allowed to trigger a run.
pub async fn enqueue_verification(
    State(state): State<AppState>,
    Path(plugin_id): Path<Uuid>,
    Json(request): Json<EnqueueRequest>,
) -> Result<Json<EnqueueResponse>, StatusCode> {
    request
        .validate()
        .map_err(|_| StatusCode::UNPROCESSABLE_ENTITY)?;

    let job = state
        .store
        .enqueue_job(plugin_id, request.priority)
        .await
        .map_err(|e| {
            tracing::error!(plugin_id = %plugin_id, error = %e, "failed to enqueue job");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    metrics::counter!("verification_jobs_total").increment(1);
    tracing::info!(
        job_id = %job.id,
        plugin_id = %plugin_id,
        priority = job.priority,
        "verification job enqueued"
    );

    Ok(Json(EnqueueResponse {
        job_id: job.id,
        status: job.status.to_string(),
        message: "Plugin queued for verification".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ProcessBatchParams {
    pub limit: Option<i64>,
}

/// POST /api/v1/queue/process — run one batch-processing pass.
///
/// The external trigger for the poll-driven scheduler: cron, an admin
/// action, or the worker binary.
pub async fn process_batch(
    State(state): State<AppState>,
    Query(params): Query<ProcessBatchParams>,
) -> Result<Json<ProcessBatchResponse>, StatusCode> {
    let limit = params.limit.unwrap_or(10).clamp(1, 100);

    let outcomes = state.processor.process_batch(limit).await.map_err(|e| {
        tracing::error!(error = %e, "batch processing pass failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(ProcessBatchResponse {
        processed: outcomes.len(),
        outcomes,
    }))
}

/// GET /api/v1/plugins/{plugin_id}/checks — check history, newest first
/// within each check type.
pub async fn get_checks(
    State(state): State<AppState>,
    Path(plugin_id): Path<Uuid>,
) -> Result<Json<CheckListResponse>, StatusCode> {
    let checks = state
        .store
        .checks_for_plugin(plugin_id)
        .await
        .map_err(|e| {
            tracing::error!(plugin_id = %plugin_id, error = %e, "failed to load checks");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(CheckListResponse { plugin_id, checks }))
}

/// GET /api/v1/plugins/{plugin_id}/queue — the plugin's newest job state,
/// or none when nothing was ever enqueued.
pub async fn get_queue_status(
    State(state): State<AppState>,
    Path(plugin_id): Path<Uuid>,
) -> Result<Json<QueueStatusResponse>, StatusCode> {
    let status = state
        .store
        .latest_job_status(plugin_id)
        .await
        .map_err(|e| {
            tracing::error!(plugin_id = %plugin_id, error = %e, "failed to load queue status");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(QueueStatusResponse { plugin_id, status }))
}
