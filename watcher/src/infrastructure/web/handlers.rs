// Handlers for the job submission and admin endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use std::str::FromStr;

use crate::domain::models::{LogLevel, LogSource, Network, SubmitJobRequest};
use crate::infrastructure::persistence::entities::{job_logs, jobs};
use crate::infrastructure::web::error::{ApiError, ApiResult};
use crate::infrastructure::web::models::{
    ClearAllResponse, DeleteJobResponse, FailedJobEntry, LimitQuery, LogQuery,
    NetworkSnapshotCounts, StatusResponse,
};
use crate::infrastructure::web::routes::AppState;

const DEFAULT_LOG_LIMIT: u64 = 100;
const DEFAULT_FAILED_LIMIT: u64 = 20;

/// Handler for POST /jobs - submit a new watch job
pub async fn submit_job(
    State(state): State<AppState>,
    Json(request): Json<SubmitJobRequest>,
) -> ApiResult<Json<jobs::Model>> {
    let job = state.scheduler.submit(request).await?;
    Ok(Json(job))
}

/// Handler for GET /jobs - list all jobs
pub async fn list_jobs(State(state): State<AppState>) -> ApiResult<Json<Vec<jobs::Model>>> {
    let jobs = state.repositories.jobs.list().await?;
    Ok(Json(jobs))
}

/// Handler for GET /jobs/{id} - fetch a single job
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<jobs::Model>> {
    match state.repositories.jobs.get(&id).await? {
        Some(job) => Ok(Json(job)),
        None => Err(ApiError::NotFound(format!("Job {} not found", id))),
    }
}

/// Handler for GET /jobs/{id}/logs - worker log stream, newest first
pub async fn job_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LogQuery>,
) -> ApiResult<Json<Vec<job_logs::Model>>> {
    require_job(&state, &id).await?;

    let level = parse_level(query.level.as_deref())?;
    let source = match query.source.as_deref() {
        Some(raw) => Some(LogSource::from_str(raw).map_err(ApiError::InvalidRequest)?),
        None => Some(LogSource::Worker),
    };

    let entries = state
        .repositories
        .job_logs
        .for_job(&id, source, level, query.limit.unwrap_or(DEFAULT_LOG_LIMIT))
        .await?;
    Ok(Json(entries))
}

/// Handler for GET /jobs/{id}/service-logs - analyzer log stream
pub async fn job_service_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LogQuery>,
) -> ApiResult<Json<Vec<job_logs::Model>>> {
    require_job(&state, &id).await?;

    let level = parse_level(query.level.as_deref())?;
    let entries = state
        .repositories
        .job_logs
        .for_job(
            &id,
            Some(LogSource::Service),
            level,
            query.limit.unwrap_or(DEFAULT_LOG_LIMIT),
        )
        .await?;
    Ok(Json(entries))
}

/// Handler for GET /jobs/failed - recently failed jobs with their last error
pub async fn failed_jobs(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<Vec<FailedJobEntry>>> {
    let failed = state
        .repositories
        .jobs
        .list_failed(query.limit.unwrap_or(DEFAULT_FAILED_LIMIT))
        .await?;

    let mut entries = Vec::with_capacity(failed.len());
    for job in failed {
        let last_error = state.repositories.job_logs.last_error(&job.id).await?;
        entries.push(FailedJobEntry { job, last_error });
    }

    Ok(Json(entries))
}

/// Handler for DELETE /jobs/{id} - remove queue entries and the record.
/// Handlers already running for this job finish on their own.
pub async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteJobResponse>> {
    require_job(&state, &id).await?;

    let removed_queue_entries = state.scheduler.cancel_queue_entries(&id).await?;
    let deleted_log_entries = state.repositories.job_logs.delete_for_job(&id).await?;
    state.repositories.jobs.delete(&id).await?;

    Ok(Json(DeleteJobResponse {
        id,
        removed_queue_entries,
        deleted_log_entries,
    }))
}

/// Handler for DELETE /jobs/clear-all - obliterate the queue and fail all
/// non-terminal retry jobs
pub async fn clear_all_jobs(State(state): State<AppState>) -> ApiResult<Json<ClearAllResponse>> {
    let failed_jobs = state.scheduler.emergency_clear().await?;
    Ok(Json(ClearAllResponse {
        queue_obliterated: true,
        failed_jobs,
    }))
}

/// Handler for GET /jobs/queue-status - queue counters
pub async fn queue_status(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let counts = state.queue.counts(&state.queue_name).await?;
    Ok(Json(json!(counts)))
}

/// Handler for GET /health
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Handler for GET /status - job, queue and snapshot counters
pub async fn status(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    let queue = state.queue.counts(&state.queue_name).await?;
    let jobs = state.repositories.jobs.count().await?;

    let mut snapshots = Vec::new();
    for network in [Network::Mainnet, Network::Testnet, Network::Devnet] {
        let name = network.as_str();
        snapshots.push(NetworkSnapshotCounts {
            network: name.to_string(),
            wallet_snapshots: state.repositories.wallet_snapshots.count(name).await?,
            token_flow_snapshots: state.repositories.token_flow_snapshots.count(name).await?,
            nft_movement_snapshots: state.repositories.nft_movement_snapshots.count(name).await?,
        });
    }

    Ok(Json(StatusResponse {
        service: "sei-watcher".to_string(),
        jobs,
        queue,
        snapshots,
    }))
}

async fn require_job(state: &AppState, id: &str) -> ApiResult<()> {
    match state.repositories.jobs.get(id).await? {
        Some(_) => Ok(()),
        None => Err(ApiError::NotFound(format!("Job {} not found", id))),
    }
}

fn parse_level(raw: Option<&str>) -> ApiResult<Option<LogLevel>> {
    match raw {
        Some(raw) => LogLevel::from_str(raw)
            .map(Some)
            .map_err(ApiError::InvalidRequest),
        None => Ok(None),
    }
}
