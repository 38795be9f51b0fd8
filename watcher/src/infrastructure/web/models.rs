use serde::{Deserialize, Serialize};

use crate::infrastructure::persistence::entities::{job_logs, jobs};
use crate::infrastructure::queue::QueueCounts;

/// Query parameters for log-stream reads
#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub level: Option<String>,
    pub source: Option<String>,
    pub limit: Option<u64>,
}

/// Query parameter for bounded listings
#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u64>,
}

/// A failed job together with its most recent error log entry
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedJobEntry {
    pub job: jobs::Model,
    pub last_error: Option<job_logs::Model>,
}

/// Response to a job deletion
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteJobResponse {
    pub id: String,
    pub removed_queue_entries: u64,
    pub deleted_log_entries: u64,
}

/// Response to an emergency clear
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearAllResponse {
    pub queue_obliterated: bool,
    pub failed_jobs: u64,
}

/// Snapshot counts for one network
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSnapshotCounts {
    pub network: String,
    pub wallet_snapshots: u64,
    pub token_flow_snapshots: u64,
    pub nft_movement_snapshots: u64,
}

/// Service status response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub service: String,
    pub jobs: u64,
    pub queue: QueueCounts,
    pub snapshots: Vec<NetworkSnapshotCounts>,
}
