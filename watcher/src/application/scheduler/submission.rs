//! Job submission: validate the request, create the durable record, enrol
//! it in the delay queue. A job record only survives if its queue
//! enrolment succeeded.

use log::{error, info, warn};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::SchedulerError;
use crate::domain::models::{
    JobAction, JobType, Network, NftMovementJobPayload, SubmitJobRequest, TokenFlowJobPayload,
    WalletJobPayload,
};
use crate::domain::services::analysis::validate_entity_address;
use crate::infrastructure::persistence::entities::jobs;
use crate::infrastructure::persistence::repositories::job_repository::NewJob;
use crate::infrastructure::persistence::Repositories;
use crate::infrastructure::queue::{DelayQueue, QueueError, SubmitOpts};

/// Accepts job submissions and enrols them for execution
pub struct JobScheduler {
    repositories: Arc<Repositories>,
    queue: DelayQueue,
    queue_name: String,
}

impl JobScheduler {
    pub fn new(repositories: Arc<Repositories>, queue: DelayQueue, queue_name: &str) -> Self {
        Self {
            repositories,
            queue,
            queue_name: queue_name.to_string(),
        }
    }

    /// Validate a submission, persist the job and enrol it in the queue.
    pub async fn submit(&self, request: SubmitJobRequest) -> Result<jobs::Model, SchedulerError> {
        let (action, network, job_type) = validate_request(&request)?;

        let job = self
            .repositories
            .jobs
            .create(NewJob {
                id: Uuid::new_v4().to_string(),
                action: action.as_str().to_string(),
                payload: request.payload,
                network,
                job_type,
                scheduled_at: request.scheduled_at,
                interval_minutes: request.interval_minutes,
            })
            .await?;

        if let Err(e) = self.enrol(&job, job_type).await {
            // No job record without a live queue entry; roll the row back
            // and surface the broker failure to the submitter.
            if let Err(cleanup) = self.repositories.jobs.delete(&job.id).await {
                error!(
                    "[SCHEDULER] Could not remove job {} after enrol failure: {}",
                    job.id, cleanup
                );
            }
            return Err(e.into());
        }

        info!(
            "[SCHEDULER] Enrolled {} job {} ({})",
            job.job_type, job.id, job.action
        );

        Ok(job)
    }

    async fn enrol(&self, job: &jobs::Model, job_type: JobType) -> Result<(), QueueError> {
        let payload = json!({ "jobId": job.id });

        match job_type {
            JobType::Scheduled => {
                let delay_ms = job
                    .scheduled_at
                    .map(|at| {
                        (at.with_timezone(&chrono::Utc) - chrono::Utc::now())
                            .num_milliseconds()
                            .max(0) as u64
                    })
                    .unwrap_or(0);

                self.queue
                    .submit(
                        &self.queue_name,
                        payload,
                        SubmitOpts {
                            delay_ms: Some(delay_ms),
                            ..Default::default()
                        },
                    )
                    .await
            }
            JobType::Retry => {
                let interval_ms = job.interval_minutes.unwrap_or(1).max(1) as u64 * 60_000;

                // First run immediately, then on the repeat schedule
                self.queue
                    .submit(&self.queue_name, payload.clone(), SubmitOpts::default())
                    .await?;
                self.queue
                    .submit(
                        &self.queue_name,
                        payload,
                        SubmitOpts {
                            delay_ms: Some(interval_ms),
                            repeat_every_ms: Some(interval_ms),
                            repeat_key: Some(job.id.clone()),
                        },
                    )
                    .await
            }
        }
    }

    /// Remove a job's queue entries. Active handlers run to completion.
    pub async fn cancel_queue_entries(&self, job_id: &str) -> Result<u64, QueueError> {
        self.queue.remove_by_job(&self.queue_name, job_id).await
    }

    /// Obliterate the queue and fail every non-terminal retry job.
    /// Returns the number of jobs marked failed.
    pub async fn emergency_clear(&self) -> Result<u64, SchedulerError> {
        self.queue.obliterate(&self.queue_name).await?;
        let failed = self
            .repositories
            .jobs
            .mark_non_terminal_retry_failed("Job stopped by emergency clear")
            .await?;
        warn!(
            "[SCHEDULER] Emergency clear: queue obliterated, {} job(s) failed",
            failed
        );
        Ok(failed)
    }
}

/// Reject a submission before any side effect: unknown action or network,
/// wrong schedule fields for the job type, malformed payload entity.
fn validate_request(
    request: &SubmitJobRequest,
) -> Result<(JobAction, Network, JobType), SchedulerError> {
    let action = JobAction::from_str(&request.action).map_err(SchedulerError::ValidationError)?;

    let network = match &request.network {
        Some(raw) => Network::from_str(raw).map_err(SchedulerError::ValidationError)?,
        None => Network::default(),
    };

    let job_type = JobType::from_str(&request.job_type).map_err(SchedulerError::ValidationError)?;

    match job_type {
        JobType::Scheduled => {
            if request.scheduled_at.is_none() {
                return Err(SchedulerError::ValidationError(
                    "scheduled jobs require scheduledAt".to_string(),
                ));
            }
        }
        JobType::Retry => match request.interval_minutes {
            Some(minutes) if minutes > 0 => {}
            _ => {
                return Err(SchedulerError::ValidationError(
                    "retry jobs require a positive intervalMinutes".to_string(),
                ));
            }
        },
    }

    validate_payload(action, &request.payload)?;

    Ok((action, network, job_type))
}

/// Check that the payload carries a well-formed entity for the action.
fn validate_payload(action: JobAction, payload: &serde_json::Value) -> Result<(), SchedulerError> {
    let entity = match action {
        JobAction::WalletSnapshot => {
            let parsed: WalletJobPayload = serde_json::from_value(payload.clone())
                .map_err(|e| SchedulerError::ValidationError(format!("invalid payload: {}", e)))?;
            parsed.wallet
        }
        JobAction::AnalyzeCoinFlows => {
            let parsed: TokenFlowJobPayload = serde_json::from_value(payload.clone())
                .map_err(|e| SchedulerError::ValidationError(format!("invalid payload: {}", e)))?;
            parsed.token_address
        }
        JobAction::AnalyzeNftMovements => {
            let parsed: NftMovementJobPayload = serde_json::from_value(payload.clone())
                .map_err(|e| SchedulerError::ValidationError(format!("invalid payload: {}", e)))?;
            parsed.collection_address
        }
    };

    validate_entity_address(&entity)
        .map(|_| ())
        .map_err(|e| SchedulerError::ValidationError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(body: serde_json::Value) -> SubmitJobRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_scheduled_requires_scheduled_at() {
        let missing = request(json!({
            "action": "wallet_snapshot",
            "type": "scheduled",
            "payload": {"wallet": "0x1111111111111111111111111111111111111111"}
        }));
        let err = validate_request(&missing).unwrap_err();
        assert!(err.to_string().contains("scheduledAt"));

        let with_time = request(json!({
            "action": "wallet_snapshot",
            "type": "scheduled",
            "scheduledAt": "2026-08-02T12:00:00Z",
            "payload": {"wallet": "0x1111111111111111111111111111111111111111"}
        }));
        let (action, network, job_type) = validate_request(&with_time).unwrap();
        assert_eq!(action, JobAction::WalletSnapshot);
        assert_eq!(network, Network::Testnet);
        assert_eq!(job_type, JobType::Scheduled);
    }

    #[test]
    fn test_retry_requires_positive_interval() {
        for interval in [json!(null), json!(0), json!(-5)] {
            let bad = request(json!({
                "action": "analyze_coin_flows",
                "type": "retry",
                "intervalMinutes": interval,
                "payload": {"tokenAddress": "0x2222222222222222222222222222222222222222"}
            }));
            assert!(validate_request(&bad).is_err(), "interval {} accepted", interval);
        }

        let ok = request(json!({
            "action": "analyze_coin_flows",
            "type": "retry",
            "intervalMinutes": 1,
            "payload": {"tokenAddress": "0x2222222222222222222222222222222222222222"}
        }));
        assert!(validate_request(&ok).is_ok());
    }

    #[test]
    fn test_unknown_action_and_network_rejected() {
        let bad_action = request(json!({
            "action": "mine_blocks",
            "type": "retry",
            "intervalMinutes": 5,
            "payload": {}
        }));
        assert!(validate_request(&bad_action).is_err());

        let bad_network = request(json!({
            "action": "wallet_snapshot",
            "type": "scheduled",
            "scheduledAt": "2026-08-02T12:00:00Z",
            "network": "sepolia",
            "payload": {"wallet": "0x1111111111111111111111111111111111111111"}
        }));
        assert!(validate_request(&bad_network).is_err());
    }

    #[test]
    fn test_network_defaults_to_testnet() {
        let req = request(json!({
            "action": "analyze_nft_movements",
            "type": "retry",
            "intervalMinutes": 10,
            "payload": {"collectionAddress": "0x3333333333333333333333333333333333333333"}
        }));
        let (_, network, _) = validate_request(&req).unwrap();
        assert_eq!(network, Network::Testnet);
    }

    #[test]
    fn test_payload_validation_by_action() {
        let ok = json!({"wallet": "0x1111111111111111111111111111111111111111"});
        assert!(validate_payload(JobAction::WalletSnapshot, &ok).is_ok());

        let bad_address = json!({"wallet": "0x123"});
        let err = validate_payload(JobAction::WalletSnapshot, &bad_address).unwrap_err();
        assert!(err.to_string().contains("INVALID_ADDRESS_FORMAT"));

        let missing_field = json!({"wallet": "0x1111111111111111111111111111111111111111"});
        assert!(validate_payload(JobAction::AnalyzeCoinFlows, &missing_field).is_err());

        let token_ok = json!({
            "tokenAddress": "0x2222222222222222222222222222222222222222",
            "thresholds": {"largeTransfer": "10000"}
        });
        assert!(validate_payload(JobAction::AnalyzeCoinFlows, &token_ok).is_ok());
    }
}
