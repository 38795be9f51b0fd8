//! Job execution: the dispatch loop that drains the delay queue and the
//! per-job handler that runs the analyzers and maintains the job record.
//!
//! The queue guarantees an item reaches one handler only; concurrency
//! across distinct items is bounded by the worker configuration. Handlers
//! in flight are drained, not aborted, on shutdown.

use chrono::{Duration as ChronoDuration, Utc};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::config::AppConfig;
use crate::domain::errors::WorkerError;
use crate::domain::models::{
    ErrorDetails, JobStatus, JobType, LogSource, Network, NewLogEntry, NftMovementJobPayload,
    TokenFlowJobPayload, WalletJobPayload,
};
use crate::domain::services::{
    NftMovementAnalyzer, ServiceLogSink, TokenFlowAnalyzer, WalletAnalyzer,
};
use crate::infrastructure::feed::FeedClient;
use crate::infrastructure::persistence::entities::jobs;
use crate::infrastructure::persistence::repositories::JobPatch;
use crate::infrastructure::persistence::Repositories;
use crate::infrastructure::queue::{DelayQueue, QueueItem};

/// A scheduled job firing this much before its time declines to run
const EARLY_FIRE_TOLERANCE_SECS: i64 = 5;

/// Executes jobs popped from the delay queue
#[derive(Clone)]
pub struct JobWorker {
    repositories: Arc<Repositories>,
    queue: DelayQueue,
    wallet_analyzer: Arc<WalletAnalyzer>,
    token_flow_analyzer: Arc<TokenFlowAnalyzer>,
    nft_movement_analyzer: Arc<NftMovementAnalyzer>,
    queue_name: String,
    concurrency: usize,
    poll_interval: Duration,
}

impl JobWorker {
    pub fn new(
        repositories: Arc<Repositories>,
        queue: DelayQueue,
        feed: Arc<FeedClient>,
        config: &AppConfig,
    ) -> Self {
        let wallet_analyzer = Arc::new(WalletAnalyzer::new(
            feed.clone(),
            repositories.wallet_snapshots.clone(),
        ));
        let token_flow_analyzer = Arc::new(TokenFlowAnalyzer::new(
            feed.clone(),
            repositories.token_flow_snapshots.clone(),
        ));
        let nft_movement_analyzer = Arc::new(NftMovementAnalyzer::new(
            feed,
            repositories.nft_movement_snapshots.clone(),
        ));

        Self {
            repositories,
            queue,
            wallet_analyzer,
            token_flow_analyzer,
            nft_movement_analyzer,
            queue_name: config.worker.queue_name.clone(),
            concurrency: config.worker.concurrency.max(1),
            poll_interval: Duration::from_millis(config.worker.poll_interval_ms),
        }
    }

    /// Dispatch loop. Runs until the shutdown signal flips, then waits for
    /// in-flight handlers to finish.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "[WORKER] Dispatch loop started (concurrency {})",
            self.concurrency
        );

        let mut poll = tokio::time::interval(self.poll_interval);
        let mut handlers: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = poll.tick() => {
                    // Reap finished handlers before reserving more work
                    while handlers.try_join_next().is_some() {}

                    while handlers.len() < self.concurrency {
                        match self.queue.reserve_next(&self.queue_name).await {
                            Ok(Some(item)) => {
                                let worker = self.clone();
                                handlers.spawn(async move { worker.handle(item).await });
                            }
                            Ok(None) => break,
                            Err(e) => {
                                warn!(
                                    "[WORKER] Queue poll failed: {}",
                                    e
                                );
                                break;
                            }
                        }
                    }
                }
            }
        }

        info!("[WORKER] Shutdown requested, draining in-flight handlers");
        while handlers.join_next().await.is_some() {}
        info!("[WORKER] Dispatch loop stopped");
    }

    /// Handle one reserved queue item and settle it with the queue
    async fn handle(&self, item: QueueItem) {
        let Some(job_id) = item.job_id().map(str::to_string) else {
            error!("[WORKER] Dropping queue item without a jobId");
            let _ = self
                .queue
                .fail(&self.queue_name, &item, "queue item missing jobId")
                .await;
            return;
        };

        match self.execute(&job_id).await {
            Ok(_) => {
                if let Err(e) = self.queue.complete(&self.queue_name, &item).await {
                    warn!(
                        "[WORKER] Could not settle queue item for job {}: {}",
                        job_id, e
                    );
                }
            }
            Err(e) => {
                let _ = self
                    .queue
                    .fail(&self.queue_name, &item, &e.to_string())
                    .await;
            }
        }
    }

    /// Execute one job cycle end to end
    pub async fn execute(&self, job_id: &str) -> Result<(), WorkerError> {
        let Some(job) = self.repositories.jobs.get(job_id).await? else {
            // Deleted between enqueue and dispatch; nothing to do
            warn!("[WORKER] Job {} no longer exists", job_id);
            return Ok(());
        };

        let started = Instant::now();

        self.repositories
            .jobs
            .set_status(job_id, JobStatus::Running, JobPatch::default())
            .await?;
        self.repositories
            .job_logs
            .append(
                job_id,
                LogSource::Worker,
                NewLogEntry::info("Job execution started").in_function("execute"),
            )
            .await?;

        // Broker misdelivery guard: a scheduled job firing early declines
        if job.job_type == JobType::Scheduled.as_str() {
            if let Some(scheduled_at) = job.scheduled_at {
                let scheduled = scheduled_at.with_timezone(&Utc);
                if Utc::now() + ChronoDuration::seconds(EARLY_FIRE_TOLERANCE_SECS) < scheduled {
                    self.repositories
                        .job_logs
                        .append(
                            job_id,
                            LogSource::Worker,
                            NewLogEntry::warn(format!(
                                "Fired before scheduled time {}; declining to run",
                                scheduled.to_rfc3339()
                            ))
                            .in_function("execute"),
                        )
                        .await?;
                    self.repositories
                        .jobs
                        .set_status(job_id, JobStatus::Pending, JobPatch::default())
                        .await?;
                    return Ok(());
                }
            }
        }

        let sink = ServiceLogSink::new();
        let result = self.dispatch(&job, &sink).await;

        // Analyzer output becomes the service-log stream, success or not
        let captured = sink.drain();
        if let Err(e) = self
            .repositories
            .job_logs
            .append_many(job_id, LogSource::Service, captured)
            .await
        {
            warn!(
                "[WORKER] Could not persist service logs for job {}: {}",
                job_id, e
            );
        }

        let now = Utc::now();
        let elapsed_ms = started.elapsed().as_millis() as i64;

        match result {
            Ok(wrote_snapshot) => {
                if job.job_type == JobType::Retry.as_str() {
                    // The repeat schedule in the broker stays authoritative;
                    // the record mirrors it and returns to pending for the
                    // next cycle.
                    let interval_ms = job.interval_minutes.unwrap_or(1).max(1) * 60_000;
                    self.repositories
                        .jobs
                        .set_status(
                            job_id,
                            JobStatus::Pending,
                            JobPatch {
                                last_run_at: Some(now),
                                next_run_at: Some(now + ChronoDuration::milliseconds(interval_ms)),
                                ..Default::default()
                            },
                        )
                        .await?;
                    self.repositories
                        .job_logs
                        .append(
                            job_id,
                            LogSource::Worker,
                            NewLogEntry::info("Recurring job completed, next run scheduled")
                                .in_function("execute")
                                .with_duration(elapsed_ms)
                                .with_details(serde_json::json!({
                                    "snapshotWritten": wrote_snapshot
                                })),
                        )
                        .await?;
                } else {
                    self.repositories
                        .jobs
                        .set_status(
                            job_id,
                            JobStatus::Completed,
                            JobPatch {
                                last_run_at: Some(now),
                                ..Default::default()
                            },
                        )
                        .await?;
                    self.repositories
                        .job_logs
                        .append(
                            job_id,
                            LogSource::Worker,
                            NewLogEntry::info("Job completed")
                                .in_function("execute")
                                .with_duration(elapsed_ms)
                                .with_details(serde_json::json!({
                                    "snapshotWritten": wrote_snapshot
                                })),
                        )
                        .await?;
                }
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                let details = ErrorDetails::now(&message, format!("{:?}", e));

                // Best effort: the failure must land on the record even if
                // one of these writes also fails.
                if let Err(db) = self
                    .repositories
                    .jobs
                    .set_status(
                        job_id,
                        JobStatus::Failed,
                        JobPatch {
                            last_run_at: Some(now),
                            error_details: Some(details),
                            ..Default::default()
                        },
                    )
                    .await
                {
                    error!(
                        "[WORKER] Could not mark job {} failed: {}",
                        job_id, db
                    );
                }
                if let Err(db) = self
                    .repositories
                    .job_logs
                    .append(
                        job_id,
                        LogSource::Worker,
                        NewLogEntry::error(format!("Job execution failed: {}", message))
                            .in_function("execute")
                            .with_duration(elapsed_ms),
                    )
                    .await
                {
                    error!(
                        "[WORKER] Could not append failure log for job {}: {}",
                        job_id, db
                    );
                }

                error!("[WORKER] Job {} failed: {}", job_id, message);
                Err(e)
            }
        }
    }

    /// Route a job to its analyzer. Returns whether a snapshot was written.
    async fn dispatch(&self, job: &jobs::Model, sink: &ServiceLogSink) -> Result<bool, WorkerError> {
        let network: Network = job
            .network
            .parse()
            .map_err(WorkerError::ProcessingError)?;

        match job.action.as_str() {
            "wallet_snapshot" => {
                let payload: WalletJobPayload = parse_payload(&job.payload)?;
                let written = self.wallet_analyzer.analyze(&payload, network, sink).await?;
                Ok(written.is_some())
            }
            "analyze_coin_flows" => {
                let payload: TokenFlowJobPayload = parse_payload(&job.payload)?;
                let written = self
                    .token_flow_analyzer
                    .analyze(&payload, network, sink)
                    .await?;
                Ok(written.is_some())
            }
            "analyze_nft_movements" => {
                let payload: NftMovementJobPayload = parse_payload(&job.payload)?;
                let written = self
                    .nft_movement_analyzer
                    .analyze(&payload, network, sink)
                    .await?;
                Ok(written.is_some())
            }
            other => Err(WorkerError::UnknownAction(other.to_string())),
        }
    }
}

fn parse_payload<T: serde::de::DeserializeOwned>(
    payload: &serde_json::Value,
) -> Result<T, WorkerError> {
    serde_json::from_value(payload.clone())
        .map_err(|e| WorkerError::ProcessingError(format!("invalid job payload: {}", e)))
}
