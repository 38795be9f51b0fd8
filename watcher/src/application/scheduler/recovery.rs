//! Startup orphan recovery.
//!
//! A retry job sitting in pending with no recent run means a crash or
//! broker loss left the queue without a live repeat entry for it. On
//! startup those jobs are re-submitted for an immediate run and their
//! repeat schedule is re-armed.

use log::{info, warn};
use serde_json::json;

use crate::domain::errors::WorkerError;
use crate::domain::models::{LogSource, NewLogEntry};
use crate::infrastructure::persistence::Repositories;
use crate::infrastructure::queue::{DelayQueue, SubmitOpts};

/// Scan for orphaned retry jobs and re-enrol them. Returns how many were
/// recovered.
pub async fn recover_orphans(
    repositories: &Repositories,
    queue: &DelayQueue,
    queue_name: &str,
) -> Result<usize, WorkerError> {
    let orphans = repositories.jobs.find_orphans().await?;

    if orphans.is_empty() {
        info!("[RECOVERY] No orphaned jobs found");
        return Ok(0);
    }

    warn!(
        "[RECOVERY] Re-enrolling {} orphaned job(s)",
        orphans.len()
    );

    for job in &orphans {
        let payload = json!({ "jobId": job.id });

        queue
            .submit(queue_name, payload.clone(), SubmitOpts::default())
            .await?;

        if let Some(minutes) = job.interval_minutes {
            let interval_ms = minutes.max(1) as u64 * 60_000;
            queue
                .submit(
                    queue_name,
                    payload,
                    SubmitOpts {
                        delay_ms: Some(interval_ms),
                        repeat_every_ms: Some(interval_ms),
                        repeat_key: Some(job.id.clone()),
                    },
                )
                .await?;
        }

        if let Err(e) = repositories
            .job_logs
            .append(
                &job.id,
                LogSource::Worker,
                NewLogEntry::info("Job re-enrolled by startup orphan recovery")
                    .in_function("recover_orphans"),
            )
            .await
        {
            warn!(
                "[RECOVERY] Could not log recovery for job {}: {}",
                job.id, e
            );
        }

        info!("[RECOVERY] Re-enrolled job {}", job.id);
    }

    Ok(orphans.len())
}
