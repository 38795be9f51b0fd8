use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde_json::Value;

use crate::domain::models::{ErrorDetails, JobStatus, JobType, Network};
use crate::infrastructure::persistence::entities::jobs;
use crate::infrastructure::persistence::error::DbError;

/// Retry jobs whose last run is older than this are considered orphaned
const ORPHAN_AGE_HOURS: i64 = 24;

/// Fields a job-record submission carries
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: String,
    pub action: String,
    pub payload: Value,
    pub network: Network,
    pub job_type: JobType,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub interval_minutes: Option<i64>,
}

/// Optional fields merged alongside a status transition
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub error_details: Option<ErrorDetails>,
}

/// Repository for job records
#[derive(Clone)]
pub struct JobRepository {
    conn: DatabaseConnection,
}

impl JobRepository {
    /// Create a new JobRepository
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Create a job record in pending status
    pub async fn create(&self, job: NewJob) -> Result<jobs::Model, DbError> {
        let now = Utc::now();

        let record = jobs::ActiveModel {
            id: Set(job.id),
            action: Set(job.action),
            payload: Set(job.payload),
            network: Set(job.network.as_str().to_string()),
            job_type: Set(job.job_type.as_str().to_string()),
            scheduled_at: Set(job.scheduled_at.map(Into::into)),
            interval_minutes: Set(job.interval_minutes),
            status: Set(JobStatus::Pending.as_str().to_string()),
            last_run_at: Set(None),
            next_run_at: Set(None),
            error_details: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        Ok(record.insert(&self.conn).await?)
    }

    /// Get a job by id
    pub async fn get(&self, id: &str) -> Result<Option<jobs::Model>, DbError> {
        Ok(jobs::Entity::find_by_id(id).one(&self.conn).await?)
    }

    /// List all jobs, newest first
    pub async fn list(&self) -> Result<Vec<jobs::Model>, DbError> {
        Ok(jobs::Entity::find()
            .order_by_desc(jobs::Column::CreatedAt)
            .all(&self.conn)
            .await?)
    }

    /// List recently failed jobs, most recently updated first
    pub async fn list_failed(&self, limit: u64) -> Result<Vec<jobs::Model>, DbError> {
        Ok(jobs::Entity::find()
            .filter(jobs::Column::Status.eq(JobStatus::Failed.as_str()))
            .order_by_desc(jobs::Column::UpdatedAt)
            .limit(limit)
            .all(&self.conn)
            .await?)
    }

    /// Delete a job record. Returns true when a row was removed.
    pub async fn delete(&self, id: &str) -> Result<bool, DbError> {
        let result = jobs::Entity::delete_by_id(id).exec(&self.conn).await?;
        Ok(result.rows_affected > 0)
    }

    /// Transition a job's status and merge the given patch fields
    pub async fn set_status(
        &self,
        id: &str,
        status: JobStatus,
        patch: JobPatch,
    ) -> Result<(), DbError> {
        let mut record = jobs::ActiveModel {
            id: Set(id.to_string()),
            status: Set(status.as_str().to_string()),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        };

        if let Some(last_run_at) = patch.last_run_at {
            record.last_run_at = Set(Some(last_run_at.into()));
        }
        if let Some(next_run_at) = patch.next_run_at {
            record.next_run_at = Set(Some(next_run_at.into()));
        }
        if let Some(error_details) = patch.error_details {
            record.error_details =
                Set(Some(serde_json::to_value(&error_details).unwrap_or_default()));
        }

        record.update(&self.conn).await?;
        Ok(())
    }

    /// Retry jobs stuck in pending whose last run is missing or stale.
    /// These signal a crash or broker loss that left the queue without a
    /// live repeat entry.
    pub async fn find_orphans(&self) -> Result<Vec<jobs::Model>, DbError> {
        let cutoff = Utc::now() - Duration::hours(ORPHAN_AGE_HOURS);

        Ok(jobs::Entity::find()
            .filter(jobs::Column::JobType.eq(JobType::Retry.as_str()))
            .filter(jobs::Column::Status.eq(JobStatus::Pending.as_str()))
            .filter(
                Condition::any()
                    .add(jobs::Column::LastRunAt.is_null())
                    .add(jobs::Column::LastRunAt.lt(cutoff)),
            )
            .all(&self.conn)
            .await?)
    }

    /// Mark every non-terminal retry job failed with the given message.
    /// Returns the number of jobs updated.
    pub async fn mark_non_terminal_retry_failed(&self, message: &str) -> Result<u64, DbError> {
        let error_details =
            serde_json::to_value(ErrorDetails::now(message, message)).unwrap_or_default();

        let result = jobs::Entity::update_many()
            .col_expr(
                jobs::Column::Status,
                Expr::value(JobStatus::Failed.as_str()),
            )
            .col_expr(jobs::Column::ErrorDetails, Expr::value(error_details))
            .col_expr(jobs::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(jobs::Column::JobType.eq(JobType::Retry.as_str()))
            .filter(
                Condition::any()
                    .add(jobs::Column::Status.eq(JobStatus::Pending.as_str()))
                    .add(jobs::Column::Status.eq(JobStatus::Running.as_str())),
            )
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected)
    }

    /// Total number of job records
    pub async fn count(&self) -> Result<u64, DbError> {
        Ok(jobs::Entity::find().count(&self.conn).await?)
    }
}
