use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use crate::domain::models::{LogLevel, LogSource, NewLogEntry};
use crate::infrastructure::persistence::entities::job_logs;
use crate::infrastructure::persistence::error::DbError;

/// Repository for the append-only job log streams
#[derive(Clone)]
pub struct JobLogRepository {
    conn: DatabaseConnection,
}

impl JobLogRepository {
    /// Create a new JobLogRepository
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Append one entry to a job's log stream
    pub async fn append(
        &self,
        job_id: &str,
        source: LogSource,
        entry: NewLogEntry,
    ) -> Result<(), DbError> {
        self.to_active_model(job_id, source, entry)
            .insert(&self.conn)
            .await?;
        Ok(())
    }

    /// Append entries preserving their order. Serial ids keep entries that
    /// share a timestamp in insertion order.
    pub async fn append_many(
        &self,
        job_id: &str,
        source: LogSource,
        entries: Vec<NewLogEntry>,
    ) -> Result<(), DbError> {
        if entries.is_empty() {
            return Ok(());
        }

        let records: Vec<job_logs::ActiveModel> = entries
            .into_iter()
            .map(|entry| self.to_active_model(job_id, source, entry))
            .collect();

        job_logs::Entity::insert_many(records)
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    /// Read a job's log entries, newest first, optionally filtered
    pub async fn for_job(
        &self,
        job_id: &str,
        source: Option<LogSource>,
        level: Option<LogLevel>,
        limit: u64,
    ) -> Result<Vec<job_logs::Model>, DbError> {
        let mut query = job_logs::Entity::find().filter(job_logs::Column::JobId.eq(job_id));

        if let Some(source) = source {
            query = query.filter(job_logs::Column::Source.eq(source.as_str()));
        }
        if let Some(level) = level {
            query = query.filter(job_logs::Column::Level.eq(level.as_str()));
        }

        Ok(query
            .order_by_desc(job_logs::Column::Timestamp)
            .order_by_desc(job_logs::Column::Id)
            .limit(limit)
            .all(&self.conn)
            .await?)
    }

    /// Most recent ERROR entry of a job, if any
    pub async fn last_error(&self, job_id: &str) -> Result<Option<job_logs::Model>, DbError> {
        Ok(job_logs::Entity::find()
            .filter(job_logs::Column::JobId.eq(job_id))
            .filter(job_logs::Column::Level.eq(LogLevel::Error.as_str()))
            .order_by_desc(job_logs::Column::Timestamp)
            .order_by_desc(job_logs::Column::Id)
            .one(&self.conn)
            .await?)
    }

    /// Delete all log entries of a job
    pub async fn delete_for_job(&self, job_id: &str) -> Result<u64, DbError> {
        let result = job_logs::Entity::delete_many()
            .filter(job_logs::Column::JobId.eq(job_id))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected)
    }

    fn to_active_model(
        &self,
        job_id: &str,
        source: LogSource,
        entry: NewLogEntry,
    ) -> job_logs::ActiveModel {
        job_logs::ActiveModel {
            job_id: Set(job_id.to_string()),
            source: Set(source.as_str().to_string()),
            timestamp: Set(entry.timestamp.into()),
            level: Set(entry.level.as_str().to_string()),
            message: Set(entry.message),
            function: Set(entry.function),
            duration_ms: Set(entry.duration_ms),
            details: Set(entry.details),
            ..Default::default()
        }
    }
}
