//! SeaORM entity for the job_logs table.
//!
//! Job log streams are append-only events keyed by job id instead of
//! nested arrays on the job row; the serial id breaks ties between
//! entries sharing a timestamp so ordered reads stay stable.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "job_logs")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    #[serde(skip_deserializing)]
    pub id: i64,
    #[sea_orm(column_type = "Text")]
    pub job_id: String,
    /// worker | service
    #[sea_orm(column_type = "Text")]
    pub source: String,
    pub timestamp: DateTimeWithTimeZone,
    #[sea_orm(column_type = "Text")]
    pub level: String,
    #[sea_orm(column_type = "Text")]
    pub message: String,
    pub function: Option<String>,
    pub duration_ms: Option<i64>,
    pub details: Option<Value>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
