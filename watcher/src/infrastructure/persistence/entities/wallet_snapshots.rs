//! SeaORM entity for wallet snapshots. Rows are append-only; the current
//! snapshot of a (wallet, network) pair is the latest by timestamp.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "wallet_snapshots")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    #[serde(skip_deserializing)]
    pub id: i64,
    #[sea_orm(column_type = "Text")]
    pub entity_address: String,
    #[sea_orm(column_type = "Text")]
    pub network: String,
    pub timestamp: DateTimeWithTimeZone,
    pub alerts: Value,
    pub risk_score: i32,
    pub analysis_metadata: Value,
    pub metrics: Value,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
