use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::domain::models::SnapshotDraft;
use crate::infrastructure::persistence::entities::token_flow_snapshots;
use crate::infrastructure::persistence::error::DbError;

/// Repository for token-flow snapshots
#[derive(Clone)]
pub struct TokenFlowSnapshotRepository {
    conn: DatabaseConnection,
}

impl TokenFlowSnapshotRepository {
    /// Create a new TokenFlowSnapshotRepository
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Latest snapshot for a (token, network) pair
    pub async fn latest(
        &self,
        entity_address: &str,
        network: &str,
    ) -> Result<Option<token_flow_snapshots::Model>, DbError> {
        Ok(token_flow_snapshots::Entity::find()
            .filter(token_flow_snapshots::Column::EntityAddress.eq(entity_address))
            .filter(token_flow_snapshots::Column::Network.eq(network))
            .order_by_desc(token_flow_snapshots::Column::Timestamp)
            .order_by_desc(token_flow_snapshots::Column::Id)
            .one(&self.conn)
            .await?)
    }

    /// Append a snapshot. Rows are never updated in place.
    pub async fn append(
        &self,
        draft: SnapshotDraft,
    ) -> Result<token_flow_snapshots::Model, DbError> {
        let record = token_flow_snapshots::ActiveModel {
            entity_address: Set(draft.entity_address),
            network: Set(draft.network.as_str().to_string()),
            timestamp: Set(draft.timestamp.into()),
            alerts: Set(serde_json::to_value(&draft.alerts).unwrap_or_default()),
            risk_score: Set(draft.risk_score),
            analysis_metadata: Set(
                serde_json::to_value(&draft.analysis_metadata).unwrap_or_default()
            ),
            metrics: Set(draft.metrics),
            ..Default::default()
        };

        Ok(record.insert(&self.conn).await?)
    }

    /// Number of token-flow snapshots on a network
    pub async fn count(&self, network: &str) -> Result<u64, DbError> {
        Ok(token_flow_snapshots::Entity::find()
            .filter(token_flow_snapshots::Column::Network.eq(network))
            .count(&self.conn)
            .await?)
    }
}
