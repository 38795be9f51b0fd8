use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::domain::models::SnapshotDraft;
use crate::infrastructure::persistence::entities::wallet_snapshots;
use crate::infrastructure::persistence::error::DbError;

/// Repository for wallet snapshots
#[derive(Clone)]
pub struct WalletSnapshotRepository {
    conn: DatabaseConnection,
}

impl WalletSnapshotRepository {
    /// Create a new WalletSnapshotRepository
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Latest snapshot for a (wallet, network) pair
    pub async fn latest(
        &self,
        entity_address: &str,
        network: &str,
    ) -> Result<Option<wallet_snapshots::Model>, DbError> {
        Ok(wallet_snapshots::Entity::find()
            .filter(wallet_snapshots::Column::EntityAddress.eq(entity_address))
            .filter(wallet_snapshots::Column::Network.eq(network))
            .order_by_desc(wallet_snapshots::Column::Timestamp)
            .order_by_desc(wallet_snapshots::Column::Id)
            .one(&self.conn)
            .await?)
    }

    /// Append a snapshot. Rows are never updated in place.
    pub async fn append(&self, draft: SnapshotDraft) -> Result<wallet_snapshots::Model, DbError> {
        let record = wallet_snapshots::ActiveModel {
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

    /// Number of wallet snapshots on a network
    pub async fn count(&self, network: &str) -> Result<u64, DbError> {
        Ok(wallet_snapshots::Entity::find()
            .filter(wallet_snapshots::Column::Network.eq(network))
            .count(&self.conn)
            .await?)
    }
}
