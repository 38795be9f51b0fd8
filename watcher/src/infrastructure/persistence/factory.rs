use sea_orm::DatabaseConnection;

use crate::infrastructure::persistence::connection::DbPool;
use crate::infrastructure::persistence::repositories::{
    JobLogRepository, JobRepository, NftMovementSnapshotRepository, Repositories,
    TokenFlowSnapshotRepository, WalletSnapshotRepository,
};

/// Factory for creating repositories
pub struct RepositoryFactory;

impl RepositoryFactory {
    /// Create all repositories
    pub fn create_repositories(db_pool: &DbPool) -> Repositories {
        let conn = db_pool.get_connection().clone();

        Repositories::new(
            Self::create_job_repository(conn.clone()),
            Self::create_job_log_repository(conn.clone()),
            Self::create_wallet_snapshot_repository(conn.clone()),
            Self::create_token_flow_snapshot_repository(conn.clone()),
            Self::create_nft_movement_snapshot_repository(conn),
        )
    }

    /// Create a job repository
    pub fn create_job_repository(conn: DatabaseConnection) -> JobRepository {
        JobRepository::new(conn)
    }

    /// Create a job-log repository
    pub fn create_job_log_repository(conn: DatabaseConnection) -> JobLogRepository {
        JobLogRepository::new(conn)
    }

    /// Create a wallet snapshot repository
    pub fn create_wallet_snapshot_repository(conn: DatabaseConnection) -> WalletSnapshotRepository {
        WalletSnapshotRepository::new(conn)
    }

    /// Create a token-flow snapshot repository
    pub fn create_token_flow_snapshot_repository(
        conn: DatabaseConnection,
    ) -> TokenFlowSnapshotRepository {
        TokenFlowSnapshotRepository::new(conn)
    }

    /// Create an NFT-movement snapshot repository
    pub fn create_nft_movement_snapshot_repository(
        conn: DatabaseConnection,
    ) -> NftMovementSnapshotRepository {
        NftMovementSnapshotRepository::new(conn)
    }
}
