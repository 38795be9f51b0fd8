pub mod job_log_repository;
pub mod job_repository;
pub mod nft_movement_snapshot_repository;
pub mod token_flow_snapshot_repository;
pub mod wallet_snapshot_repository;

pub use job_log_repository::JobLogRepository;
pub use job_repository::{JobPatch, JobRepository};
pub use nft_movement_snapshot_repository::NftMovementSnapshotRepository;
pub use token_flow_snapshot_repository::TokenFlowSnapshotRepository;
pub use wallet_snapshot_repository::WalletSnapshotRepository;

/// Collection of all repositories
#[derive(Clone)]
pub struct Repositories {
    /// Repository for job records
    pub jobs: JobRepository,
    /// Repository for job log streams
    pub job_logs: JobLogRepository,
    /// Repository for wallet snapshots
    pub wallet_snapshots: WalletSnapshotRepository,
    /// Repository for token-flow snapshots
    pub token_flow_snapshots: TokenFlowSnapshotRepository,
    /// Repository for NFT-movement snapshots
    pub nft_movement_snapshots: NftMovementSnapshotRepository,
}

impl Repositories {
    /// Create a new Repositories instance
    pub fn new(
        jobs: JobRepository,
        job_logs: JobLogRepository,
        wallet_snapshots: WalletSnapshotRepository,
        token_flow_snapshots: TokenFlowSnapshotRepository,
        nft_movement_snapshots: NftMovementSnapshotRepository,
    ) -> Self {
        Self {
            jobs,
            job_logs,
            wallet_snapshots,
            token_flow_snapshots,
            nft_movement_snapshots,
        }
    }
}
