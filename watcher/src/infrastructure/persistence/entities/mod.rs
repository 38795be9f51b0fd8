pub mod job_logs;
pub mod jobs;
pub mod nft_movement_snapshots;
pub mod token_flow_snapshots;
pub mod wallet_snapshots;
