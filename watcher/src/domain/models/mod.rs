pub mod job;
pub mod snapshot;

pub use job::{
    ErrorDetails, JobAction, JobStatus, JobType, LogLevel, LogSource, Network, NewLogEntry,
    NftMovementJobPayload, NftMovementThresholds, SubmitJobRequest, TokenFlowJobPayload,
    TokenFlowThresholds, WalletJobPayload,
};
pub use snapshot::{
    AddressActivity, AddressVolume, Alert, AlertSeverity, AnalysisMetadata, CountWindows,
    DataQuality, FeeDistribution, HolderCount, NftHoldingSummary, NftMovementMetrics,
    NftTransferSummary, SnapshotDraft, TokenFlowMetrics, TokenHoldingSummary, TokenInfoSummary,
    TraderActivity, TraderStats, TransferSummary, VolumeWindows, WalletMetrics,
};
