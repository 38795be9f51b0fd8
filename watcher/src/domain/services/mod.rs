pub mod analysis;
pub mod nft_movement_analyzer;
pub mod prices;
pub mod service_log;
pub mod signatures;
pub mod token_flow_analyzer;
pub mod wallet_analyzer;

pub use nft_movement_analyzer::NftMovementAnalyzer;
pub use service_log::ServiceLogSink;
pub use token_flow_analyzer::TokenFlowAnalyzer;
pub use wallet_analyzer::WalletAnalyzer;
