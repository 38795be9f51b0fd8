pub mod client;
pub mod error;
pub mod types;

pub use client::FeedClient;
pub use error::FeedError;
pub use types::{FeedPage, TokenHoldingRecord, TokenInfo, TransactionRecord, TransferRecord};
