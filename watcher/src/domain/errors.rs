use std::error::Error;
use std::fmt;

use crate::infrastructure::feed::FeedError;
use crate::infrastructure::persistence::DbError;
use crate::infrastructure::queue::QueueError;

/// Error type for analysis cycles
#[derive(Debug)]
pub enum AnalyzerError {
    /// Entity address is not a 0x-prefixed 20-byte hex string
    InvalidAddressFormat(String),
    /// Upstream reported the wallet as unknown
    WalletNotFound { address: String, status: u16 },
    /// All upstream endpoints failed for a kind that cannot degrade
    UpstreamUnavailable(String),
    FeedError(FeedError),
    DbError(DbError),
    ProcessingError(String),
}

impl fmt::Display for AnalyzerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalyzerError::InvalidAddressFormat(address) => {
                write!(f, "INVALID_ADDRESS_FORMAT: '{}'", address)
            }
            AnalyzerError::WalletNotFound { address, status } => {
                write!(f, "Wallet {} not found (upstream status {})", address, status)
            }
            AnalyzerError::UpstreamUnavailable(msg) => {
                write!(f, "Upstream unavailable: {}", msg)
            }
            AnalyzerError::FeedError(e) => write!(f, "Feed error: {}", e),
            AnalyzerError::DbError(e) => write!(f, "Database error: {}", e),
            AnalyzerError::ProcessingError(msg) => write!(f, "Analysis error: {}", msg),
        }
    }
}

impl Error for AnalyzerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AnalyzerError::FeedError(e) => Some(e),
            AnalyzerError::DbError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FeedError> for AnalyzerError {
    fn from(error: FeedError) -> Self {
        match error {
            FeedError::NotFound { url, status } => AnalyzerError::WalletNotFound {
                address: url,
                status,
            },
            other => AnalyzerError::FeedError(other),
        }
    }
}

impl From<DbError> for AnalyzerError {
    fn from(error: DbError) -> Self {
        AnalyzerError::DbError(error)
    }
}

/// Error type for job submission and enrolment
#[derive(Debug)]
pub enum SchedulerError {
    /// Request rejected before any side effect
    ValidationError(String),
    DbError(DbError),
    QueueError(QueueError),
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            SchedulerError::DbError(e) => write!(f, "Database error: {}", e),
            SchedulerError::QueueError(e) => write!(f, "Queue error: {}", e),
        }
    }
}

impl Error for SchedulerError {}

impl From<DbError> for SchedulerError {
    fn from(error: DbError) -> Self {
        SchedulerError::DbError(error)
    }
}

impl From<QueueError> for SchedulerError {
    fn from(error: QueueError) -> Self {
        SchedulerError::QueueError(error)
    }
}

/// Error type for job execution
#[derive(Debug)]
pub enum WorkerError {
    DbError(DbError),
    QueueError(QueueError),
    AnalyzerError(AnalyzerError),
    UnknownAction(String),
    ProcessingError(String),
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerError::DbError(e) => write!(f, "Database error: {}", e),
            WorkerError::QueueError(e) => write!(f, "Queue error: {}", e),
            WorkerError::AnalyzerError(e) => write!(f, "Analyzer error: {}", e),
            WorkerError::UnknownAction(action) => write!(f, "Unknown job action '{}'", action),
            WorkerError::ProcessingError(msg) => write!(f, "Worker error: {}", msg),
        }
    }
}

impl Error for WorkerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WorkerError::DbError(e) => Some(e),
            WorkerError::QueueError(e) => Some(e),
            WorkerError::AnalyzerError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DbError> for WorkerError {
    fn from(error: DbError) -> Self {
        WorkerError::DbError(error)
    }
}

impl From<QueueError> for WorkerError {
    fn from(error: QueueError) -> Self {
        WorkerError::QueueError(error)
    }
}

impl From<AnalyzerError> for WorkerError {
    fn from(error: AnalyzerError) -> Self {
        WorkerError::AnalyzerError(error)
    }
}
