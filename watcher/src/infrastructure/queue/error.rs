use std::error::Error;
use std::fmt;

/// Error type for delay-queue operations
#[derive(Debug)]
pub enum QueueError {
    /// Could not reach the broker
    ConnectionError(String),
    /// Broker command failed
    BrokerError(redis::RedisError),
    /// Queue item could not be encoded or decoded
    SerializationError(String),
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::ConnectionError(msg) => write!(f, "Broker connection error: {}", msg),
            QueueError::BrokerError(e) => write!(f, "Broker error: {}", e),
            QueueError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl Error for QueueError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            QueueError::BrokerError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<redis::RedisError> for QueueError {
    fn from(error: redis::RedisError) -> Self {
        QueueError::BrokerError(error)
    }
}
