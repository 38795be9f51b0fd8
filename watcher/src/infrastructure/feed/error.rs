use std::error::Error;
use std::fmt;

/// Error type for upstream feed operations
#[derive(Debug)]
pub enum FeedError {
    /// Transport-level failure (connect, timeout, TLS)
    RequestError(reqwest::Error),
    /// Upstream returned 404 for the entity
    NotFound { url: String, status: u16 },
    /// Upstream returned a non-success status
    UpstreamStatus { url: String, status: u16 },
    /// Body could not be interpreted
    ResponseError(String),
    /// No endpoint configured for the requested network
    ConfigError(String),
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedError::RequestError(e) => write!(f, "Request error: {}", e),
            FeedError::NotFound { url, status } => {
                write!(f, "Not found ({}) at {}", status, url)
            }
            FeedError::UpstreamStatus { url, status } => {
                write!(f, "Upstream returned status {} at {}", status, url)
            }
            FeedError::ResponseError(msg) => write!(f, "Response error: {}", msg),
            FeedError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for FeedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FeedError::RequestError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(error: reqwest::Error) -> Self {
        FeedError::RequestError(error)
    }
}
