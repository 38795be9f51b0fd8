use std::error::Error;
use std::fmt;

/// Error type for job and snapshot persistence. Only two things go wrong
/// at this layer: the pool cannot be established, or SeaORM rejects a
/// statement.
#[derive(Debug)]
pub enum DbError {
    /// Could not establish the connection pool
    ConnectionError(String),
    /// A query or write failed inside SeaORM
    SeaOrmError(sea_orm::DbErr),
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::ConnectionError(msg) => write!(f, "Store unreachable: {}", msg),
            DbError::SeaOrmError(e) => write!(f, "Store operation failed: {}", e),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DbError::SeaOrmError(e) => Some(e),
            DbError::ConnectionError(_) => None,
        }
    }
}

impl From<sea_orm::DbErr> for DbError {
    fn from(err: sea_orm::DbErr) -> Self {
        DbError::SeaOrmError(err)
    }
}
