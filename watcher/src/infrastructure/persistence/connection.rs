use log::{error, info};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;

use crate::config::AppConfig;
use crate::infrastructure::persistence::error::DbError;

/// Manages the database connection pool
pub struct DbPool {
    connection: DatabaseConnection,
}

impl DbPool {
    /// Creates a new database connection pool
    pub async fn new(config: &AppConfig) -> Result<Self, DbError> {
        let conn_opts = ConnectOptions::new(config.database.url.clone())
            .max_connections(10)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(5))
            .sqlx_logging(false)
            .to_owned();

        match Database::connect(conn_opts).await {
            Ok(connection) => {
                info!("Database connection established");
                Ok(DbPool { connection })
            }
            Err(e) => {
                error!("Failed to connect to database: {}", e);
                Err(DbError::ConnectionError(format!(
                    "Failed to connect to database: {}",
                    e
                )))
            }
        }
    }

    /// Returns the database connection
    pub fn get_connection(&self) -> &DatabaseConnection {
        &self.connection
    }
}
