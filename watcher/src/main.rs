//! Sei Watcher - recurring watch-job runner for Sei blockchain analytics
//!
//! One process runs the whole control plane: the HTTP submission/admin
//! surface, the Redis-backed delay queue consumer, and the incremental
//! analyzers that maintain cumulative snapshots in Postgres.
//!
//! ```bash
//! # Run the service
//! cargo run --release
//!
//! # Apply the database schema first
//! cargo run --bin migrate
//! ```

use log::{error, info};
use std::sync::Arc;
use tokio::sync::watch;

use sei_watcher::application::scheduler::{recovery, JobScheduler, JobWorker};
use sei_watcher::config::AppConfig;
use sei_watcher::infrastructure::feed::FeedClient;
use sei_watcher::infrastructure::persistence::{DbPool, RepositoryFactory};
use sei_watcher::infrastructure::queue::DelayQueue;
use sei_watcher::infrastructure::web::{self, AppState};

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = AppConfig::from_env();

    // Connect to database
    let db_pool = match DbPool::new(&config).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            return;
        }
    };
    let repositories = Arc::new(RepositoryFactory::create_repositories(&db_pool));

    // Connect to broker
    let queue = match DelayQueue::connect(&config).await {
        Ok(queue) => queue,
        Err(e) => {
            error!("Failed to connect to broker: {}", e);
            return;
        }
    };

    let feed = match FeedClient::new(&config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to create feed client: {}", e);
            return;
        }
    };

    // Jobs stranded by a previous crash get a fresh queue entry
    match recovery::recover_orphans(&repositories, &queue, &config.worker.queue_name).await {
        Ok(recovered) if recovered > 0 => {
            info!("Recovered {} orphaned job(s)", recovered);
        }
        Ok(_) => {}
        Err(e) => {
            error!("Orphan recovery failed: {}", e);
        }
    }

    let scheduler = Arc::new(JobScheduler::new(
        repositories.clone(),
        queue.clone(),
        &config.worker.queue_name,
    ));
    let worker = JobWorker::new(
        repositories.clone(),
        queue.clone(),
        feed,
        &config,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker_handle = {
        let worker_shutdown = shutdown_rx.clone();
        tokio::spawn(async move { worker.run(worker_shutdown).await })
    };

    let state = AppState {
        scheduler,
        repositories,
        queue,
        queue_name: config.worker.queue_name.clone(),
    };
    let server_handle = {
        let config = config.clone();
        let server_shutdown = shutdown_rx;
        tokio::spawn(async move { web::start_server(&config, state, server_shutdown).await })
    };

    info!("═══════════════════════════════════════════════════════════════");
    info!("  SEI WATCHER - job runner online");
    info!("═══════════════════════════════════════════════════════════════");

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for Ctrl+C");

    info!("\nShutting down...");
    let _ = shutdown_tx.send(true);

    // In-flight handlers drain before the process exits
    let _ = worker_handle.await;
    let _ = server_handle.await;

    info!("Shutdown complete");
}
