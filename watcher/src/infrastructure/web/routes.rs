// API routes for the job runner

use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;

use crate::application::scheduler::JobScheduler;
use crate::infrastructure::persistence::Repositories;
use crate::infrastructure::queue::DelayQueue;
use crate::infrastructure::web::handlers;

/// Application state shared with all routes
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<JobScheduler>,
    pub repositories: Arc<Repositories>,
    pub queue: DelayQueue,
    pub queue_name: String,
}

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/status", get(handlers::status))
        .route("/jobs", post(handlers::submit_job))
        .route("/jobs", get(handlers::list_jobs))
        .route("/jobs/failed", get(handlers::failed_jobs))
        .route("/jobs/queue-status", get(handlers::queue_status))
        .route("/jobs/clear-all", delete(handlers::clear_all_jobs))
        .route("/jobs/{id}", get(handlers::get_job))
        .route("/jobs/{id}", delete(handlers::delete_job))
        .route("/jobs/{id}/logs", get(handlers::job_logs))
        .route("/jobs/{id}/service-logs", get(handlers::job_service_logs))
        .with_state(state)
}
