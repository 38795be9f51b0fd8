pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod server;

pub use routes::AppState;
pub use server::start_server;
