//! Tenantry Server: HTTP surface, configuration and application
//! services.

pub mod config;
pub mod error;
pub mod middleware;
pub mod notify;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ServerConfig;
pub use routes::create_router;
pub use state::AppState;
