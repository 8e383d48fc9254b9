pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod services;
pub mod state;
pub mod store;

pub use config::AppConfig;
pub use router::app;
pub use state::AppState;
