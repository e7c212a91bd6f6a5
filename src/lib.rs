//! Maabara Online booking service
//!
//! HTTP backend for event listings, seat bookings, M-Pesa ticket payments
//! and CPD certificates. The library exposes the building blocks so the
//! binary and the integration tests assemble the same application.

pub mod config;
pub mod database;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{MaabaraError, Result};

// Re-export main components for easy access
pub use database::DatabaseService;
pub use handlers::{build_router, AppState};
pub use services::ServiceFactory;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
