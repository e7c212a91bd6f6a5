//! Database module
//!
//! This module handles database connections and operations

pub mod connection;
pub mod repositories;
pub mod service;

// Re-export commonly used database components
pub use connection::{DatabasePool, DatabaseConfig, DatabaseDiagnostics, create_pool, run_migrations, health_check, diagnostics};
pub use repositories::{
    UserRepository, CategoryRepository, EventRepository, BookingRepository, BookingCounts,
    PaymentRepository, CertificateRepository, SettingsRepository,
};
pub use service::DatabaseService;
